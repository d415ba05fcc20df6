use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use block_dev::BlockDevice;
use vfs::{DirEntry, Error};

use crate::dir;
use crate::group::{BlockGroupDescriptor, DESCRIPTOR_SIZE};
use crate::inode::{Inode, DIRECT_POINTERS, INODE_PREFIX, ROOT_INODE};
use crate::superblock::{Superblock, SuperblockError, SUPERBLOCK_OFFSET, SUPERBLOCK_SIZE};
use crate::util::u32_at;

/// 只读的ext2文件系统
#[derive(Debug)]
pub struct Ext2Fs {
    dev: Arc<dyn BlockDevice>,
    sb: Superblock,
    groups: Vec<BlockGroupDescriptor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountError {
    Device(block_dev::Error),
    Superblock(SuperblockError),
    /// 文件系统块不是设备块的整数倍
    UnsupportedBlockSize { fs: u32, device: usize },
    /// 超级块声明的块数超出设备容量，单位为设备块
    VolumeTooLarge { blocks: u64, device: u64 },
    /// 块组描述符表无法分配
    NoMemory,
}

impl From<block_dev::Error> for MountError {
    fn from(err: block_dev::Error) -> Self {
        Self::Device(err)
    }
}

impl From<SuperblockError> for MountError {
    fn from(err: SuperblockError) -> Self {
        Self::Superblock(err)
    }
}

impl fmt::Display for MountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MountError::Device(err) => write!(f, "{err}"),
            MountError::Superblock(SuperblockError::BadMagic(magic)) => {
                write!(f, "bad magic {magic:#06x}")
            }
            MountError::Superblock(SuperblockError::BadGeometry) => {
                f.write_str("bad superblock geometry")
            }
            MountError::Superblock(SuperblockError::GroupCountMismatch {
                by_inodes,
                by_blocks,
            }) => write!(
                f,
                "total group calculation by block method ({by_blocks}) and inode method ({by_inodes}) differs"
            ),
            MountError::UnsupportedBlockSize { fs, device } => {
                write!(f, "block size {fs} is not a multiple of device block size {device}")
            }
            MountError::VolumeTooLarge { blocks, device } => {
                write!(f, "volume spans {blocks} blocks but the device has {device}")
            }
            MountError::NoMemory => f.write_str("out of memory for the group descriptor table"),
        }
    }
}

/// 打开的文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    ino: u32,
    inode: Inode,
}

impl File {
    pub fn ino(&self) -> u32 {
        self.ino
    }

    pub fn len(&self) -> u64 {
        self.inode.size.into()
    }

    pub fn is_empty(&self) -> bool {
        self.inode.size == 0
    }
}

impl Ext2Fs {
    pub fn mount(dev: Arc<dyn BlockDevice>) -> Result<Self, MountError> {
        let mut raw = [0; SUPERBLOCK_SIZE];
        dev.read_at(SUPERBLOCK_OFFSET, &mut raw)?;
        let sb = Superblock::parse(&raw)?;

        let device_block_size = dev.block_size();
        if device_block_size == 0 || sb.block_size as usize % device_block_size != 0 {
            return Err(MountError::UnsupportedBlockSize {
                fs: sb.block_size,
                device: device_block_size,
            });
        }

        if let Some(device) = dev.block_count() {
            let ratio = (sb.block_size as usize / device_block_size) as u64;
            let blocks = u64::from(sb.total_blocks) * ratio;
            if blocks > device {
                return Err(MountError::VolumeTooLarge { blocks, device });
            }
        }

        let mut fs = Self {
            dev,
            sb,
            groups: Vec::new(),
        };

        let table_len = fs.sb.total_groups as usize * DESCRIPTOR_SIZE;
        let mut table = Vec::new();
        table
            .try_reserve_exact(table_len)
            .map_err(|_| MountError::NoMemory)?;
        table.resize(table_len, 0);
        let sector = fs.sector_of(fs.sb.bgdt_block())?;
        let read_size = fs.dev.read_blocks(sector, &mut table)?;
        if read_size != table.len() {
            return Err(block_dev::Error::ShortRead {
                expected: table.len(),
                actual: read_size,
            }
            .into());
        }
        fs.groups = table
            .chunks_exact(DESCRIPTOR_SIZE)
            .map(BlockGroupDescriptor::parse)
            .collect();

        Ok(fs)
    }

    /// 探测设备上的ext2；不是ext2时返回`None`
    pub fn probe(dev: &Arc<dyn BlockDevice>) -> Option<Self> {
        match Self::mount(dev.clone()) {
            Ok(fs) => {
                log::info!(
                    "EXT2: found an ext2 filesystem on {}, {} groups of {}-byte blocks",
                    dev.device_name(),
                    fs.sb.total_groups,
                    fs.sb.block_size
                );
                Some(fs)
            }
            Err(MountError::Superblock(SuperblockError::BadMagic(_))) => {
                log::debug!("EXT2: not a valid ext2 filesystem on {}", dev.device_name());
                None
            }
            Err(err) => {
                log::info!("EXT2: cannot mount {}: {err}", dev.device_name());
                None
            }
        }
    }

    pub fn device(&self) -> &Arc<dyn BlockDevice> {
        &self.dev
    }

    pub fn superblock(&self) -> &Superblock {
        &self.sb
    }

    pub fn groups(&self) -> &[BlockGroupDescriptor] {
        &self.groups
    }

    /// 文件系统块号对应的设备块号
    pub fn get_sector_num(&self, block_no: u32) -> u64 {
        u64::from(block_no) * u64::from(self.sb.block_size) / self.dev.block_size() as u64
    }

    fn sector_of(&self, block_no: u32) -> Result<u32, block_dev::Error> {
        u32::try_from(self.get_sector_num(block_no)).map_err(|_| block_dev::Error::OutOfRange)
    }

    /// 读取一个文件系统块
    pub fn read_block(&self, block_no: u32) -> Result<Vec<u8>, block_dev::Error> {
        let mut block = vec![0; self.sb.block_size as usize];
        let read_size = self.dev.read_blocks(self.sector_of(block_no)?, &mut block)?;
        if read_size != block.len() {
            return Err(block_dev::Error::ShortRead {
                expected: block.len(),
                actual: read_size,
            });
        }
        Ok(block)
    }

    pub fn read_inode(&self, ino: u32) -> Result<Inode, Error> {
        if ino == 0 || ino > self.sb.total_inodes {
            log::debug!("EXT2: inode {ino} out of range");
            return Err(Error::Invalid);
        }

        let group = (ino - 1) / self.sb.inodes_per_group;
        let index = (ino - 1) % self.sb.inodes_per_group;
        let desc = self.groups.get(group as usize).ok_or(Error::Invalid)?;

        let block_size = u64::from(self.sb.block_size);
        let offset = u64::from(index) * u64::from(self.sb.inode_size);
        let block_no = u32::try_from(offset / block_size)
            .ok()
            .and_then(|block| desc.inode_table.checked_add(block))
            .ok_or(Error::Invalid)?;
        let within = (offset % block_size) as usize;

        let block = self.read_block(block_no)?;
        block
            .get(within..within + INODE_PREFIX)
            .map(Inode::parse)
            .ok_or(Error::Fault)
    }

    /// 文件第`index`个逻辑块所在的块号，0表示没有分配
    pub fn get_block_no_from_inode(&self, inode: &Inode, index: u32) -> Result<u32, Error> {
        let [p1, p2, p3] = self.sb.pointers_per_indirect_block;
        let mut index = u64::from(index);

        if index < DIRECT_POINTERS as u64 {
            return Ok(inode.direct[index as usize]);
        }
        index -= DIRECT_POINTERS as u64;

        if index < p1 {
            return self.indirect_entry(inode.singly, index);
        }
        index -= p1;

        if index < p2 {
            let singly = self.indirect_entry(inode.doubly, index / p1)?;
            return self.indirect_entry(singly, index % p1);
        }
        index -= p2;

        if index < p3 {
            let doubly = self.indirect_entry(inode.triply, index / p2)?;
            let singly = self.indirect_entry(doubly, index % p2 / p1)?;
            return self.indirect_entry(singly, index % p1);
        }

        log::debug!("EXT2: block index beyond triply-indirect range");
        Ok(0)
    }

    fn indirect_entry(&self, block_no: u32, index: u64) -> Result<u32, Error> {
        if block_no == 0 {
            return Ok(0);
        }
        let block = self.read_block(block_no)?;
        Ok(u32_at(&block, index as usize * 4))
    }

    /// 列出路径`components`所指目录的内容
    pub fn read_directory(&self, components: &[&str]) -> Result<Vec<DirEntry>, Error> {
        let mut dir = self.read_inode(ROOT_INODE)?;
        for name in components {
            let entry = self
                .list(&dir)?
                .into_iter()
                .find(|entry| entry.name == *name)
                .ok_or(Error::NotFound)?;
            if !entry.is_dir() {
                return Err(Error::NotADirectory);
            }
            dir = self.read_inode(entry.locator as u32)?;
        }
        self.list(&dir)
    }

    fn list(&self, dir: &Inode) -> Result<Vec<DirEntry>, Error> {
        if !dir.is_dir() {
            return Err(Error::NotADirectory);
        }

        let mut entries = Vec::new();
        for index in 0..dir.size.div_ceil(self.sb.block_size) {
            let block_no = self.get_block_no_from_inode(dir, index)?;
            if block_no == 0 {
                continue;
            }
            for record in dir::parse_block(&self.read_block(block_no)?) {
                let inode = self.read_inode(record.inode)?;
                entries.push(DirEntry {
                    name: record.name,
                    size: inode.size,
                    ty: inode.file_type(),
                    locator: record.inode.into(),
                });
            }
        }

        Ok(entries)
    }

    pub fn open(&self, entry: &DirEntry) -> Result<File, Error> {
        let ino = u32::try_from(entry.locator).map_err(|_| Error::Invalid)?;
        let inode = self.read_inode(ino)?;
        Ok(File { ino, inode })
    }

    /// 从`pos`处读取，返回读到的字节数；未分配的块读出全零
    pub fn read(&self, file: &File, pos: u64, buf: &mut [u8]) -> Result<usize, Error> {
        let len = file.len();
        if pos >= len {
            return Ok(0);
        }
        let to_read = buf.len().min((len - pos) as usize);
        let block_size = u64::from(self.sb.block_size);

        let mut done = 0;
        while done < to_read {
            let cur = pos + done as u64;
            let index = u32::try_from(cur / block_size).map_err(|_| Error::Invalid)?;
            let within = (cur % block_size) as usize;
            let count = (block_size as usize - within).min(to_read - done);

            let dst = &mut buf[done..done + count];
            match self.get_block_no_from_inode(&file.inode, index)? {
                0 => dst.fill(0),
                block_no => {
                    let block = self.read_block(block_no)?;
                    dst.copy_from_slice(&block[within..within + count]);
                }
            }
            done += count;
        }

        Ok(to_read)
    }
}
