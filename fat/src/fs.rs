use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use block_dev::BlockDevice;
use vfs::{DirEntry, DirEntryType, Error};

use crate::bpb::{Bpb, BpbError, FatType, BOOT_SECTOR_SIZE};
use crate::cluster::{ClusterId, FatEntry, SectorId};
use crate::dir_entry::{DirEntryStatus, ShortDirEntry, DIR_ENTRY_SIZE};

/// 只读的FAT12/16/32文件系统
#[derive(Debug)]
pub struct FatFileSystem {
    dev: Arc<dyn BlockDevice>,
    bpb: Bpb,
    fat_type: FatType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountError {
    Device(block_dev::Error),
    Bpb(BpbError),
}

impl From<block_dev::Error> for MountError {
    fn from(err: block_dev::Error) -> Self {
        Self::Device(err)
    }
}

impl From<BpbError> for MountError {
    fn from(err: BpbError) -> Self {
        Self::Bpb(err)
    }
}

/// 打开的文件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct File {
    start: ClusterId,
    len: u32,
}

impl File {
    pub fn start(&self) -> ClusterId {
        self.start
    }

    pub fn len(&self) -> u64 {
        self.len.into()
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// 目录所在的位置
#[derive(Debug, Clone, Copy)]
enum Dir {
    /// FAT12/16的固定根目录区
    FixedRoot,
    Chain(ClusterId),
}

impl FatFileSystem {
    pub fn mount(dev: Arc<dyn BlockDevice>) -> Result<Self, MountError> {
        let mut boot = [0; BOOT_SECTOR_SIZE];
        dev.read_at(0, &mut boot)?;
        let bpb = Bpb::parse(&boot)?;
        let fat_type = bpb.fat_type();

        Ok(Self { dev, bpb, fat_type })
    }

    /// 探测设备上的FAT；不是FAT时返回`None`
    pub fn probe(dev: &Arc<dyn BlockDevice>) -> Option<Self> {
        match Self::mount(dev.clone()) {
            Ok(fs) => {
                log::info!(
                    "FAT: found a {:?} filesystem on {}, {} clusters",
                    fs.fat_type,
                    dev.device_name(),
                    fs.bpb.cluster_count()
                );
                Some(fs)
            }
            Err(err) => {
                log::debug!("FAT: not a valid FAT filesystem on {}: {err:?}", dev.device_name());
                None
            }
        }
    }

    pub fn device(&self) -> &Arc<dyn BlockDevice> {
        &self.dev
    }

    pub fn bpb(&self) -> &Bpb {
        &self.bpb
    }

    pub fn fat_type(&self) -> FatType {
        self.fat_type
    }

    fn read_sectors(&self, sector: SectorId, buf: &mut [u8]) -> Result<(), block_dev::Error> {
        let offset = u64::from(u32::from(sector)) * u64::from(self.bpb.byts_per_sec);
        self.dev.read_at(offset, buf)
    }

    /// 查询簇`id`的FAT表项（第一个FAT）
    pub fn fat_entry(&self, id: ClusterId) -> Result<FatEntry, Error> {
        let n = u32::from(id);
        if n < 2 || n - 2 >= self.bpb.cluster_count() {
            return Err(Error::Invalid);
        }

        let fat_base = u64::from(u32::from(self.bpb.fat_area_sector()))
            * u64::from(self.bpb.byts_per_sec);
        let entry = match self.fat_type {
            FatType::T12 => {
                let mut raw = [0; 2];
                self.dev.read_at(fat_base + u64::from(n + n / 2), &mut raw)?;
                let value = u16::from_le_bytes(raw);
                let value = if n & 1 == 1 { value >> 4 } else { value & 0x0FFF };
                classify(value.into(), 0xFF7)
            }
            FatType::T16 => {
                let mut raw = [0; 2];
                self.dev.read_at(fat_base + u64::from(n) * 2, &mut raw)?;
                classify(u16::from_le_bytes(raw).into(), 0xFFF7)
            }
            FatType::T32 => {
                let mut raw = [0; 4];
                self.dev.read_at(fat_base + u64::from(n) * 4, &mut raw)?;
                // FAT32只用低28位
                classify(u32::from_le_bytes(raw) & 0x0FFF_FFFF, 0x0FFF_FFF7)
            }
        };

        Ok(entry)
    }

    fn next_cluster(&self, id: ClusterId) -> Result<Option<ClusterId>, Error> {
        match self.fat_entry(id)? {
            FatEntry::Next(next) => Ok(Some(next)),
            FatEntry::Eof => Ok(None),
            entry => {
                log::error!("FAT: broken cluster chain at {id:?}: {entry:?}");
                Err(Error::Fault)
            }
        }
    }

    fn read_cluster(&self, id: ClusterId, buf: &mut [u8]) -> Result<(), Error> {
        let sector = self.bpb.cluster_sector(id).ok_or(Error::Fault)?;
        self.read_sectors(sector, buf)?;
        Ok(())
    }

    fn root(&self) -> Dir {
        match self.fat_type {
            FatType::T32 => Dir::Chain(self.bpb.root_clus),
            FatType::T12 | FatType::T16 => Dir::FixedRoot,
        }
    }

    /// 读出目录的全部原始内容
    fn read_dir_raw(&self, dir: Dir) -> Result<Vec<u8>, Error> {
        match dir {
            Dir::FixedRoot => {
                let len = self.bpb.root_dir_sectors() as usize * usize::from(self.bpb.byts_per_sec);
                let mut raw = vec![0; len];
                self.read_sectors(self.bpb.root_dir_sector(), &mut raw)?;
                Ok(raw)
            }
            Dir::Chain(start) => {
                let cluster_bytes = self.bpb.cluster_bytes();
                let mut raw = Vec::new();
                let mut cur = Some(start);
                // 成环的簇链最多走遍所有簇
                for _ in 0..=self.bpb.cluster_count() {
                    let Some(id) = cur else {
                        return Ok(raw);
                    };
                    let at = raw.len();
                    raw.resize(at + cluster_bytes, 0);
                    self.read_cluster(id, &mut raw[at..])?;
                    cur = self.next_cluster(id)?;
                }
                log::error!("FAT: directory chain starting at {start:?} does not end");
                Err(Error::Fault)
            }
        }
    }

    fn list(&self, dir: Dir) -> Result<Vec<DirEntry>, Error> {
        let raw = self.read_dir_raw(dir)?;
        let mut entries = Vec::new();

        for chunk in raw.chunks_exact(DIR_ENTRY_SIZE) {
            let short = ShortDirEntry::parse(chunk);
            match short.status() {
                DirEntryStatus::TailFree => break,
                DirEntryStatus::Free => continue,
                DirEntryStatus::Occupied => {}
            }
            if short.is_long_name() || short.is_volume_label() || short.is_relative() {
                continue;
            }

            entries.push(DirEntry {
                name: short.name(),
                size: short.size(),
                ty: if short.is_dir() {
                    DirEntryType::Directory
                } else {
                    DirEntryType::Regular
                },
                locator: u32::from(short.cluster_id()).into(),
            });
        }

        Ok(entries)
    }

    /// 列出路径`components`所指目录的内容，名称比较不区分大小写
    pub fn read_directory(&self, components: &[&str]) -> Result<Vec<DirEntry>, Error> {
        let mut dir = self.root();
        for name in components {
            let entry = self
                .list(dir)?
                .into_iter()
                .find(|entry| entry.name.eq_ignore_ascii_case(name))
                .ok_or(Error::NotFound)?;
            if !entry.is_dir() {
                return Err(Error::NotADirectory);
            }
            dir = match entry.locator {
                // `..`指向根目录时簇号为0
                0 => self.root(),
                cluster => Dir::Chain(ClusterId::new(cluster as u32)),
            };
        }
        self.list(dir)
    }

    pub fn open(&self, entry: &DirEntry) -> Result<File, Error> {
        let start = u32::try_from(entry.locator).map_err(|_| Error::Invalid)?;
        Ok(File {
            start: ClusterId::new(start),
            len: entry.size,
        })
    }

    /// 从`pos`处读取，沿簇链找到起始簇
    pub fn read(&self, file: &File, pos: u64, buf: &mut [u8]) -> Result<usize, Error> {
        let len = file.len();
        if pos >= len {
            return Ok(0);
        }
        let to_read = buf.len().min((len - pos) as usize);
        let cluster_bytes = self.bpb.cluster_bytes() as u64;

        let mut cur = file.start;
        for _ in 0..pos / cluster_bytes {
            cur = self.next_cluster(cur)?.ok_or(Error::Fault)?;
        }

        let mut cluster = vec![0; cluster_bytes as usize];
        let mut within = (pos % cluster_bytes) as usize;
        let mut done = 0;
        loop {
            self.read_cluster(cur, &mut cluster)?;
            let count = (cluster.len() - within).min(to_read - done);
            buf[done..done + count].copy_from_slice(&cluster[within..within + count]);
            done += count;
            within = 0;

            if done == to_read {
                return Ok(done);
            }
            cur = self.next_cluster(cur)?.ok_or(Error::Fault)?;
        }
    }
}

fn classify(value: u32, bad: u32) -> FatEntry {
    match value {
        0 => FatEntry::Free,
        v if v == bad => FatEntry::Bad,
        v if v > bad => FatEntry::Eof,
        v => FatEntry::Next(ClusterId::new(v)),
    }
}
