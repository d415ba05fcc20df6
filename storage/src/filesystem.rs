//! 文件系统后端的分派
//!
//! 后端是封闭的集合 {ext2, FAT, NoFS}，统一提供
//! `read_directory`、`open`、`read`三种能力。

use alloc::sync::Arc;
use alloc::vec::Vec;

use block_dev::BlockDevice;
use ext2::Ext2Fs;
use fat::FatFileSystem;
use vfs::{DirEntry, Error};

use crate::nofs::{self, NoFs};

/// 不带分区表或未知类型，按 FAT → ext2 的顺序探测
pub const KIND_PROBE: u8 = 0x00;
pub const KIND_EXT2: u8 = 0x83;
/// 无文件系统的裸卷
pub const KIND_NOFS: u8 = 0xda;
#[rustfmt::skip]
pub const KIND_FAT: [u8; 11] = [
    0x01, 0x04, 0x06, 0x0b, 0x0c, 0x0e,
    0x11, 0x14, 0x1b, 0x1c, 0x1e,
];

#[derive(Debug)]
pub enum Filesystem {
    Ext2(Ext2Fs),
    Fat(FatFileSystem),
    NoFs(NoFs),
}

/// 后端打开的文件
#[derive(Debug, Clone)]
pub enum FileInner {
    Ext2(ext2::File),
    Fat(fat::File),
    NoFs(nofs::File),
}

impl FileInner {
    pub fn len(&self) -> u64 {
        match self {
            Self::Ext2(file) => file.len(),
            Self::Fat(file) => file.len(),
            Self::NoFs(file) => file.len(),
        }
    }
}

impl Filesystem {
    /// 按分区类型挂载：
    ///
    /// | 类型 | 行为 |
    /// |---|---|
    /// | 0 | 依次探测FAT、ext2；NoFS没有签名，不参与探测 |
    /// | FAT类型 | 只尝试FAT |
    /// | 0x83 | 只尝试ext2 |
    /// | 0xda | 只尝试NoFS |
    pub fn probe(dev: &Arc<dyn BlockDevice>, kind: u8) -> Option<Self> {
        match kind {
            KIND_PROBE => FatFileSystem::probe(dev)
                .map(Self::Fat)
                .or_else(|| Ext2Fs::probe(dev).map(Self::Ext2)),
            KIND_EXT2 => Ext2Fs::probe(dev).map(Self::Ext2),
            KIND_NOFS => NoFs::mount(dev.clone()).map(Self::NoFs),
            kind if KIND_FAT.contains(&kind) => FatFileSystem::probe(dev).map(Self::Fat),
            kind => {
                log::info!(
                    "unsupported partition type {kind:#04x} on {}",
                    dev.device_name()
                );
                None
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Ext2(_) => "ext2",
            Self::Fat(_) => "fat",
            Self::NoFs(_) => "nofs",
        }
    }

    pub fn device(&self) -> &Arc<dyn BlockDevice> {
        match self {
            Self::Ext2(fs) => fs.device(),
            Self::Fat(fs) => fs.device(),
            Self::NoFs(fs) => fs.device(),
        }
    }

    pub fn read_directory(&self, components: &[&str]) -> Result<Vec<DirEntry>, Error> {
        match self {
            Self::Ext2(fs) => fs.read_directory(components),
            Self::Fat(fs) => fs.read_directory(components),
            Self::NoFs(fs) => fs.read_directory(components),
        }
    }

    pub fn open(&self, entry: &DirEntry) -> Result<FileInner, Error> {
        match self {
            Self::Ext2(fs) => fs.open(entry).map(FileInner::Ext2),
            Self::Fat(fs) => fs.open(entry).map(FileInner::Fat),
            Self::NoFs(fs) => fs.open(entry).map(FileInner::NoFs),
        }
    }

    pub fn read(&self, file: &FileInner, pos: u64, buf: &mut [u8]) -> Result<usize, Error> {
        match (self, file) {
            (Self::Ext2(fs), FileInner::Ext2(file)) => fs.read(file, pos, buf),
            (Self::Fat(fs), FileInner::Fat(file)) => fs.read(file, pos, buf),
            (Self::NoFs(fs), FileInner::NoFs(file)) => fs.read(file, pos, buf),
            _ => Err(Error::Invalid),
        }
    }
}
