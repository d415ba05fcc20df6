//! 32字节的短目录项
//!
//! 长文件名目录项、卷标与`.`、`..`在列目录时被跳过。

use alloc::string::String;

use enumflags2::{bitflags, BitFlags};

use crate::ClusterId;

pub const DIR_ENTRY_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[bitflags]
#[repr(u8)]
pub enum AttrFlag {
    ReadOnly = 0b0000_0001,
    Hidden = 0b0000_0010,
    /// The corresponding file is tagged as a component of the operating system
    System = 0b0000_0100,
    /// The corresponding entry contains the volume label
    VolumeID = 0b0000_1000,
    Directory = 0b0001_0000,
    /// Indicates that properties of the associated file have been modified
    Archive = 0b0010_0000,
}

impl AttrFlag {
    /// 长文件名目录项的属性
    pub fn long_name() -> BitFlags<AttrFlag> {
        AttrFlag::ReadOnly | AttrFlag::Hidden | AttrFlag::System | AttrFlag::VolumeID
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirEntryStatus {
    /// 已删除
    Free,
    /// 此项及其后均未使用
    TailFree,
    Occupied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortDirEntry {
    name: [u8; 11],
    pub attr: BitFlags<AttrFlag>,
    fst_clus_hi: u16,
    fst_clus_lo: u16,
    file_size: u32,
}

impl ShortDirEntry {
    pub fn parse(raw: &[u8]) -> Self {
        let mut name = [0; 11];
        name.copy_from_slice(&raw[..11]);
        Self {
            name,
            attr: BitFlags::from_bits_truncate(raw[11]),
            fst_clus_hi: u16::from_le_bytes([raw[20], raw[21]]),
            fst_clus_lo: u16::from_le_bytes([raw[26], raw[27]]),
            file_size: u32::from_le_bytes([raw[28], raw[29], raw[30], raw[31]]),
        }
    }

    pub fn status(&self) -> DirEntryStatus {
        match self.name[0] {
            0xE5 => DirEntryStatus::Free,
            0x00 => DirEntryStatus::TailFree,
            _ => DirEntryStatus::Occupied,
        }
    }

    pub fn is_long_name(&self) -> bool {
        self.attr == AttrFlag::long_name()
    }

    pub fn is_volume_label(&self) -> bool {
        self.attr.contains(AttrFlag::VolumeID)
    }

    pub fn is_relative(&self) -> bool {
        &self.name == b".          " || &self.name == b"..         "
    }

    pub fn is_dir(&self) -> bool {
        self.attr.contains(AttrFlag::Directory)
    }

    pub fn cluster_id(&self) -> ClusterId {
        ClusterId::from_halves(self.fst_clus_lo, self.fst_clus_hi)
    }

    pub const fn size(&self) -> u32 {
        self.file_size
    }

    /// 8.3名称转为小写，扩展名非空时以`.`连接
    pub fn name(&self) -> String {
        let mut base = self.name[..8].to_vec();
        // 0x05表示首字节实为0xE5
        if base[0] == 0x05 {
            base[0] = 0xE5;
        }
        let base = trim_padding(&base);
        let ext = trim_padding(&self.name[8..]);

        let mut name = String::with_capacity(12);
        name.extend(base.iter().map(|&b| char::from(b.to_ascii_lowercase())));
        if !ext.is_empty() {
            name.push('.');
            name.extend(ext.iter().map(|&b| char::from(b.to_ascii_lowercase())));
        }
        name
    }
}

fn trim_padding(bytes: &[u8]) -> &[u8] {
    let len = bytes.iter().rposition(|&b| b != b' ').map_or(0, |pos| pos + 1);
    &bytes[..len]
}
