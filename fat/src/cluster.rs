use derive_more::{Add, From, Into};

/// 簇编号，数据区第一个簇的编号为2
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into)]
#[repr(transparent)]
pub struct ClusterId(u32);

impl ClusterId {
    pub const FREE: Self = Self(0);

    /// 最小的可用簇号
    pub const MIN: Self = Self(2);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// 由目录项中的高低两半拼出
    pub fn from_halves(low: u16, high: u16) -> Self {
        Self(u32::from(high) << 16 | u32::from(low))
    }

    /// 在数据区中的序号
    pub fn data_index(self) -> Option<u32> {
        self.0.checked_sub(Self::MIN.0)
    }
}

/// 逻辑扇区号（以BPB中的扇区大小为单位）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Add, From, Into)]
#[repr(transparent)]
pub struct SectorId(u32);

impl core::ops::Add<u32> for SectorId {
    type Output = Self;

    fn add(self, rhs: u32) -> Self::Output {
        self + Self(rhs)
    }
}

/// FAT表项的含义
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatEntry {
    Free,
    Next(ClusterId),
    Bad,
    Eof,
}
