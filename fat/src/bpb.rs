//! BIOS Parameter Block BIOS参数块
//!
//! 位于卷的第一个扇区（启动扇区），所有字段为小端序。

use crate::cluster::ClusterId;
use crate::SectorId;

pub const BOOT_SECTOR_SIZE: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatType {
    T12,
    T16,
    T32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bpb {
    /// 一个扇区的字节量
    pub byts_per_sec: u16,
    /// 一个簇的扇区数
    pub sec_per_clus: u8,
    /// 保留区的扇区数
    pub rsvd_sec_cnt: u16,
    /// FAT的数量
    pub num_fats: u8,
    /// FAT12/16根目录的目录项数，FAT32为0
    pub root_ent_cnt: u16,
    pub tot_sec: u32,
    /// 一个FAT占用的扇区数
    pub fat_sz: u32,
    /// FAT32根目录的首簇
    pub root_clus: ClusterId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BpbError {
    BadSignature,
    BadJump(u8),
    BadGeometry,
}

fn u16_at(raw: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([raw[offset], raw[offset + 1]])
}

fn u32_at(raw: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([raw[offset], raw[offset + 1], raw[offset + 2], raw[offset + 3]])
}

impl Bpb {
    pub fn parse(raw: &[u8; BOOT_SECTOR_SIZE]) -> Result<Self, BpbError> {
        if raw[510..512] != [0x55, 0xAA] {
            return Err(BpbError::BadSignature);
        }
        if raw[0] != 0xEB && raw[0] != 0xE9 {
            return Err(BpbError::BadJump(raw[0]));
        }

        let tot_sec16 = u16_at(raw, 19);
        let fat_sz16 = u16_at(raw, 22);
        let bpb = Self {
            byts_per_sec: u16_at(raw, 11),
            sec_per_clus: raw[13],
            rsvd_sec_cnt: u16_at(raw, 14),
            num_fats: raw[16],
            root_ent_cnt: u16_at(raw, 17),
            tot_sec: if tot_sec16 != 0 {
                tot_sec16.into()
            } else {
                u32_at(raw, 32)
            },
            fat_sz: if fat_sz16 != 0 {
                fat_sz16.into()
            } else {
                u32_at(raw, 36)
            },
            root_clus: ClusterId::new(u32_at(raw, 44)),
        };

        let valid = matches!(bpb.byts_per_sec, 512 | 1024 | 2048 | 4096)
            && bpb.sec_per_clus.is_power_of_two()
            && bpb.rsvd_sec_cnt != 0
            && bpb.num_fats != 0
            && bpb.fat_sz != 0
            && bpb
                .checked_first_data_sector()
                .is_some_and(|sector| sector < bpb.tot_sec);
        if !valid {
            return Err(BpbError::BadGeometry);
        }

        Ok(bpb)
    }

    /// FAT12/16根目录占用的扇区数
    pub fn root_dir_sectors(&self) -> u32 {
        (u32::from(self.root_ent_cnt) * 32).div_ceil(self.byts_per_sec.into())
    }

    pub fn fat_area_sector(&self) -> SectorId {
        u32::from(self.rsvd_sec_cnt).into()
    }

    pub fn root_dir_sector(&self) -> SectorId {
        self.fat_area_sector() + u32::from(self.num_fats) * self.fat_sz
    }

    /// 数据区的首扇区，溢出时为`None`
    fn checked_first_data_sector(&self) -> Option<u32> {
        u32::from(self.num_fats)
            .checked_mul(self.fat_sz)?
            .checked_add(self.rsvd_sec_cnt.into())?
            .checked_add(self.root_dir_sectors())
    }

    /// 解析时已保证不溢出且小于`tot_sec`
    fn first_data_sector_raw(&self) -> u32 {
        self.checked_first_data_sector().unwrap_or(self.tot_sec)
    }

    pub fn first_data_sector(&self) -> SectorId {
        self.first_data_sector_raw().into()
    }

    /// 数据区的簇数
    pub fn cluster_count(&self) -> u32 {
        self.tot_sec.saturating_sub(self.first_data_sector_raw()) / u32::from(self.sec_per_clus)
    }

    pub fn cluster_bytes(&self) -> usize {
        usize::from(self.sec_per_clus) * usize::from(self.byts_per_sec)
    }

    pub fn fat_type(&self) -> FatType {
        match self.cluster_count() {
            0..=4084 => FatType::T12,
            4085..=65524 => FatType::T16,
            _ => FatType::T32,
        }
    }

    /// 簇的首个扇区
    pub fn cluster_sector(&self, id: ClusterId) -> Option<SectorId> {
        let index = id.data_index()?;
        (index < self.cluster_count())
            .then(|| self.first_data_sector() + index * u32::from(self.sec_per_clus))
    }
}
