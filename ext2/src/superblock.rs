//! 超级块
//!
//! 位于卷的第1024字节处，长1024字节，字段均为小端序。

use crate::group::DESCRIPTOR_SIZE;
use crate::util::{u16_at, u32_at};

pub const SUPERBLOCK_OFFSET: u64 = 1024;
pub const SUPERBLOCK_SIZE: usize = 1024;
pub const EXT2_MAGIC: u16 = 0xEF53;

/// 修订版0固定的inode大小
const GOOD_OLD_INODE_SIZE: u16 = 128;
/// 块指针宽度
const POINTER_SIZE: u32 = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superblock {
    pub total_inodes: u32,
    pub total_blocks: u32,
    pub block_size: u32,
    pub blocks_per_group: u32,
    pub inodes_per_group: u32,
    pub minor_version: u16,
    pub major_version: u32,
    pub inode_size: u16,
    pub total_groups: u32,
    /// 一级、二级、三级间接块可寻址的块数
    pub pointers_per_indirect_block: [u64; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuperblockError {
    BadMagic(u16),
    BadGeometry,
    /// 按inode数和按块数算出的块组数不一致
    GroupCountMismatch { by_inodes: u32, by_blocks: u32 },
}

impl Superblock {
    pub fn parse(raw: &[u8; SUPERBLOCK_SIZE]) -> Result<Self, SuperblockError> {
        let magic = u16_at(raw, 56);
        if magic != EXT2_MAGIC {
            return Err(SuperblockError::BadMagic(magic));
        }

        let total_inodes = u32_at(raw, 0);
        let total_blocks = u32_at(raw, 4);
        let log_block_size = u32_at(raw, 24);
        let blocks_per_group = u32_at(raw, 32);
        let inodes_per_group = u32_at(raw, 40);
        let minor_version = u16_at(raw, 62);
        let major_version = u32_at(raw, 76);
        let inode_size = if major_version >= 1 {
            u16_at(raw, 88)
        } else {
            GOOD_OLD_INODE_SIZE
        };

        let block_size = 1024u32
            .checked_shl(log_block_size)
            .filter(|size| (1024..=65536).contains(size))
            .ok_or(SuperblockError::BadGeometry)?;
        if blocks_per_group == 0 || inodes_per_group == 0 || inode_size < GOOD_OLD_INODE_SIZE {
            return Err(SuperblockError::BadGeometry);
        }

        let by_inodes = total_inodes.div_ceil(inodes_per_group);
        let by_blocks = total_blocks.div_ceil(blocks_per_group);
        if by_inodes != by_blocks {
            return Err(SuperblockError::GroupCountMismatch {
                by_inodes,
                by_blocks,
            });
        }
        // 块组描述符表位于第0个块组之内
        let table_bytes = u64::from(by_inodes) * DESCRIPTOR_SIZE as u64;
        if table_bytes > u64::from(blocks_per_group) * u64::from(block_size) {
            return Err(SuperblockError::BadGeometry);
        }

        let ppib = u64::from(block_size / POINTER_SIZE);

        Ok(Self {
            total_inodes,
            total_blocks,
            block_size,
            blocks_per_group,
            inodes_per_group,
            minor_version,
            major_version,
            inode_size,
            total_groups: by_inodes,
            pointers_per_indirect_block: [ppib, ppib * ppib, ppib * ppib * ppib],
        })
    }

    /// 块组描述符表所在的块
    pub fn bgdt_block(&self) -> u32 {
        if self.block_size == 1024 { 2 } else { 1 }
    }
}
