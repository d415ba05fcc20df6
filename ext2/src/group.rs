use crate::util::{u16_at, u32_at};

pub const DESCRIPTOR_SIZE: usize = 32;

/// 块组描述符
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockGroupDescriptor {
    pub block_bitmap: u32,
    pub inode_bitmap: u32,
    pub inode_table: u32,
    pub free_blocks: u16,
    pub free_inodes: u16,
    pub used_dirs: u16,
}

impl BlockGroupDescriptor {
    pub fn parse(raw: &[u8]) -> Self {
        Self {
            block_bitmap: u32_at(raw, 0),
            inode_bitmap: u32_at(raw, 4),
            inode_table: u32_at(raw, 8),
            free_blocks: u16_at(raw, 12),
            free_inodes: u16_at(raw, 14),
            used_dirs: u16_at(raw, 16),
        }
    }
}
