//! 目录块由变长记录串成：inode(4) rec_len(2) name_len(1) file_type(1) name

use alloc::string::String;
use alloc::vec::Vec;

use crate::util::{u16_at, u32_at};

const HEADER_SIZE: usize = 8;

/// 目录块中的一条记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirRecord {
    pub inode: u32,
    pub name: String,
}

/// 解析一个目录块，跳过空记录与`.`、`..`
pub fn parse_block(block: &[u8]) -> Vec<DirRecord> {
    let mut records = Vec::new();
    let mut offset = 0;

    while offset + HEADER_SIZE <= block.len() {
        let inode = u32_at(block, offset);
        let rec_len = usize::from(u16_at(block, offset + 4));
        let name_len = usize::from(block[offset + 6]);
        if rec_len == 0 {
            break;
        }

        let name_start = offset + HEADER_SIZE;
        let Some(name) = block.get(name_start..name_start + name_len) else {
            log::debug!("EXT2: directory record at {offset} overruns the block");
            break;
        };

        if inode != 0 && name != b"." && name != b".." {
            records.push(DirRecord {
                inode,
                name: String::from_utf8_lossy(name).into_owned(),
            });
        }

        offset += rec_len;
    }

    records
}
