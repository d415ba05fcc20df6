use vfs::DirEntryType;

use crate::util::{u16_at, u32_at};

/// 直接块指针数
pub const DIRECT_POINTERS: usize = 12;
/// 解析所需的inode前缀长度
pub const INODE_PREFIX: usize = 128;

pub const ROOT_INODE: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    pub mode: u16,
    /// 文件长度的低32位
    pub size: u32,
    pub direct: [u32; DIRECT_POINTERS],
    pub singly: u32,
    pub doubly: u32,
    pub triply: u32,
}

impl Inode {
    pub fn parse(raw: &[u8]) -> Self {
        Self {
            mode: u16_at(raw, 0),
            size: u32_at(raw, 4),
            direct: core::array::from_fn(|i| u32_at(raw, 40 + i * 4)),
            singly: u32_at(raw, 88),
            doubly: u32_at(raw, 92),
            triply: u32_at(raw, 96),
        }
    }

    pub fn file_type(&self) -> DirEntryType {
        match self.mode & 0xF000 {
            0x1000 => DirEntryType::Fifo,
            0x2000 => DirEntryType::Char,
            0x4000 => DirEntryType::Directory,
            0x6000 => DirEntryType::Block,
            0xA000 => DirEntryType::SymLink,
            0xC000 => DirEntryType::Socket,
            _ => DirEntryType::Regular,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.file_type() == DirEntryType::Directory
    }
}

#[cfg(test)]
mod tests {
    use vfs::DirEntryType;

    use super::Inode;

    #[test]
    fn parse_pointers() {
        let mut raw = [0u8; 128];
        raw[0..2].copy_from_slice(&0x41EDu16.to_le_bytes());
        raw[4..8].copy_from_slice(&4096u32.to_le_bytes());
        for i in 0..15u32 {
            let at = 40 + i as usize * 4;
            raw[at..at + 4].copy_from_slice(&(100 + i).to_le_bytes());
        }

        let inode = Inode::parse(&raw);
        assert!(inode.is_dir());
        assert_eq!(inode.size, 4096);
        assert_eq!(inode.direct[0], 100);
        assert_eq!(inode.direct[11], 111);
        assert_eq!((inode.singly, inode.doubly, inode.triply), (112, 113, 114));
    }

    #[test]
    fn file_types() {
        let mut raw = [0u8; 128];
        raw[0..2].copy_from_slice(&0x81A4u16.to_le_bytes());
        assert_eq!(Inode::parse(&raw).file_type(), DirEntryType::Regular);
        raw[0..2].copy_from_slice(&0xA1FFu16.to_le_bytes());
        assert_eq!(Inode::parse(&raw).file_type(), DirEntryType::SymLink);
    }
}
