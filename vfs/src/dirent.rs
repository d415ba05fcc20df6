use alloc::string::String;

/// 目录中的一项，由调用者持有。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    /// 字节大小
    pub size: u32,
    pub ty: DirEntryType,
    /// 后端私有的定位信息：ext2为inode号，FAT为起始簇号
    pub locator: u64,
}

impl DirEntry {
    #[inline]
    pub fn is_dir(&self) -> bool {
        self.ty == DirEntryType::Directory
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum DirEntryType {
    Block,
    Char,
    Directory,
    Fifo,
    Socket,
    SymLink,
    #[default]
    Regular,
}
