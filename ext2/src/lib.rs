//! # ext2文件系统
//!
//! 只读实现：超级块、块组描述符表、inode与至多三级的间接块寻址。

#![no_std]

extern crate alloc;

mod dir;
mod fs;
mod group;
mod inode;
mod superblock;
mod util;

pub use self::{
    dir::{parse_block, DirRecord},
    fs::{Ext2Fs, File, MountError},
    group::BlockGroupDescriptor,
    inode::{Inode, DIRECT_POINTERS, ROOT_INODE},
    superblock::{Superblock, SuperblockError, EXT2_MAGIC},
};
