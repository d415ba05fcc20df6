//! 各文件系统后端与虚拟文件系统共用的类型
//!
//! 只读：所有写操作都会得到 [`Error::ReadOnly`]。

#![no_std]

extern crate alloc;

mod dirent;
mod error;
mod mode;
mod path;
mod stat;

pub use self::{
    dirent::{DirEntry, DirEntryType},
    error::Error,
    mode::OpenMode,
    path::VfsPath,
    stat::Stat,
};
