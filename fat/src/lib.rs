//! # FAT文件系统
//!
//! 只读实现，支持FAT12、FAT16与FAT32。
//!
//! 卷的布局：保留区 | FAT区 | 根目录(FAT12/16) | 数据区

#![no_std]

extern crate alloc;

mod bpb;
mod cluster;
mod dir_entry;
mod fs;

pub use self::{
    bpb::{Bpb, BpbError, FatType},
    cluster::{ClusterId, FatEntry, SectorId},
    dir_entry::{AttrFlag, ShortDirEntry},
    fs::{FatFileSystem, File, MountError},
};
