//! # 块设备接口层
//!
//! 块设备是以**块**为单位存储数据的设备，例如SD卡、磁盘分区等；
//! [`BlockDevice`] 就是对读块设备的抽象，实现了此特质的类型称为**块设备驱动**。
//!
//! 设备可以层层组合：分区设备包裹着卡设备，并把逻辑块号平移后交给父设备。

#![no_std]

extern crate alloc;

mod error;
pub mod mbr;
mod ram;

use alloc::vec;
use alloc::vec::Vec;
use core::any::Any;
use core::fmt::Debug;

pub use self::{error::Error, ram::RamDisk};

/// 块设备驱动特质
///
/// 块大小在设备的整个生命周期内不变。
pub trait BlockDevice: Debug + Send + Sync + Any {
    fn driver_name(&self) -> &str;

    fn device_name(&self) -> &str;

    /// 设备标识，例如SD卡的CID
    fn device_id(&self) -> Vec<u8>;

    fn block_size(&self) -> usize;

    /// 设备的总块数，未知时为`None`
    fn block_count(&self) -> Option<u64> {
        None
    }

    /// 读取`block_id`号块，至多拷贝`min(buf.len(), block_size)`字节，返回拷贝的字节数。
    fn read_block(&self, block_id: u32, buf: &mut [u8]) -> Result<usize, Error>;
}

impl dyn BlockDevice {
    /// 以块为单位拆分读请求：共`ceil(buf.len() / block_size)`次子读取，
    /// 块号逐次加一，任何一次失败立即返回该错误。
    pub fn read_blocks(&self, start_block: u32, buf: &mut [u8]) -> Result<usize, Error> {
        let block_size = self.block_size();
        if block_size == 0 {
            return Err(Error::Invalid);
        }

        let mut read_size = 0;
        for (i, chunk) in buf.chunks_mut(block_size).enumerate() {
            let block_id = u32::try_from(i)
                .ok()
                .and_then(|offset| start_block.checked_add(offset))
                .ok_or(Error::OutOfRange)?;
            log::trace!(
                "block_read: reading {} bytes from block {block_id} on {}",
                chunk.len(),
                self.device_name()
            );
            read_size += self.read_block(block_id, chunk)?;
        }

        Ok(read_size)
    }

    /// 从字节偏移`offset`处读满`buf`，偏移与长度无需对齐。
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), Error> {
        let block_size = self.block_size() as u64;
        if block_size == 0 {
            return Err(Error::Invalid);
        }
        if buf.is_empty() {
            return Ok(());
        }

        let end = offset + buf.len() as u64;
        let first = offset / block_size;
        let last = end.div_ceil(block_size);
        let start = u32::try_from(first).map_err(|_| Error::OutOfRange)?;

        let mut blocks = vec![0; ((last - first) * block_size) as usize];
        let read_size = self.read_blocks(start, &mut blocks)?;
        if read_size != blocks.len() {
            return Err(Error::ShortRead {
                expected: blocks.len(),
                actual: read_size,
            });
        }

        let skip = (offset - first * block_size) as usize;
        buf.copy_from_slice(&blocks[skip..skip + buf.len()]);
        Ok(())
    }
}
