use alloc::string::String;
use alloc::vec::Vec;

use spin::Mutex;

use crate::{BlockDevice, Error};

/// 内存盘，用于镜像挂载与测试
///
/// 记录每次读取的块号，并可在指定块号上注入读错误。
#[derive(Debug)]
pub struct RamDisk {
    name: String,
    block_size: usize,
    data: Vec<u8>,
    reads: Mutex<Vec<u32>>,
    fail_at: Mutex<Option<u32>>,
}

impl RamDisk {
    pub fn new(name: &str, block_size: usize, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            block_size,
            data,
            reads: Mutex::new(Vec::new()),
            fail_at: Mutex::new(None),
        }
    }

    /// 之后读取`block_id`号块时返回`Error::Io(-5)`
    pub fn fail_at(&self, block_id: u32) {
        *self.fail_at.lock() = Some(block_id);
    }

    /// 已读取过的块号，按读取顺序
    pub fn reads(&self) -> Vec<u32> {
        self.reads.lock().clone()
    }

    pub fn clear_reads(&self) {
        self.reads.lock().clear();
    }
}

impl BlockDevice for RamDisk {
    fn driver_name(&self) -> &str {
        "ramdisk"
    }

    fn device_name(&self) -> &str {
        &self.name
    }

    fn device_id(&self) -> Vec<u8> {
        self.name.as_bytes().to_vec()
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn block_count(&self) -> Option<u64> {
        Some((self.data.len() / self.block_size) as u64)
    }

    fn read_block(&self, block_id: u32, buf: &mut [u8]) -> Result<usize, Error> {
        self.reads.lock().push(block_id);
        if *self.fail_at.lock() == Some(block_id) {
            return Err(Error::Io(-5));
        }

        let start = block_id as usize * self.block_size;
        let block = self
            .data
            .get(start..start + self.block_size)
            .ok_or(Error::OutOfRange)?;
        let len = buf.len().min(self.block_size);
        buf[..len].copy_from_slice(&block[..len]);

        Ok(len)
    }
}
