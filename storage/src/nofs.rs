//! 没有任何元数据的裸卷
//!
//! 整个设备就是根目录下唯一的文件`kernel`。
//! 裸卷没有可校验的签名，所以只能由分区类型0xda强制挂载，从不参与自动探测。

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use block_dev::BlockDevice;
use vfs::{DirEntry, DirEntryType, Error};

pub const KERNEL_NAME: &str = "kernel";

#[derive(Debug)]
pub struct NoFs {
    dev: Arc<dyn BlockDevice>,
    len: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct File {
    len: u64,
}

impl File {
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl NoFs {
    /// 设备总块数未知时无法确定文件长度，挂载失败
    pub fn mount(dev: Arc<dyn BlockDevice>) -> Option<Self> {
        let Some(blocks) = dev.block_count() else {
            log::warn!("nofs: {} has no known size", dev.device_name());
            return None;
        };
        let len = blocks.checked_mul(dev.block_size() as u64)?;
        log::info!("nofs: raw volume on {}, {len} bytes", dev.device_name());

        Some(Self { dev, len })
    }

    pub fn device(&self) -> &Arc<dyn BlockDevice> {
        &self.dev
    }

    pub fn read_directory(&self, components: &[&str]) -> Result<Vec<DirEntry>, Error> {
        match components {
            [] => Ok(vec![DirEntry {
                name: String::from(KERNEL_NAME),
                size: u32::try_from(self.len).unwrap_or(u32::MAX),
                ty: DirEntryType::Regular,
                locator: 0,
            }]),
            [KERNEL_NAME, ..] => Err(Error::NotADirectory),
            _ => Err(Error::NotFound),
        }
    }

    pub fn open(&self, entry: &DirEntry) -> Result<File, Error> {
        if entry.name != KERNEL_NAME {
            return Err(Error::NotFound);
        }
        Ok(File { len: self.len })
    }

    pub fn read(&self, file: &File, pos: u64, buf: &mut [u8]) -> Result<usize, Error> {
        if pos >= file.len {
            return Ok(0);
        }
        let count = buf.len().min((file.len - pos) as usize);
        self.dev.read_at(pos, &mut buf[..count])?;
        Ok(count)
    }
}
