use std::cell::RefCell;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

use block_dev::BlockDevice;
use send_wrapper::SendWrapper;

/// 镜像按512字节的扇区读取
const SECTOR_SIZE: usize = 512;

/// 把磁盘镜像文件当作块设备
#[derive(Debug)]
pub struct BlockFile {
    name: String,
    blocks: u64,
    inner: SendWrapper<RefCell<File>>,
}

impl BlockFile {
    pub fn new(fd: File, name: &str) -> io::Result<Self> {
        let blocks = fd.metadata()?.len() / SECTOR_SIZE as u64;
        Ok(Self {
            name: name.to_owned(),
            blocks,
            inner: SendWrapper::new(RefCell::new(fd)),
        })
    }
}

impl BlockDevice for BlockFile {
    fn driver_name(&self) -> &str {
        "file"
    }

    fn device_name(&self) -> &str {
        &self.name
    }

    fn device_id(&self) -> Vec<u8> {
        self.name.as_bytes().to_vec()
    }

    fn block_size(&self) -> usize {
        SECTOR_SIZE
    }

    fn block_count(&self) -> Option<u64> {
        Some(self.blocks)
    }

    fn read_block(&self, block_id: u32, buf: &mut [u8]) -> Result<usize, block_dev::Error> {
        if u64::from(block_id) >= self.blocks {
            return Err(block_dev::Error::OutOfRange);
        }

        let len = buf.len().min(SECTOR_SIZE);
        let mut file = self.inner.borrow_mut();
        file.seek(SeekFrom::Start(u64::from(block_id) * SECTOR_SIZE as u64))
            .and_then(|_| file.read_exact(&mut buf[..len]))
            .map_err(|err| {
                log::error!("failed to read block {block_id} of {}: {err}", self.name);
                block_dev::Error::Io(vfs::Error::Fault.errno())
            })?;

        Ok(len)
    }
}
