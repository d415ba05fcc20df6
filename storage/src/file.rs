use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use vfs::Error;

use crate::filesystem::FileInner;
use crate::registry::Mount;

/// 文件内的定位方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekFrom {
    Start(u64),
    Current(i64),
    End(i64),
}

/// 已打开的文件，关闭后失效
#[derive(Debug)]
pub struct File {
    mount: Arc<Mount>,
    inner: FileInner,
    /// **文件**内的偏移量
    pos: u64,
    len: u64,
}

impl File {
    pub(crate) fn new(mount: Arc<Mount>, inner: FileInner) -> Self {
        let len = inner.len();
        Self {
            mount,
            inner,
            pos: 0,
            len,
        }
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn tell(&self) -> u64 {
        self.pos
    }

    /// 所在设备的名称
    pub fn device_name(&self) -> &str {
        self.mount.name()
    }

    /// 至多读取`min(buf.len(), len - pos)`字节，并前移读写位置
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let remain = self.len - self.pos;
        let count = buf.len().min(usize::try_from(remain).unwrap_or(usize::MAX));
        if count == 0 {
            return Ok(0);
        }

        let read = self
            .mount
            .filesystem()
            .read(&self.inner, self.pos, &mut buf[..count])?;
        self.pos += read as u64;

        Ok(read)
    }

    /// 读出从当前位置到文件末尾的全部内容
    pub fn read_to_end(&mut self) -> Result<Vec<u8>, Error> {
        let remain = usize::try_from(self.len - self.pos).map_err(|_| Error::NoMemory)?;
        let mut data = vec![0; remain];
        let mut done = 0;
        while done < remain {
            match self.read(&mut data[done..])? {
                0 => break,
                n => done += n,
            }
        }
        data.truncate(done);

        Ok(data)
    }

    /// 新位置被限制在`[0, len]`内
    pub fn seek(&mut self, pos: SeekFrom) -> u64 {
        let target = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::Current(delta) => i128::from(self.pos) + i128::from(delta),
            SeekFrom::End(delta) => i128::from(self.len) + i128::from(delta),
        };
        self.pos = target.clamp(0, i128::from(self.len)) as u64;
        self.pos
    }

    #[inline]
    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    pub fn close(self) {
        log::trace!("closing file on {}", self.mount.name());
    }
}
