use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// 驱动返回的负状态码
    Io(i32),
    NoDevice,
    /// 参数非法，例如未对齐的偏移
    Invalid,
    /// 分区与父设备的块大小不一致
    BlockSizeMismatch { device: usize, parent: usize },
    OutOfRange,
    ShortRead { expected: usize, actual: usize },
}

impl Error {
    pub fn errno(&self) -> i32 {
        vfs::Error::from(*self).errno()
    }
}

impl From<Error> for vfs::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(code) => vfs::Error::try_from(code).unwrap_or(vfs::Error::Fault),
            Error::NoDevice => vfs::Error::NotFound,
            Error::Invalid | Error::BlockSizeMismatch { .. } | Error::OutOfRange => {
                vfs::Error::Invalid
            }
            Error::ShortRead { .. } => vfs::Error::Fault,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(code) => write!(f, "device I/O error {code}"),
            Error::NoDevice => f.write_str("no such device"),
            Error::Invalid => f.write_str("invalid argument"),
            Error::BlockSizeMismatch { device, parent } => {
                write!(f, "block size {device} differs from parent block size {parent}")
            }
            Error::OutOfRange => f.write_str("block out of range"),
            Error::ShortRead { expected, actual } => {
                write!(f, "short read: expected {expected} bytes, got {actual}")
            }
        }
    }
}

impl core::error::Error for Error {}
