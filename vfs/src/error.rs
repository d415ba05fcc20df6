use core::fmt;

/// 错误码，取值与引导程序其余部分约定的负数一致
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Error {
    NoMemory = -1,
    Invalid = -2,
    NotFound = -3,
    NotADirectory = -4,
    Fault = -5,
    ReadOnly = -6,
}

impl Error {
    pub const fn errno(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for Error {
    type Error = i32;

    fn try_from(errno: i32) -> Result<Self, Self::Error> {
        Ok(match errno {
            -1 => Self::NoMemory,
            -2 => Self::Invalid,
            -3 => Self::NotFound,
            -4 => Self::NotADirectory,
            -5 => Self::Fault,
            -6 => Self::ReadOnly,
            other => return Err(other),
        })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::NoMemory => "out of memory",
            Self::Invalid => "invalid argument",
            Self::NotFound => "no such file or directory",
            Self::NotADirectory => "not a directory",
            Self::Fault => "device fault",
            Self::ReadOnly => "read-only file system",
        };
        write!(f, "{msg} ({})", self.errno())
    }
}
