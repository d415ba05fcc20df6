use core::fmt;

use enumflags2::BitFlags;

use crate::regs::ErrorKind;

/// CMD3应答中的错误标志
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardStatusError {
    Crc,
    IllegalCommand,
    Generic,
    NotReady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// 主机控制器版本低于SDHCI 3.0
    UnsupportedController,
    ResetTimeout,
    ClockUnstable,
    NoCard,
    UnusableCard,
    /// 命令失败，附带解码后的错误中断位
    Transport(BitFlags<ErrorKind>),
    /// 等待数据中断超时
    Timeout,
    CardStatus(CardStatusError),
    InvalidState(u8),
    UnexpectedResponse(u32),
    /// 块号换算为字节地址后溢出
    OutOfRange,
}

impl Error {
    pub fn errno(&self) -> i32 {
        match self {
            Error::NoCard => -3,
            Error::OutOfRange => -2,
            _ => -5,
        }
    }
}

impl From<Error> for block_dev::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::NoCard => block_dev::Error::NoDevice,
            Error::OutOfRange => block_dev::Error::OutOfRange,
            err => block_dev::Error::Io(err.errno()),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnsupportedController => f.write_str("unsupported host controller"),
            Error::ResetTimeout => f.write_str("controller did not reset"),
            Error::ClockUnstable => f.write_str("controller clock did not stabilise"),
            Error::NoCard => f.write_str("no SD card"),
            Error::UnusableCard => f.write_str("unusable card"),
            Error::Transport(flags) => write!(f, "command failed: {flags:?}"),
            Error::Timeout => f.write_str("timed out waiting for data"),
            Error::CardStatus(status) => write!(f, "card reported {status:?}"),
            Error::InvalidState(state) => write!(f, "card in invalid state {state}"),
            Error::UnexpectedResponse(resp) => write!(f, "unexpected response {resp:#x}"),
            Error::OutOfRange => f.write_str("block address out of range"),
        }
    }
}

impl core::error::Error for Error {}
