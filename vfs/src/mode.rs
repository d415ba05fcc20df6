use crate::Error;

/// `fopen`风格的打开方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
    Append,
}

impl OpenMode {
    /// 解析`"r"`、`"rb"`、`"w+"`之类的字符串，只看首字符。
    pub fn parse(mode: &str) -> Result<Self, Error> {
        match mode.as_bytes().first() {
            Some(b'r') if mode.contains('+') => Ok(Self::Write),
            Some(b'r') => Ok(Self::Read),
            Some(b'w') => Ok(Self::Write),
            Some(b'a') => Ok(Self::Append),
            _ => Err(Error::Invalid),
        }
    }

    #[inline]
    pub fn is_read_only(self) -> bool {
        self == Self::Read
    }
}
