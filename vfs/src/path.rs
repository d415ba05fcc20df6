//! 带设备前缀的路径：`(device)/a/b/c`
//!
//! - `(`只能出现在首位，与之配对的`)`结束设备名
//! - 设备名中不能出现`/`
//! - 连续的`/`之间的空段会被跳过
//! - 没有设备前缀时由调用者回退到默认设备

use alloc::vec::Vec;

use crate::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VfsPath<'a> {
    /// `None`表示使用默认设备
    pub device: Option<&'a str>,
    /// 各级目录，最后一项为目标名
    pub components: Vec<&'a str>,
}

impl<'a> VfsPath<'a> {
    pub fn parse(path: &'a str) -> Result<Self, Error> {
        let mut device = None;
        let mut rest = path;

        if let Some(after) = path.strip_prefix('(') {
            let end = after.find([')', '/', '(']).ok_or_else(|| {
                log::debug!("unterminated device name in {path:?}");
                Error::Invalid
            })?;
            if after.as_bytes()[end] != b')' {
                log::debug!("invalid character in device name of {path:?} at {}", end + 1);
                return Err(Error::Invalid);
            }
            if end == 0 {
                log::debug!("empty device name in {path:?}");
                return Err(Error::Invalid);
            }
            device = Some(&after[..end]);
            rest = &after[end + 1..];
        }

        if let Some(pos) = rest.find(['(', ')']) {
            log::debug!("misplaced parenthesis in {path:?} at {}", path.len() - rest.len() + pos);
            return Err(Error::Invalid);
        }

        let components = rest.split('/').filter(|cmp| !cmp.is_empty()).collect();

        Ok(Self { device, components })
    }

    /// 返回`(所在目录, 目标名)`；路径为空时返回`None`
    pub fn split_last(&self) -> Option<(&[&'a str], &'a str)> {
        let (name, parent) = self.components.split_last()?;
        Some((parent, name))
    }
}
