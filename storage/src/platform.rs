//! 平台探测（ATAG或设备树）的结果
//!
//! 探测代码逐项报告内存区间与外设基址，存储栈只读取其中的EMMC基址。

use alloc::vec::Vec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRange {
    pub start: usize,
    pub size: usize,
}

impl MemoryRange {
    #[inline]
    pub fn end(&self) -> usize {
        self.start + self.size
    }
}

#[derive(Debug, Clone, Default)]
pub struct Platform {
    memory: Vec<MemoryRange>,
    emmc_base: Option<usize>,
}

impl Platform {
    pub const fn new() -> Self {
        Self {
            memory: Vec::new(),
            emmc_base: None,
        }
    }

    pub fn report_memory(&mut self, start: usize, size: usize) {
        log::debug!("platform: memory {start:#x}..{:#x}", start + size);
        self.memory.push(MemoryRange { start, size });
    }

    pub fn memory(&self) -> &[MemoryRange] {
        &self.memory
    }

    pub fn set_emmc_base(&mut self, base: usize) {
        log::debug!("platform: emmc controller at {base:#x}");
        self.emmc_base = Some(base);
    }

    pub fn emmc_base(&self) -> Option<usize> {
        self.emmc_base
    }
}
