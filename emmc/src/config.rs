use enumflags2::BitFlags;

use crate::regs::ErrorKind;

/// BCM2835的EMMC控制器基址
pub const DEFAULT_BASE_ADDR: usize = 0x2030_0000;

#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub base_addr: usize,
    /// 等待命令完成
    pub command_timeout_us: u64,
    /// 等待缓冲区就绪与传输完成
    pub data_timeout_us: u64,
    pub reset_timeout_us: u64,
    pub clock_timeout_us: u64,
    /// ACMD41轮询间隔
    pub op_cond_interval_us: u64,
    /// CMD17最多尝试次数
    pub read_tries: usize,
    /// 出现这些错误时重发CMD17
    pub read_retry_mask: BitFlags<ErrorKind>,
    /// 允许切换到1.8V信号电压
    pub allow_1v8: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_addr: DEFAULT_BASE_ADDR,
            command_timeout_us: 500_000,
            data_timeout_us: 500_000,
            reset_timeout_us: 1_000_000,
            clock_timeout_us: 0x100_0000,
            op_cond_interval_us: 500_000,
            read_tries: 3,
            read_retry_mask: ErrorKind::CMD_CRC | ErrorKind::DATA_CRC,
            allow_1v8: false,
        }
    }
}
