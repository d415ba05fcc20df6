//! EMMC控制器寄存器与命令编码
//!
//! References
//! - SD Host Controller Simplified Specification ver 3.00
//! - SD Physical Layer Simplified Specification ver 3.00
//! - BCM2835 ARM Peripherals

use enumflags2::{bitflags, BitFlags};

/// 寄存器相对控制器基址的偏移
#[rustfmt::skip]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Reg {
    Arg2          = 0x00,
    BlkSizeCnt    = 0x04,
    Arg1          = 0x08,
    Cmdtm         = 0x0C,
    Resp0         = 0x10,
    Resp1         = 0x14,
    Resp2         = 0x18,
    Resp3         = 0x1C,
    Data          = 0x20,
    Status        = 0x24,
    Control0      = 0x28,
    Control1      = 0x2C,
    Interrupt     = 0x30,
    IrptMask      = 0x34,
    IrptEn        = 0x38,
    Control2      = 0x3C,
    Capabilities0 = 0x40,
    Capabilities1 = 0x44,
    SlotIsrVer    = 0xFC,
}

/// Interrupt Register
#[allow(non_camel_case_types)]
#[rustfmt::skip]
#[bitflags]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    CMD_DONE  = 1 << 0,
    DATA_DONE = 1 << 1,
    READ_RDY  = 1 << 5,
    ERR       = 1 << 15,
}

/// 错误中断位（INTERRUPT寄存器的第16位起）
#[allow(non_camel_case_types)]
#[rustfmt::skip]
#[bitflags]
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    CMD_TIMEOUT   = 1 << 0,
    CMD_CRC       = 1 << 1,
    CMD_END_BIT   = 1 << 2,
    CMD_INDEX     = 1 << 3,
    DATA_TIMEOUT  = 1 << 4,
    DATA_CRC      = 1 << 5,
    DATA_END_BIT  = 1 << 6,
    CURRENT_LIMIT = 1 << 7,
    AUTO_CMD12    = 1 << 8,
    ADMA          = 1 << 9,
    TUNING        = 1 << 10,
}

impl ErrorKind {
    /// 从INTERRUPT寄存器的值中取出错误位
    pub fn decode(irpt: u32) -> BitFlags<ErrorKind> {
        BitFlags::from_bits_truncate((irpt >> 16) as u16)
    }
}

/// 应答命令完成与全部错误位
pub const INTERRUPT_ACK: u32 = 0xFFFF_0001;

/// STATUS: 命令线被占用
pub const STATUS_CMD_INHIBIT: u32 = 1 << 0;
/// STATUS: 卡已插入
pub const STATUS_CARD_PRESENT: u32 = 1 << 16;

/// CONTROL1: 时钟使能
pub const C1_CLK_INTLEN: u32 = 1 << 0;
/// CONTROL1: 时钟已稳定
pub const C1_CLK_STABLE: u32 = 1 << 1;
/// CONTROL1: SD时钟使能
pub const C1_CLK_EN: u32 = 1 << 2;
/// CONTROL1: 可编程时钟模式
pub const C1_CLK_GENSEL: u32 = 1 << 5;
/// CONTROL1: 分频，base clock * M/2
pub const C1_CLK_FREQ: u32 = 1 << 8;
/// CONTROL1: 数据超时 TMCLK * 2^10
pub const C1_DATA_TOUNIT: u32 = 7 << 16;
/// CONTROL1: 复位整个主机电路
pub const C1_SRST_HC: u32 = 1 << 24;
/// CONTROL1: 三个复位位
pub const C1_SRST_MASK: u32 = 7 << 24;

const fn index(idx: u32) -> u32 {
    idx << 24
}

const ISDATA: u32 = 1 << 21;
const CRCCHK_EN: u32 = 1 << 19;
const RSPNS_136: u32 = 1 << 16;
const RSPNS_48: u32 = 2 << 16;
const RSPNS_48B: u32 = 3 << 16;
const DAT_DIR_CH: u32 = 1 << 4;

/// 命令的索引号
pub const fn command_index(cmdtm: u32) -> u32 {
    cmdtm >> 24
}

#[rustfmt::skip]
pub mod cmd {
    use super::*;

    pub const GO_IDLE_STATE: u32        = index(0);
    pub const ALL_SEND_CID: u32         = index(2) | CRCCHK_EN | RSPNS_136;
    pub const SEND_RELATIVE_ADDR: u32   = index(3) | CRCCHK_EN | RSPNS_48;
    pub const SELECT_CARD: u32          = index(7) | CRCCHK_EN | RSPNS_48B;
    pub const SEND_IF_COND: u32         = index(8) | CRCCHK_EN | RSPNS_48;
    pub const VOLTAGE_SWITCH: u32       = index(11) | CRCCHK_EN | RSPNS_48;
    pub const STOP_TRANSMISSION: u32    = index(12) | CRCCHK_EN | RSPNS_48B;
    pub const SEND_STATUS: u32          = index(13) | CRCCHK_EN | RSPNS_48;
    pub const SET_BLOCKLEN: u32         = index(16) | CRCCHK_EN | RSPNS_48;
    pub const READ_SINGLE_BLOCK: u32    = index(17) | CRCCHK_EN | RSPNS_48 | DAT_DIR_CH | ISDATA;
    pub const SD_SEND_OP_COND: u32      = index(41) | RSPNS_48;
    pub const APP_CMD: u32              = index(55) | CRCCHK_EN | RSPNS_48;
}

/// CMD8的电压与校验模式
pub const IF_COND_PATTERN: u32 = 0x1AA;
/// ACMD41: 电压窗口
pub const OCR_VOLTAGE_WINDOW: u32 = 0x00FF_8000;
/// ACMD41: 主机支持大容量卡
pub const OCR_HCS: u32 = 1 << 30;
/// ACMD41: 上电完成
pub const OCR_BUSY: u32 = 1 << 31;
/// ACMD41: 支持1.8V
pub const OCR_S18A: u32 = 1 << 24;

/// R1中的卡状态
pub const fn current_state(resp: u32) -> u8 {
    ((resp >> 9) & 0xF) as u8
}

pub const STATE_STANDBY: u8 = 3;
pub const STATE_TRANSFER: u8 = 4;
pub const STATE_DATA: u8 = 5;

/// CMD17应答：处于传输态且可以收数据
pub const READ_READY_RESPONSE: u32 = 0x900;

#[cfg(test)]
mod tests {
    use enumflags2::BitFlags;

    use super::{cmd, command_index, current_state, ErrorKind, Interrupt};

    #[test]
    fn decode_error_bits() {
        let flags = ErrorKind::decode(0x0002_8001);
        assert_eq!(flags, ErrorKind::CMD_CRC);
        let flags = ErrorKind::decode(0x0021_8000);
        assert_eq!(flags, ErrorKind::CMD_TIMEOUT | ErrorKind::DATA_CRC);
        assert!(ErrorKind::decode(0x0000_8001).is_empty());
    }

    #[test]
    fn interrupt_bits_in_use() {
        assert_eq!(BitFlags::<Interrupt>::all().bits(), 0x0000_8023);
    }

    #[test]
    fn command_encoding() {
        assert_eq!(command_index(cmd::READ_SINGLE_BLOCK), 17);
        assert_eq!(cmd::READ_SINGLE_BLOCK, 0x1122_0010 | (1 << 19));
        assert_eq!(current_state(0x900), 4);
    }
}
