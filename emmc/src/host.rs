use core::fmt::Debug;

use crate::regs::Reg;
use crate::volatile::{ReadOnly, Volatile};

/// 主机控制器的寄存器访问
pub trait Host: Debug + Send + Sync {
    fn read(&self, reg: Reg) -> u32;

    fn write(&self, reg: Reg, value: u32);
}

/// 以MMIO方式访问的EMMC控制器
#[derive(Debug)]
pub struct MmioHost {
    base_addr: usize,
}

#[repr(C)]
struct RegisterBlock {
    arg2: Volatile<u32>,
    blksizecnt: Volatile<u32>,
    arg1: Volatile<u32>,
    cmdtm: Volatile<u32>,
    resp: [ReadOnly<u32>; 4],
    data: ReadOnly<u32>,
    status: ReadOnly<u32>,
    control0: Volatile<u32>,
    control1: Volatile<u32>,
    interrupt: Volatile<u32>,
    irpt_mask: Volatile<u32>,
    irpt_en: Volatile<u32>,
    control2: Volatile<u32>,
    capabilities: [ReadOnly<u32>; 2],
    /// 0x48..0xFC 不使用
    _padding: [ReadOnly<u32>; 45],
    slotisr_ver: ReadOnly<u32>,
}

impl MmioHost {
    /// # Safety
    ///
    /// `base_addr`必须是映射好的EMMC控制器寄存器基址，且没有其他访问者。
    pub const unsafe fn new(base_addr: usize) -> Self {
        Self { base_addr }
    }

    pub fn base_addr(&self) -> usize {
        self.base_addr
    }

    fn regs(&self) -> &RegisterBlock {
        unsafe { &*(self.base_addr as *const RegisterBlock) }
    }
}

impl Host for MmioHost {
    fn read(&self, reg: Reg) -> u32 {
        let regs = self.regs();
        match reg {
            Reg::Arg2 => regs.arg2.read(),
            Reg::BlkSizeCnt => regs.blksizecnt.read(),
            Reg::Arg1 => regs.arg1.read(),
            Reg::Cmdtm => regs.cmdtm.read(),
            Reg::Resp0 => regs.resp[0].vread(),
            Reg::Resp1 => regs.resp[1].vread(),
            Reg::Resp2 => regs.resp[2].vread(),
            Reg::Resp3 => regs.resp[3].vread(),
            Reg::Data => regs.data.vread(),
            Reg::Status => regs.status.vread(),
            Reg::Control0 => regs.control0.read(),
            Reg::Control1 => regs.control1.read(),
            Reg::Interrupt => regs.interrupt.read(),
            Reg::IrptMask => regs.irpt_mask.read(),
            Reg::IrptEn => regs.irpt_en.read(),
            Reg::Control2 => regs.control2.read(),
            Reg::Capabilities0 => regs.capabilities[0].vread(),
            Reg::Capabilities1 => regs.capabilities[1].vread(),
            Reg::SlotIsrVer => regs.slotisr_ver.vread(),
        }
    }

    fn write(&self, reg: Reg, value: u32) {
        let regs = self.regs();
        let target = match reg {
            Reg::Arg2 => &regs.arg2,
            Reg::BlkSizeCnt => &regs.blksizecnt,
            Reg::Arg1 => &regs.arg1,
            Reg::Cmdtm => &regs.cmdtm,
            Reg::Control0 => &regs.control0,
            Reg::Control1 => &regs.control1,
            Reg::Interrupt => &regs.interrupt,
            Reg::IrptMask => &regs.irpt_mask,
            Reg::IrptEn => &regs.irpt_en,
            Reg::Control2 => &regs.control2,
            read_only => {
                log::warn!("EMMC: ignoring write of {value:#010x} to read-only {read_only:?}");
                return;
            }
        };
        target.write(value);
    }
}
