//! # 引导程序的存储栈
//!
//! ## 分层（自下而上）
//!
//! 1. SD卡驱动：[`emmc::Emmc`]
//! 2. 块设备层：卡设备与MBR分区设备
//! 3. 文件系统层：ext2、FAT、NoFS
//! 4. 虚拟文件系统：以设备名登记挂载，解析`(device)/path`
//!
//! [`init`] 自下而上完成整条链路的初始化。

#![no_std]

extern crate alloc;

mod file;
mod filesystem;
pub mod logging;
mod nofs;
pub mod platform;
mod registry;

use alloc::sync::Arc;

use block_dev::{mbr, BlockDevice};
use emmc::{Clock, Config, Emmc, Host, MmioHost};

pub use self::{
    file::{File, SeekFrom},
    filesystem::{FileInner, Filesystem, KIND_EXT2, KIND_FAT, KIND_NOFS, KIND_PROBE},
    nofs::NoFs,
    platform::Platform,
    registry::{Mount, Vfs},
};

/// 初始化SD卡并挂载卡上的文件系统；任何一步失败都只记录日志，
/// 返回的虚拟文件系统可能为空。
pub fn init<C>(platform: &Platform, mut config: Config, clock: C) -> Vfs
where
    C: Clock + 'static,
{
    if let Some(base) = platform.emmc_base() {
        config.base_addr = base;
    }
    // SAFETY: 基址来自平台探测，指向EMMC控制器的寄存器
    let host = unsafe { MmioHost::new(config.base_addr) };

    init_with_host(host, clock, config)
}

/// 用给定的主机控制器完成[`init`]
pub fn init_with_host<H, C>(host: H, clock: C, config: Config) -> Vfs
where
    H: Host + 'static,
    C: Clock + 'static,
{
    let mut vfs = Vfs::new();

    let card = Emmc::new(host, clock, config);
    if let Err(err) = card.init() {
        log::error!("emmc: failed to initialise the card: {err}");
        return vfs;
    }
    let card: Arc<dyn BlockDevice> = Arc::new(card);
    mount_device(&mut vfs, card, KIND_PROBE);
    vfs.list_devices();

    vfs
}

/// 按分区类型`kind`挂载设备，返回新登记的挂载数。
///
/// 类型为[`KIND_PROBE`]时先扫描MBR，逐个分区按其类型挂载；
/// 没有MBR、MBR中没有分区或没有分区挂载成功时，把整个设备当作一个卷探测。
pub fn mount_device(vfs: &mut Vfs, device: Arc<dyn BlockDevice>, kind: u8) -> usize {
    if kind != KIND_PROBE {
        return usize::from(mount_volume(vfs, device, kind));
    }

    match mbr::scan(&device) {
        Ok(Some(partitions)) if !partitions.is_empty() => {
            let mut mounted = 0;
            for partition in partitions {
                let kind = partition.kind();
                mounted += usize::from(mount_volume(vfs, Arc::new(partition), kind));
            }
            if mounted == 0 {
                // FAT引导扇区同样以55 AA结尾，其引导代码会被当成分区表
                log::info!(
                    "no partition of {} mounted, probing the whole device",
                    device.device_name()
                );
                return usize::from(mount_volume(vfs, device, KIND_PROBE));
            }
            mounted
        }
        Ok(_) => {
            log::info!("no partitions on {}, probing the whole device", device.device_name());
            usize::from(mount_volume(vfs, device, KIND_PROBE))
        }
        Err(err) => {
            log::error!("failed to read the boot sector of {}: {err}", device.device_name());
            0
        }
    }
}

fn mount_volume(vfs: &mut Vfs, device: Arc<dyn BlockDevice>, kind: u8) -> bool {
    let Some(fs) = Filesystem::probe(&device, kind) else {
        log::info!("no filesystem found on {} (type {kind:#04x})", device.device_name());
        return false;
    };
    vfs.register(fs).is_ok()
}
