//! # SD卡驱动
//!
//! 通过SD主机控制器的命令/应答协议完成卡的识别与单块读取，
//! 并把卡暴露为 [`block_dev::BlockDevice`]。
//!
//! 所有等待都是以 [`Clock`] 为界的忙等，不使用中断。

#![no_std]

extern crate alloc;

mod card;
mod clock;
mod config;
mod error;
mod host;
pub mod regs;
mod session;
mod volatile;

pub use self::{
    card::{Emmc, BLOCK_SIZE},
    clock::{wait_until, Clock},
    config::{Config, DEFAULT_BASE_ADDR},
    error::{CardStatusError, Error},
    host::{Host, MmioHost},
    regs::{ErrorKind, Interrupt, Reg},
    session::CardSession,
};
