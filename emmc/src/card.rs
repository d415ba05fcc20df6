use alloc::vec::Vec;

use block_dev::BlockDevice;
use enumflags2::BitFlags;
use spin::Mutex;

use crate::clock::{wait_until, Clock};
use crate::error::{CardStatusError, Error};
use crate::host::Host;
use crate::regs::{self, cmd, ErrorKind, Interrupt, Reg};
use crate::session::CardSession;
use crate::Config;

pub const BLOCK_SIZE: usize = 512;

/// 上电、切换时钟后等待的时长
const SETTLE_US: u64 = 2000;

/// SD卡驱动
///
/// 单卡槽，协议状态保存在 [`CardSession`] 中。
#[derive(Debug)]
pub struct Emmc<H, C> {
    host: H,
    clock: C,
    config: Config,
    session: Mutex<CardSession>,
}

impl<H: Host, C: Clock> Emmc<H, C> {
    pub fn new(host: H, clock: C, config: Config) -> Self {
        Self {
            host,
            clock,
            config,
            session: Mutex::new(CardSession::default()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> CardSession {
        self.session.lock().clone()
    }

    pub fn init(&self) -> Result<(), Error> {
        self.init_card(&mut self.session.lock())
    }

    /// 读取第`block_no`块，至多拷贝`min(buf.len(), 512)`字节
    pub fn read(&self, block_no: u32, buf: &mut [u8]) -> Result<usize, Error> {
        let mut session = self.session.lock();
        if !session.is_initialized() {
            self.init_card(&mut session)?;
        }

        self.ensure_transfer_state(&mut session)?;

        let address = if session.sdhc {
            block_no
        } else {
            block_no
                .checked_mul(BLOCK_SIZE as u32)
                .ok_or(Error::OutOfRange)?
        };

        let resp = self.do_r1_cmd_with(
            &mut session,
            cmd::READ_SINGLE_BLOCK,
            address,
            self.config.command_timeout_us,
            self.config.read_tries,
            self.config.read_retry_mask,
        )?;
        if resp != regs::READ_READY_RESPONSE {
            log::error!("SD: invalid CMD17 response {resp:#x}");
            return Err(Error::UnexpectedResponse(resp));
        }

        if !self.wait_interrupt(Interrupt::READ_RDY, self.config.data_timeout_us) {
            log::error!("SD: timed out waiting for read buffer at block {block_no}");
            return Err(Error::Timeout);
        }
        self.host.write(Reg::Interrupt, Interrupt::READ_RDY as u32);

        let len = buf.len().min(BLOCK_SIZE);
        // FIFO必须整块读空
        for word_no in 0..BLOCK_SIZE / 4 {
            let word = self.host.read(Reg::Data).to_le_bytes();
            let start = word_no * 4;
            if start < len {
                let count = (len - start).min(4);
                buf[start..start + count].copy_from_slice(&word[..count]);
            }
        }

        if !self.wait_interrupt(Interrupt::DATA_DONE, self.config.data_timeout_us) {
            log::error!("SD: timed out waiting for transfer complete at block {block_no}");
            return Err(Error::Timeout);
        }
        self.host.write(Reg::Interrupt, Interrupt::DATA_DONE as u32);

        log::trace!("SD: read block {block_no}");
        Ok(len)
    }

    /// 发送R1命令，出错且错误位落在`retry_mask`内时重试，至多尝试`tries`次。
    ///
    /// 单纯超时视作`CMD_TIMEOUT`。成功时返回RESP0。
    pub fn do_r1_cmd(
        &self,
        command: u32,
        arg: u32,
        timeout_us: u64,
        tries: usize,
        retry_mask: BitFlags<ErrorKind>,
    ) -> Result<u32, Error> {
        self.do_r1_cmd_with(
            &mut self.session.lock(),
            command,
            arg,
            timeout_us,
            tries,
            retry_mask,
        )
    }
}

impl<H: Host, C: Clock> Emmc<H, C> {
    fn init_card(&self, session: &mut CardSession) -> Result<(), Error> {
        *session = CardSession::default();

        let mut card = CardSession::default();
        self.bring_up_controller()?;
        self.identify(&mut card)?;
        *session = card;

        log::info!(
            "SD: found a valid SD card, RCA {:#06x}, OCR {:#06x}, SDHC {}",
            session.rca,
            session.ocr,
            session.sdhc
        );
        Ok(())
    }

    fn bring_up_controller(&self) -> Result<(), Error> {
        let ver = self.host.read(Reg::SlotIsrVer);
        let vendor = ver >> 24;
        let sd_version = (ver >> 16) & 0xFF;
        let slot_status = ver & 0xFF;
        log::info!("EMMC: vendor {vendor:#x}, sdversion {sd_version:#x}, slot_status {slot_status:#x}");
        if sd_version < 2 {
            log::error!("EMMC: only SDHCI versions >= 3.0 are supported");
            return Err(Error::UnsupportedController);
        }

        let control1 = self.host.read(Reg::Control1);
        self.host.write(Reg::Control1, control1 | regs::C1_SRST_HC);
        if !wait_until(&self.clock, self.config.reset_timeout_us, || {
            self.host.read(Reg::Control1) & regs::C1_SRST_MASK == 0
        }) {
            log::error!("EMMC: controller did not reset properly");
            return Err(Error::ResetTimeout);
        }

        log::debug!(
            "EMMC: capabilities {:08x}{:08x}",
            self.host.read(Reg::Capabilities1),
            self.host.read(Reg::Capabilities0)
        );

        if self.host.read(Reg::Status) & regs::STATUS_CARD_PRESENT == 0 {
            log::error!("EMMC: no card inserted");
            return Err(Error::NoCard);
        }

        self.host.write(Reg::Control2, 0);

        let control1 = self.host.read(Reg::Control1)
            | regs::C1_CLK_INTLEN
            | regs::C1_CLK_GENSEL
            | regs::C1_CLK_FREQ
            | regs::C1_DATA_TOUNIT;
        self.host.write(Reg::Control1, control1);
        if !wait_until(&self.clock, self.config.clock_timeout_us, || {
            self.host.read(Reg::Control1) & regs::C1_CLK_STABLE != 0
        }) {
            log::error!("EMMC: controller's clock did not stabilise");
            return Err(Error::ClockUnstable);
        }

        self.clock.sleep_us(SETTLE_US);
        let control1 = self.host.read(Reg::Control1);
        self.host.write(Reg::Control1, control1 | regs::C1_CLK_EN);
        self.clock.sleep_us(SETTLE_US);

        // 不向CPU发中断，所有中断源都锁存到INTERRUPT
        self.host.write(Reg::IrptEn, 0);
        self.host.write(Reg::Interrupt, u32::MAX);
        self.host.write(Reg::IrptMask, u32::MAX);
        self.clock.sleep_us(SETTLE_US);

        Ok(())
    }

    fn identify(&self, card: &mut CardSession) -> Result<(), Error> {
        let timeout = self.config.command_timeout_us;

        self.host.write(Reg::Cmdtm, cmd::GO_IDLE_STATE);
        if self.wait_response(card, timeout).is_err() {
            log::error!("EMMC: no SD card detected");
            return Err(Error::NoCard);
        }

        self.host.write(Reg::Interrupt, Interrupt::CMD_DONE as u32);
        self.host.write(Reg::Arg1, regs::IF_COND_PATTERN);
        self.host.write(Reg::Cmdtm, cmd::SEND_IF_COND);
        let hcs = match self.wait_response(card, timeout) {
            Ok(()) => {
                let resp = self.host.read(Reg::Resp0);
                if resp & 0xFFF != regs::IF_COND_PATTERN {
                    log::error!("SD: unusable card, CMD8 response {resp:#x}");
                    return Err(Error::UnusableCard);
                }
                regs::OCR_HCS
            }
            Err(_) => {
                log::debug!("SD: no CMD8 response, assuming a version 1 card");
                0
            }
        };

        let ocr = loop {
            self.clock.sleep_us(self.config.op_cond_interval_us);

            self.host.write(Reg::Arg1, 0);
            self.send_command(cmd::APP_CMD)?;
            if let Err(flags) = self.wait_response(card, timeout) {
                let flags = timeout_or(flags);
                if flags.contains(ErrorKind::CMD_TIMEOUT) {
                    return Err(Error::Transport(flags));
                }
                log::debug!("SD: CMD55 failed with {flags:?}, retrying");
                continue;
            }

            self.clock.sleep_us(SETTLE_US);
            self.host.write(Reg::Arg1, regs::OCR_VOLTAGE_WINDOW | hcs);
            self.send_command(cmd::SD_SEND_OP_COND)?;
            if self.wait_response(card, timeout).is_err() {
                log::error!("SD: unusable card, no ACMD41 response");
                return Err(Error::UnusableCard);
            }

            let resp = self.host.read(Reg::Resp0);
            if resp & regs::OCR_BUSY == 0 {
                log::debug!("SD: card not yet ready");
                continue;
            }
            break resp;
        };

        card.sdhc = ocr & regs::OCR_HCS != 0;
        card.v18 = self.config.allow_1v8 && ocr & regs::OCR_S18A != 0;
        card.ocr = ((ocr >> 8) & 0xFFFF) as u16;
        log::debug!(
            "SD: card identified: OCR {:#06x}, 1.8v {}, SDHC {}",
            card.ocr,
            card.v18,
            card.sdhc
        );

        if card.v18 {
            self.host.write(Reg::Arg1, 0);
            self.host.write(Reg::Interrupt, Interrupt::CMD_DONE as u32);
            self.host.write(Reg::Cmdtm, cmd::VOLTAGE_SWITCH);
            if !self.wait_interrupt(Interrupt::CMD_DONE, timeout) {
                log::error!("SD: voltage switch did not complete");
                return Err(Error::Timeout);
            }
            self.host.write(Reg::Interrupt, regs::INTERRUPT_ACK);
            log::info!("SD: switched to 1.8V mode");
        }

        self.command(card, cmd::ALL_SEND_CID, 0)?;
        card.cid = [
            self.host.read(Reg::Resp0),
            self.host.read(Reg::Resp1),
            self.host.read(Reg::Resp2),
            self.host.read(Reg::Resp3),
        ];
        log::debug!(
            "SD: card CID {:08x}{:08x}{:08x}{:08x}",
            card.cid[3],
            card.cid[2],
            card.cid[1],
            card.cid[0]
        );

        let resp = self.command(card, cmd::SEND_RELATIVE_ADDR, 0)?;
        let rca = (resp >> 16) as u16;
        let status = [
            (1 << 15, CardStatusError::Crc),
            (1 << 14, CardStatusError::IllegalCommand),
            (1 << 13, CardStatusError::Generic),
        ]
        .into_iter()
        .find(|(bit, _)| resp & bit != 0)
        .map(|(_, err)| err);
        if let Some(err) = status {
            log::error!("SD: CMD3 reported {err:?}");
            return Err(Error::CardStatus(err));
        }
        if resp & (1 << 8) == 0 {
            log::error!("SD: not ready for data");
            return Err(Error::CardStatus(CardStatusError::NotReady));
        }

        let resp = self.command(card, cmd::SELECT_CARD, u32::from(rca) << 16)?;
        let state = regs::current_state(resp);
        if state != regs::STATE_STANDBY && state != regs::STATE_TRANSFER {
            log::error!("SD: invalid status ({state}) after select");
            return Err(Error::InvalidState(state));
        }

        if !card.sdhc {
            self.command(card, cmd::SET_BLOCKLEN, BLOCK_SIZE as u32)?;
        }
        let blksizecnt = self.host.read(Reg::BlkSizeCnt);
        self.host
            .write(Reg::BlkSizeCnt, (blksizecnt & !0xFFF) | BLOCK_SIZE as u32);

        self.host.write(Reg::Interrupt, u32::MAX);
        card.rca = rca;

        Ok(())
    }

    /// 确保卡处于传输态；必要时重新选中、终止传输或重新初始化。
    fn ensure_transfer_state(&self, session: &mut CardSession) -> Result<(), Error> {
        let state = self.card_state(session)?;
        match state {
            regs::STATE_TRANSFER => return Ok(()),
            regs::STATE_STANDBY => {
                let rca = u32::from(session.rca) << 16;
                if let Err(err) = self.command(session, cmd::SELECT_CARD, rca) {
                    log::error!("SD: read() no response from CMD7");
                    session.rca = 0;
                    return Err(err);
                }
            }
            regs::STATE_DATA => {
                if let Err(err) = self.command(session, cmd::STOP_TRANSMISSION, 0) {
                    log::error!("SD: read() no response from CMD12");
                    session.rca = 0;
                    return Err(err);
                }
            }
            state => {
                log::warn!("SD: card in state {state}, re-initialising");
                self.init_card(session)?;
            }
        }

        let state = self.card_state(session)?;
        if state != regs::STATE_TRANSFER {
            log::error!("SD: unable to initialise SD card for reading (state {state})");
            session.rca = 0;
            return Err(Error::InvalidState(state));
        }
        Ok(())
    }

    /// CMD13，无应答时清除RCA
    fn card_state(&self, session: &mut CardSession) -> Result<u8, Error> {
        let rca = u32::from(session.rca) << 16;
        match self.command(session, cmd::SEND_STATUS, rca) {
            Ok(resp) => Ok(regs::current_state(resp)),
            Err(err) => {
                log::error!("SD: read() no response from CMD13");
                session.rca = 0;
                Err(err)
            }
        }
    }

    fn do_r1_cmd_with(
        &self,
        session: &mut CardSession,
        command: u32,
        arg: u32,
        timeout_us: u64,
        tries: usize,
        retry_mask: BitFlags<ErrorKind>,
    ) -> Result<u32, Error> {
        let tries = tries.max(1);
        let mut flags = BitFlags::empty();

        for attempt in 1..=tries {
            self.host.write(Reg::Arg1, arg);
            let sent = match self.send_command(command) {
                Ok(()) => self.wait_response(session, timeout_us),
                // 命令线一直被占用
                Err(_) => Err(BitFlags::empty()),
            };

            match sent {
                Ok(()) => return Ok(self.host.read(Reg::Resp0)),
                Err(err) => flags = timeout_or(err),
            }

            log::warn!(
                "SD: CMD{} attempt {attempt}/{tries} failed: {flags:?}",
                regs::command_index(command)
            );
            if !flags.intersects(retry_mask) {
                break;
            }
        }

        log::error!(
            "SD: error from CMD{}: {flags:?}",
            regs::command_index(command)
        );
        Err(Error::Transport(flags))
    }

    /// 发送命令并等待应答，返回RESP0
    fn command(&self, session: &mut CardSession, command: u32, arg: u32) -> Result<u32, Error> {
        self.host.write(Reg::Arg1, arg);
        self.send_command(command)?;
        self.wait_response(session, self.config.command_timeout_us)
            .map_err(|flags| Error::Transport(timeout_or(flags)))?;
        Ok(self.host.read(Reg::Resp0))
    }

    fn send_command(&self, command: u32) -> Result<(), Error> {
        if !wait_until(&self.clock, self.config.command_timeout_us, || {
            self.host.read(Reg::Status) & regs::STATUS_CMD_INHIBIT == 0
        }) {
            log::error!(
                "SD: command line busy, cannot send CMD{}",
                regs::command_index(command)
            );
            return Err(Error::Transport(ErrorKind::CMD_TIMEOUT.into()));
        }
        self.host.write(Reg::Cmdtm, command);
        Ok(())
    }

    /// 等待命令完成，错误中断会提前结束等待。
    ///
    /// 失败时返回解码后的错误位，空集表示没有应答。
    fn wait_response(
        &self,
        session: &mut CardSession,
        timeout_us: u64,
    ) -> Result<(), BitFlags<ErrorKind>> {
        session.last_error = 0;
        session.last_interrupt = 0;

        let done = Interrupt::CMD_DONE as u32 | Interrupt::ERR as u32;
        wait_until(&self.clock, timeout_us, || {
            self.host.read(Reg::Interrupt) & done != 0
        });

        let irpt = self.host.read(Reg::Interrupt);
        let result = if irpt & Interrupt::ERR as u32 != 0 {
            let flags = ErrorKind::decode(irpt);
            session.last_error = irpt & Interrupt::ERR as u32;
            session.last_interrupt = irpt;
            log::error!("SD: received error interrupt {irpt:#010x} {flags:?}");
            if flags.contains(ErrorKind::CMD_TIMEOUT) {
                log::error!(
                    "SD: timeout error, status {:#010x}",
                    self.host.read(Reg::Status)
                );
            }
            Err(flags)
        } else if irpt & Interrupt::CMD_DONE as u32 != 0 {
            Ok(())
        } else {
            log::debug!("SD: no command result received, interrupt {irpt:#010x}");
            Err(BitFlags::empty())
        };

        self.host.write(Reg::Interrupt, regs::INTERRUPT_ACK);
        result
    }

    fn wait_interrupt(&self, irpt: Interrupt, timeout_us: u64) -> bool {
        wait_until(&self.clock, timeout_us, || {
            self.host.read(Reg::Interrupt) & irpt as u32 != 0
        })
    }
}

/// 没有解码出错误位的失败视为命令超时
fn timeout_or(flags: BitFlags<ErrorKind>) -> BitFlags<ErrorKind> {
    if flags.is_empty() {
        ErrorKind::CMD_TIMEOUT.into()
    } else {
        flags
    }
}

impl<H, C> BlockDevice for Emmc<H, C>
where
    H: Host + 'static,
    C: Clock + 'static,
{
    fn driver_name(&self) -> &str {
        "emmc"
    }

    fn device_name(&self) -> &str {
        "emmc0"
    }

    fn device_id(&self) -> Vec<u8> {
        self.session.lock().cid_bytes().to_vec()
    }

    fn block_size(&self) -> usize {
        BLOCK_SIZE
    }

    fn read_block(&self, block_id: u32, buf: &mut [u8]) -> Result<usize, block_dev::Error> {
        Ok(self.read(block_id, buf)?)
    }
}
