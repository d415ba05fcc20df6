/// 卡的协议状态
///
/// `rca == 0`表示尚未完成识别，下次读取前会重新初始化。
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CardSession {
    /// relative card address
    pub rca: u16,
    pub sdhc: bool,
    pub v18: bool,
    pub ocr: u16,
    pub cid: [u32; 4],
    /// 最近一次出错时的INTERRUPT寄存器
    pub last_interrupt: u32,
    pub last_error: u32,
}

impl CardSession {
    pub fn is_initialized(&self) -> bool {
        self.rca != 0
    }

    /// CID，低位字在前，每字小端
    pub fn cid_bytes(&self) -> [u8; 16] {
        let mut bytes = [0; 16];
        for (chunk, word) in bytes.chunks_exact_mut(4).zip(self.cid) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        bytes
    }
}
