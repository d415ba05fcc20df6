//! MBR分区表
//!
//! 第0块的`0x1BE`处起共4个16字节的分区项，`0x1FE`处为签名`55 AA`。
//! 每个非空分区项被包装为一个 [`Partition`] 块设备。

use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use crate::{BlockDevice, Error};

pub const SECTOR_SIZE: usize = 512;

const TABLE_OFFSET: usize = 0x1BE;
const ENTRY_SIZE: usize = 16;
const SIGNATURE_OFFSET: usize = 0x1FE;
const SIGNATURE: [u8; 2] = [0x55, 0xAA];

/// 分区项，字段均为小端序
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionEntry {
    pub status: u8,
    pub kind: u8,
    pub start_block: u32,
    pub block_count: u32,
}

impl PartitionEntry {
    fn parse(raw: &[u8]) -> Self {
        let u32_at = |offset: usize| {
            u32::from_le_bytes([raw[offset], raw[offset + 1], raw[offset + 2], raw[offset + 3]])
        };
        Self {
            status: raw[0],
            kind: raw[4],
            start_block: u32_at(8),
            block_count: u32_at(12),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.kind == 0
    }
}

/// 解析第0块；没有MBR签名时返回`None`。状态字节不参与判断
pub fn parse_table(block0: &[u8; SECTOR_SIZE]) -> Option<[PartitionEntry; 4]> {
    if block0[SIGNATURE_OFFSET..SIGNATURE_OFFSET + 2] != SIGNATURE {
        return None;
    }

    Some(core::array::from_fn(|i| {
        let start = TABLE_OFFSET + i * ENTRY_SIZE;
        PartitionEntry::parse(&block0[start..start + ENTRY_SIZE])
    }))
}

/// 读取父设备的分区表。
///
/// `Ok(None)`表示父设备上没有MBR；否则返回全部非空分区，
/// 分区号为其在表中的位置（0..4）。
pub fn scan(parent: &Arc<dyn BlockDevice>) -> Result<Option<Vec<Partition>>, Error> {
    let mut block0 = [0; SECTOR_SIZE];
    let read_size = parent.read_blocks(0, &mut block0)?;
    if read_size != SECTOR_SIZE {
        log::error!(
            "MBR: short read on {}: got {read_size} of {SECTOR_SIZE} bytes",
            parent.device_name()
        );
        return Err(Error::ShortRead {
            expected: SECTOR_SIZE,
            actual: read_size,
        });
    }

    let Some(entries) = parse_table(&block0) else {
        log::info!("MBR: no partition table on {}", parent.device_name());
        return Ok(None);
    };

    let partitions = entries
        .iter()
        .enumerate()
        .filter(|(_, entry)| !entry.is_empty())
        .map(|(index, entry)| {
            let partition = Partition::new(parent.clone(), index as u8, entry);
            log::info!(
                "MBR: partition {} type {:#04x} start {} count {}",
                partition.name,
                entry.kind,
                entry.start_block,
                entry.block_count
            );
            partition
        })
        .collect();

    Ok(Some(partitions))
}

/// 分区设备，将块号平移`start_block`后转交父设备
#[derive(Debug)]
pub struct Partition {
    parent: Arc<dyn BlockDevice>,
    name: String,
    index: u8,
    kind: u8,
    start_block: u32,
    block_count: u32,
}

impl Partition {
    pub fn new(parent: Arc<dyn BlockDevice>, index: u8, entry: &PartitionEntry) -> Self {
        Self {
            name: format!("{}_{index}", parent.device_name()),
            parent,
            index,
            kind: entry.kind,
            start_block: entry.start_block,
            block_count: entry.block_count,
        }
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    /// 分区类型字节
    pub fn kind(&self) -> u8 {
        self.kind
    }

    pub fn start_block(&self) -> u32 {
        self.start_block
    }

    pub fn parent(&self) -> &Arc<dyn BlockDevice> {
        &self.parent
    }
}

impl BlockDevice for Partition {
    fn driver_name(&self) -> &str {
        "mbr"
    }

    fn device_name(&self) -> &str {
        &self.name
    }

    fn device_id(&self) -> Vec<u8> {
        vec![self.index]
    }

    fn block_size(&self) -> usize {
        SECTOR_SIZE
    }

    fn block_count(&self) -> Option<u64> {
        Some(self.block_count.into())
    }

    fn read_block(&self, block_id: u32, buf: &mut [u8]) -> Result<usize, Error> {
        let parent_size = self.parent.block_size();
        if parent_size != self.block_size() {
            log::error!(
                "MBR: {} block size {} does not match parent {} block size {parent_size}",
                self.name,
                self.block_size(),
                self.parent.device_name()
            );
            return Err(Error::BlockSizeMismatch {
                device: self.block_size(),
                parent: parent_size,
            });
        }

        let parent_block = self
            .start_block
            .checked_add(block_id)
            .ok_or(Error::OutOfRange)?;
        self.parent.read_block(parent_block, buf)
    }
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;
    use alloc::vec;
    use alloc::vec::Vec;

    use super::{scan, SECTOR_SIZE};
    use crate::{BlockDevice, Error, RamDisk};

    fn write_entry(image: &mut [u8], slot: usize, kind: u8, start: u32, count: u32) {
        let entry = &mut image[0x1BE + slot * 16..0x1BE + (slot + 1) * 16];
        entry[4] = kind;
        entry[8..12].copy_from_slice(&start.to_le_bytes());
        entry[12..16].copy_from_slice(&count.to_le_bytes());
    }

    fn disk_image() -> Vec<u8> {
        let mut image: Vec<u8> = (0..SECTOR_SIZE * 64).map(|i| (i % 251) as u8).collect();
        image[..SECTOR_SIZE].fill(0);
        write_entry(&mut image, 0, 0x0c, 8, 16);
        write_entry(&mut image, 2, 0x83, 24, 40);
        image[0x1FE] = 0x55;
        image[0x1FF] = 0xAA;
        image
    }

    #[test]
    fn scan_partitions() {
        let disk: Arc<dyn BlockDevice> = Arc::new(RamDisk::new("emmc0", SECTOR_SIZE, disk_image()));
        let partitions = scan(&disk).unwrap().unwrap();

        assert_eq!(partitions.len(), 2);
        assert_eq!(partitions[0].device_name(), "emmc0_0");
        assert_eq!(partitions[0].kind(), 0x0c);
        assert_eq!(partitions[0].start_block(), 8);
        assert_eq!(partitions[0].block_count(), Some(16));
        assert_eq!(partitions[1].device_name(), "emmc0_2");
        assert_eq!(partitions[1].device_id(), vec![2]);
        assert_eq!(partitions[1].driver_name(), "mbr");
    }

    #[test]
    fn partition_reads_are_shifted() {
        let image = disk_image();
        let disk: Arc<dyn BlockDevice> = Arc::new(RamDisk::new("emmc0", SECTOR_SIZE, image));
        let partitions = scan(&disk).unwrap().unwrap();

        for b in [0, 1, 5] {
            let mut from_partition = [0; SECTOR_SIZE];
            let mut from_parent = [0; SECTOR_SIZE];
            assert_eq!(partitions[1].read_block(b, &mut from_partition), Ok(SECTOR_SIZE));
            disk.read_block(b + 24, &mut from_parent).unwrap();
            assert_eq!(from_partition, from_parent);
        }
    }

    #[test]
    fn no_signature() {
        let mut image = disk_image();
        image[0x1FF] = 0;
        let disk: Arc<dyn BlockDevice> = Arc::new(RamDisk::new("emmc0", SECTOR_SIZE, image));
        assert_eq!(scan(&disk).map(|p| p.is_none()), Ok(true));
    }

    #[test]
    fn status_byte_is_ignored() {
        let mut image = vec![0; SECTOR_SIZE * 64];
        write_entry(&mut image, 0, 0x83, 8, 16);
        image[0x1BE] = 0x01;
        image[0x1FE] = 0x55;
        image[0x1FF] = 0xAA;
        let disk: Arc<dyn BlockDevice> = Arc::new(RamDisk::new("emmc0", SECTOR_SIZE, image));
        let partitions = scan(&disk).unwrap().unwrap();

        assert_eq!(partitions.len(), 1);
        assert_eq!(partitions[0].device_name(), "emmc0_0");
        assert_eq!(partitions[0].kind(), 0x83);
        assert_eq!(partitions[0].start_block(), 8);
        assert_eq!(partitions[0].block_count(), Some(16));
    }

    #[test]
    fn truncated_parent_fails() {
        let disk: Arc<dyn BlockDevice> = Arc::new(RamDisk::new("emmc0", 256, vec![0; 256]));
        assert_eq!(scan(&disk).err(), Some(Error::OutOfRange));
    }

    #[test]
    fn block_size_mismatch() {
        let mut image = vec![0; 1024 * 32];
        image[..SECTOR_SIZE].copy_from_slice(&disk_image()[..SECTOR_SIZE]);
        let ram = Arc::new(RamDisk::new("emmc0", 1024, image));
        let disk: Arc<dyn BlockDevice> = ram.clone();
        let partitions = scan(&disk).unwrap().unwrap();
        ram.clear_reads();

        let mut buf = [0; SECTOR_SIZE];
        assert_eq!(
            partitions[0].read_block(0, &mut buf),
            Err(Error::BlockSizeMismatch {
                device: 512,
                parent: 1024
            })
        );
        assert!(ram.reads().is_empty());
    }
}
