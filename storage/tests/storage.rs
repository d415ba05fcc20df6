use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use block_dev::{BlockDevice, RamDisk};
use emmc::regs::command_index;
use emmc::{Clock, Config, Host, Interrupt, Reg};
use storage::{init_with_host, mount_device, SeekFrom, Vfs, KIND_EXT2, KIND_NOFS, KIND_PROBE};
use vfs::{DirEntryType, Error, OpenMode};

const SECTOR: usize = 512;

const EXT2_START: usize = 8;
const EXT2_SECTORS: usize = 256;
const FAT_START: usize = EXT2_START + EXT2_SECTORS;
const FAT_SECTORS: usize = 400;
const NOFS_START: usize = FAT_START + FAT_SECTORS;
const NOFS_SECTORS: usize = 4;

const EXT2_HELLO: &[u8] = b"hello from ext2\n";
const FAT_HELLO: &[u8] = b"hi from fat\n";
const EXT2_KERNEL_LEN: usize = 1500;
const FAT_KERNEL_LEN: usize = 600;

fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8 ^ seed).collect()
}

fn put(buf: &mut [u8], offset: usize, bytes: &[u8]) {
    buf[offset..offset + bytes.len()].copy_from_slice(bytes);
}

/// 1024字节的块，32个inode（每个128字节），inode表位于块5
fn ext2_volume() -> Vec<u8> {
    const BS: usize = 1024;
    let mut image = vec![0; EXT2_SECTORS * SECTOR];

    let sb = 1024;
    put(&mut image, sb, &32u32.to_le_bytes());
    put(&mut image, sb + 4, &128u32.to_le_bytes());
    put(&mut image, sb + 32, &8192u32.to_le_bytes());
    put(&mut image, sb + 40, &32u32.to_le_bytes());
    put(&mut image, sb + 56, &0xEF53u16.to_le_bytes());
    put(&mut image, 2 * BS + 8, &5u32.to_le_bytes());

    let set_inode = |image: &mut Vec<u8>, ino: usize, mode: u16, size: usize, blocks: &[u32]| {
        let at = 5 * BS + (ino - 1) * 128;
        put(image, at, &mode.to_le_bytes());
        put(image, at + 4, &(size as u32).to_le_bytes());
        for (i, block) in blocks.iter().enumerate() {
            put(image, at + 40 + i * 4, &block.to_le_bytes());
        }
    };
    let dir_block = |image: &mut Vec<u8>, block: usize, records: &[(u32, &str)]| {
        let mut offset = block * BS;
        for (i, (ino, name)) in records.iter().enumerate() {
            let rec_len = if i + 1 == records.len() {
                (block + 1) * BS - offset
            } else {
                (8 + name.len()).next_multiple_of(4)
            };
            put(image, offset, &ino.to_le_bytes());
            put(image, offset + 4, &(rec_len as u16).to_le_bytes());
            image[offset + 6] = name.len() as u8;
            put(image, offset + 8, name.as_bytes());
            offset += rec_len;
        }
    };

    dir_block(&mut image, 10, &[(2, "."), (2, ".."), (11, "boot"), (12, "hello.txt")]);
    set_inode(&mut image, 2, 0x41ED, BS, &[10]);
    dir_block(&mut image, 11, &[(11, "."), (2, ".."), (13, "kernel.img")]);
    set_inode(&mut image, 11, 0x41ED, BS, &[11]);

    put(&mut image, 12 * BS, EXT2_HELLO);
    set_inode(&mut image, 12, 0x81A4, EXT2_HELLO.len(), &[12]);
    put(&mut image, 13 * BS, &pattern(EXT2_KERNEL_LEN, 0x5A));
    set_inode(&mut image, 13, 0x81A4, EXT2_KERNEL_LEN, &[13, 14]);

    image
}

fn fat_entry(name: &[u8; 11], attr: u8, cluster: u16, size: u32) -> [u8; 32] {
    let mut raw = [0; 32];
    raw[..11].copy_from_slice(name);
    raw[11] = attr;
    raw[26..28].copy_from_slice(&cluster.to_le_bytes());
    raw[28..32].copy_from_slice(&size.to_le_bytes());
    raw
}

/// FAT12：每簇一个扇区，两份FAT各2个扇区，64个根目录项，数据区从扇区9开始
fn fat_volume() -> Vec<u8> {
    let mut image = vec![0; FAT_SECTORS * SECTOR];
    image[0] = 0xEB;
    put(&mut image, 11, &(SECTOR as u16).to_le_bytes());
    image[13] = 1;
    put(&mut image, 14, &1u16.to_le_bytes());
    image[16] = 2;
    put(&mut image, 17, &64u16.to_le_bytes());
    put(&mut image, 19, &(FAT_SECTORS as u16).to_le_bytes());
    put(&mut image, 22, &2u16.to_le_bytes());
    put(&mut image, 510, &[0x55, 0xAA]);

    let set_fat = |image: &mut Vec<u8>, cluster: usize, value: u16| {
        let at = SECTOR + cluster + cluster / 2;
        let old = u16::from_le_bytes([image[at], image[at + 1]]);
        let word = if cluster % 2 == 1 {
            (old & 0x000F) | (value << 4)
        } else {
            (old & 0xF000) | value
        };
        put(image, at, &word.to_le_bytes());
    };
    let cluster_at = |cluster: usize| (9 + cluster - 2) * SECTOR;

    let root = 5 * SECTOR;
    put(&mut image, root, &fat_entry(b"HELLO   TXT", 0x20, 3, FAT_HELLO.len() as u32));
    put(&mut image, root + 32, &fat_entry(b"BOOT       ", 0x10, 4, 0));

    put(&mut image, cluster_at(3), FAT_HELLO);
    set_fat(&mut image, 3, 0xFFF);

    put(&mut image, cluster_at(4), &fat_entry(b".          ", 0x10, 4, 0));
    put(&mut image, cluster_at(4) + 32, &fat_entry(b"..         ", 0x10, 0, 0));
    put(
        &mut image,
        cluster_at(4) + 64,
        &fat_entry(b"KERNEL  IMG", 0x20, 5, FAT_KERNEL_LEN as u32),
    );
    set_fat(&mut image, 4, 0xFFF);

    let kernel = pattern(FAT_KERNEL_LEN, 0x33);
    put(&mut image, cluster_at(5), &kernel[..SECTOR]);
    put(&mut image, cluster_at(6), &kernel[SECTOR..]);
    set_fat(&mut image, 5, 6);
    set_fat(&mut image, 6, 0xFFF);

    image
}

fn mbr(partitions: &[(u8, usize, usize)]) -> [u8; SECTOR] {
    let mut sector = [0; SECTOR];
    for (i, &(kind, start, count)) in partitions.iter().enumerate() {
        let at = 0x1BE + 16 * i;
        sector[at] = if i == 0 { 0x80 } else { 0x00 };
        sector[at + 4] = kind;
        put(&mut sector, at + 8, &(start as u32).to_le_bytes());
        put(&mut sector, at + 12, &(count as u32).to_le_bytes());
    }
    sector[0x1FE] = 0x55;
    sector[0x1FF] = 0xAA;
    sector
}

fn disk_image() -> Vec<u8> {
    let mut image = vec![0; (NOFS_START + NOFS_SECTORS) * SECTOR];
    put(
        &mut image,
        0,
        &mbr(&[
            (0x83, EXT2_START, EXT2_SECTORS),
            (0x01, FAT_START, FAT_SECTORS),
            (0xda, NOFS_START, NOFS_SECTORS),
        ]),
    );
    put(&mut image, EXT2_START * SECTOR, &ext2_volume());
    put(&mut image, FAT_START * SECTOR, &fat_volume());
    put(&mut image, NOFS_START * SECTOR, &pattern(NOFS_SECTORS * SECTOR, 0x0F));
    image
}

fn disk() -> Arc<dyn BlockDevice> {
    Arc::new(RamDisk::new("disk0", SECTOR, disk_image()))
}

fn mounted() -> Vfs {
    let mut vfs = Vfs::new();
    assert_eq!(mount_device(&mut vfs, disk(), KIND_PROBE), 3);
    vfs
}

fn names(vfs: &Vfs, path: &str) -> Vec<String> {
    vfs.read_directory(path)
        .unwrap()
        .into_iter()
        .map(|entry| entry.name)
        .collect()
}

fn read_all(vfs: &Vfs, path: &str) -> Vec<u8> {
    vfs.open(path, OpenMode::Read).unwrap().read_to_end().unwrap()
}

#[test]
fn mounts_every_partition() {
    let vfs = mounted();
    assert_eq!(vfs.devices().collect::<Vec<_>>(), ["disk0_0", "disk0_1", "disk0_2"]);
    assert_eq!(vfs.default_device(), Some("disk0_0"));

    let fs_names = vfs
        .devices()
        .map(|name| vfs.find(name).unwrap().filesystem().name())
        .collect::<Vec<_>>();
    assert_eq!(fs_names, ["ext2", "fat", "nofs"]);
}

#[test]
fn lists_directories_on_each_device() {
    let vfs = mounted();
    assert_eq!(names(&vfs, "(disk0_0)/"), ["boot", "hello.txt"]);
    assert_eq!(names(&vfs, "(disk0_0)/boot"), ["kernel.img"]);
    assert_eq!(names(&vfs, "(disk0_1)"), ["hello.txt", "boot"]);
    assert_eq!(names(&vfs, "(disk0_1)//boot/"), ["kernel.img"]);
    assert_eq!(names(&vfs, "(disk0_2)/"), ["kernel"]);
    assert_eq!(names(&vfs, "/boot"), ["kernel.img"]);
}

#[test]
fn reads_files_through_paths() {
    let vfs = mounted();
    assert_eq!(read_all(&vfs, "(disk0_0)/hello.txt"), EXT2_HELLO);
    assert_eq!(read_all(&vfs, "/hello.txt"), EXT2_HELLO);
    assert_eq!(read_all(&vfs, "(disk0_0)/boot/kernel.img"), pattern(EXT2_KERNEL_LEN, 0x5A));
    assert_eq!(read_all(&vfs, "(disk0_1)/hello.txt"), FAT_HELLO);
    assert_eq!(read_all(&vfs, "(disk0_1)/boot/kernel.img"), pattern(FAT_KERNEL_LEN, 0x33));
    assert_eq!(read_all(&vfs, "(disk0_2)/kernel"), pattern(NOFS_SECTORS * SECTOR, 0x0F));
}

#[test]
fn open_errors() {
    let vfs = mounted();
    let err = |path: &str, mode: OpenMode| vfs.open(path, mode).unwrap_err();

    assert_eq!(err("/hello.txt", OpenMode::Write), Error::ReadOnly);
    assert_eq!(err("/hello.txt", OpenMode::Append), Error::ReadOnly);
    assert_eq!(err("/boot", OpenMode::Read), Error::Invalid);
    assert_eq!(err("/", OpenMode::Read), Error::Invalid);
    assert_eq!(err("/missing", OpenMode::Read), Error::NotFound);
    assert_eq!(err("(disk9)/hello.txt", OpenMode::Read), Error::NotFound);
    assert_eq!(err("(disk0_0/hello.txt", OpenMode::Read), Error::Invalid);
    assert_eq!(err("/hello.txt/inner", OpenMode::Read), Error::NotADirectory);
    assert_eq!(err("/nowhere/inner", OpenMode::Read), Error::NotFound);
}

#[test]
fn file_position() {
    let vfs = mounted();
    let expected = pattern(EXT2_KERNEL_LEN, 0x5A);
    let mut file = vfs.open("/boot/kernel.img", OpenMode::Read).unwrap();
    assert_eq!(file.len(), EXT2_KERNEL_LEN as u64);
    assert_eq!(file.device_name(), "disk0_0");

    assert_eq!(file.seek(SeekFrom::End(-100)), 1400);
    let mut buf = vec![0; 4096];
    assert_eq!(file.read(&mut buf), Ok(100));
    assert_eq!(&buf[..100], &expected[1400..]);
    assert_eq!(file.tell(), EXT2_KERNEL_LEN as u64);
    assert_eq!(file.read(&mut buf), Ok(0));

    assert_eq!(file.seek(SeekFrom::Current(-2000)), 0);
    assert_eq!(file.seek(SeekFrom::Start(5000)), EXT2_KERNEL_LEN as u64);
    assert_eq!(file.seek(SeekFrom::Start(1020)), 1020);
    assert_eq!(file.read(&mut buf[..10]), Ok(10));
    assert_eq!(&buf[..10], &expected[1020..1030]);
    assert_eq!(file.seek(SeekFrom::Current(5)), 1035);

    file.rewind();
    assert_eq!(file.tell(), 0);
    assert_eq!(file.read_to_end(), Ok(expected));
    file.close();
}

#[test]
fn stat_entries() {
    let vfs = mounted();

    let stat = vfs.stat("(disk0_1)/boot/kernel.img").unwrap();
    assert_eq!(stat.mode, DirEntryType::Regular);
    assert_eq!(stat.size, FAT_KERNEL_LEN as u64);
    assert_eq!(stat.block_size, 512);
    assert_eq!(stat.blocks, 2);

    assert_eq!(vfs.stat("/boot").unwrap().mode, DirEntryType::Directory);
    assert_eq!(vfs.stat("(disk0_2)").unwrap().mode, DirEntryType::Directory);
    assert_eq!(vfs.stat("/missing"), Err(Error::NotFound));
}

#[test]
fn default_device() {
    let mut vfs = mounted();
    assert_eq!(vfs.set_default("disk9"), Err(Error::NotFound));
    assert_eq!(vfs.default_device(), Some("disk0_0"));

    vfs.set_default("disk0_1").unwrap();
    assert_eq!(read_all(&vfs, "hello.txt"), FAT_HELLO);
    vfs.list_devices();
}

#[test]
fn duplicate_devices_are_rejected() {
    let mut vfs = mounted();
    assert_eq!(mount_device(&mut vfs, disk(), KIND_PROBE), 0);
    assert_eq!(vfs.len(), 3);
}

#[test]
fn whole_device_volumes() {
    let mut vfs = Vfs::new();
    let fat: Arc<dyn BlockDevice> = Arc::new(RamDisk::new("fat0", SECTOR, fat_volume()));
    assert_eq!(mount_device(&mut vfs, fat, KIND_PROBE), 1);

    let ext2: Arc<dyn BlockDevice> = Arc::new(RamDisk::new("ext0", SECTOR, ext2_volume()));
    assert_eq!(mount_device(&mut vfs, ext2, KIND_PROBE), 1);

    assert_eq!(vfs.devices().collect::<Vec<_>>(), ["fat0", "ext0"]);
    assert_eq!(vfs.find("fat0").unwrap().filesystem().name(), "fat");
    assert_eq!(vfs.find("ext0").unwrap().filesystem().name(), "ext2");
    assert_eq!(read_all(&vfs, "(ext0)/hello.txt"), EXT2_HELLO);
}

#[test]
fn boot_code_that_looks_like_a_table() {
    let mut image = fat_volume();
    image[0x1BE..0x1FE].fill(0xF4);
    image[0x1CE + 4] = 0x83;
    let fat: Arc<dyn BlockDevice> = Arc::new(RamDisk::new("fat1", SECTOR, image));

    let mut vfs = Vfs::new();
    assert_eq!(mount_device(&mut vfs, fat, KIND_PROBE), 1);
    assert_eq!(vfs.devices().collect::<Vec<_>>(), ["fat1"]);
    assert_eq!(read_all(&vfs, "(fat1)/hello.txt"), FAT_HELLO);
}

#[test]
fn raw_volume_is_never_probed() {
    let raw = || -> Arc<dyn BlockDevice> {
        Arc::new(RamDisk::new("raw0", SECTOR, pattern(8 * SECTOR, 0x01)))
    };

    let mut vfs = Vfs::new();
    assert_eq!(mount_device(&mut vfs, raw(), KIND_PROBE), 0);
    assert!(vfs.is_empty());

    assert_eq!(mount_device(&mut vfs, raw(), KIND_NOFS), 1);
    assert_eq!(names(&vfs, "(raw0)"), ["kernel"]);
}

#[test]
fn partition_type_forces_the_backend() {
    let mut image = vec![0; (FAT_START + FAT_SECTORS) * SECTOR];
    put(&mut image, 0, &mbr(&[(0x83, FAT_START, FAT_SECTORS), (0x05, EXT2_START, 8)]));
    put(&mut image, FAT_START * SECTOR, &fat_volume());
    let disk: Arc<dyn BlockDevice> = Arc::new(RamDisk::new("disk1", SECTOR, image));

    let mut vfs = Vfs::new();
    assert_eq!(mount_device(&mut vfs, disk.clone(), KIND_PROBE), 0);
    assert_eq!(mount_device(&mut vfs, disk, KIND_EXT2), 0);
    assert!(vfs.is_empty());
}

/// 只支持SDHC单块读的卡
#[derive(Debug, Default)]
struct Card {
    control1: u32,
    interrupt: u32,
    arg1: u32,
    resp0: u32,
    state: u32,
    fifo: VecDeque<u32>,
    disk: Vec<u8>,
}

impl Card {
    fn done(&mut self, resp0: u32) {
        self.resp0 = resp0;
        self.interrupt |= Interrupt::CMD_DONE as u32;
    }

    fn execute(&mut self, cmdtm: u32) {
        let r1 = self.state << 9 | 1 << 8;
        match command_index(cmdtm) {
            0 => self.done(0),
            8 => self.done(self.arg1),
            55 => self.done(0x120),
            41 => {
                self.state = 1;
                self.done(1 << 31 | 1 << 30 | 0x00FF_8000);
            }
            2 => {
                self.state = 2;
                self.done(0x1234_5678);
            }
            3 => {
                self.state = 3;
                self.done(0x4567 << 16 | 1 << 8);
            }
            7 | 13 => {
                self.done(r1);
                self.state = 4;
            }
            17 => {
                let at = self.arg1 as usize * SECTOR;
                self.fifo = self.disk[at..at + SECTOR]
                    .chunks_exact(4)
                    .map(|word| u32::from_le_bytes(word.try_into().unwrap()))
                    .collect();
                self.done(0x900);
                self.interrupt |= Interrupt::READ_RDY as u32 | Interrupt::DATA_DONE as u32;
            }
            _ => self.interrupt |= 1 << 19 | Interrupt::ERR as u32,
        }
    }
}

#[derive(Debug, Clone)]
struct CardHost(Arc<Mutex<Card>>);

impl Host for CardHost {
    fn read(&self, reg: Reg) -> u32 {
        let mut card = self.0.lock().unwrap();
        match reg {
            Reg::SlotIsrVer => 0x0002_0000,
            Reg::Status => 1 << 16,
            Reg::Control1 => card.control1,
            Reg::Interrupt => card.interrupt,
            Reg::Resp0 => card.resp0,
            Reg::Data => card.fifo.pop_front().unwrap_or(0),
            _ => 0,
        }
    }

    fn write(&self, reg: Reg, value: u32) {
        let mut card = self.0.lock().unwrap();
        match reg {
            Reg::Control1 => {
                let stable = if value & 1 != 0 { 1 << 1 } else { 0 };
                card.control1 = value & !(7 << 24) | stable;
            }
            Reg::Interrupt => card.interrupt &= !value,
            Reg::Arg1 => card.arg1 = value,
            Reg::Cmdtm => card.execute(value),
            _ => {}
        }
    }
}

#[derive(Debug, Default)]
struct FakeClock(AtomicU64);

impl Clock for FakeClock {
    fn now_us(&self) -> u64 {
        self.0.fetch_add(100, Ordering::Relaxed) + 100
    }

    fn sleep_us(&self, us: u64) {
        self.0.fetch_add(us, Ordering::Relaxed);
    }
}

#[test]
fn boots_from_the_card() {
    let card = Card {
        disk: disk_image(),
        ..Card::default()
    };
    let vfs = init_with_host(
        CardHost(Arc::new(Mutex::new(card))),
        FakeClock::default(),
        Config::default(),
    );

    assert_eq!(vfs.devices().collect::<Vec<_>>(), ["emmc0_0", "emmc0_1", "emmc0_2"]);
    assert_eq!(vfs.default_device(), Some("emmc0_0"));
    assert_eq!(read_all(&vfs, "/boot/kernel.img"), pattern(EXT2_KERNEL_LEN, 0x5A));
    assert_eq!(read_all(&vfs, "(emmc0_1)/hello.txt"), FAT_HELLO);
    assert_eq!(read_all(&vfs, "(emmc0_2)/kernel"), pattern(NOFS_SECTORS * SECTOR, 0x0F));
}

#[test]
fn no_card_leaves_the_vfs_empty() {
    #[derive(Debug)]
    struct EmptySlot;

    impl Host for EmptySlot {
        fn read(&self, reg: Reg) -> u32 {
            match reg {
                Reg::SlotIsrVer => 0x0002_0000,
                Reg::Control1 => 1 << 1,
                _ => 0,
            }
        }

        fn write(&self, _reg: Reg, _value: u32) {}
    }

    let vfs = init_with_host(EmptySlot, FakeClock::default(), Config::default());
    assert!(vfs.is_empty());
}
