//! 虚拟文件系统
//!
//! 以设备名为键登记挂载，解析`(device)/a/b/c`形式的路径，
//! 再把目录与文件操作转交给所属的后端。登记只增不减。

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use block_dev::BlockDevice;
use vfs::{DirEntry, DirEntryType, Error, OpenMode, Stat, VfsPath};

use crate::file::File;
use crate::filesystem::Filesystem;

/// 一个设备及挂载在其上的文件系统
#[derive(Debug)]
pub struct Mount {
    name: String,
    fs: Filesystem,
}

impl Mount {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filesystem(&self) -> &Filesystem {
        &self.fs
    }

    pub fn device(&self) -> &Arc<dyn BlockDevice> {
        self.fs.device()
    }
}

#[derive(Debug, Default)]
pub struct Vfs {
    mounts: Vec<Arc<Mount>>,
    default: Option<usize>,
}

impl Vfs {
    pub const fn new() -> Self {
        Self {
            mounts: Vec::new(),
            default: None,
        }
    }

    /// 以文件系统所在设备的名称登记挂载；第一个登记的设备成为默认设备
    pub fn register(&mut self, fs: Filesystem) -> Result<(), Error> {
        let name = String::from(fs.device().device_name());
        if self.find(&name).is_some() {
            log::warn!("vfs: device {name} is already registered");
            return Err(Error::Invalid);
        }

        log::info!("vfs: registered {name} ({})", fs.name());
        self.mounts.push(Arc::new(Mount { name, fs }));
        if self.default.is_none() {
            self.default = Some(self.mounts.len() - 1);
        }

        Ok(())
    }

    pub fn set_default(&mut self, name: &str) -> Result<(), Error> {
        let index = self
            .mounts
            .iter()
            .position(|mount| mount.name == name)
            .ok_or(Error::NotFound)?;
        self.default = Some(index);
        Ok(())
    }

    pub fn default_device(&self) -> Option<&str> {
        self.default.map(|index| self.mounts[index].name())
    }

    /// 按登记顺序列出设备名
    pub fn devices(&self) -> impl Iterator<Item = &str> {
        self.mounts.iter().map(|mount| mount.name())
    }

    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }

    pub fn list_devices(&self) {
        for mount in &self.mounts {
            let dev = mount.device();
            log::info!(
                "vfs: {} driver={} fs={} block_size={}{}",
                mount.name,
                dev.driver_name(),
                mount.fs.name(),
                dev.block_size(),
                if self.default_device() == Some(mount.name()) {
                    " (default)"
                } else {
                    ""
                }
            );
        }
    }

    pub fn find(&self, name: &str) -> Option<&Arc<Mount>> {
        self.mounts.iter().find(|mount| mount.name == name)
    }

    fn resolve<'a>(&self, path: &'a str) -> Result<(&Arc<Mount>, VfsPath<'a>), Error> {
        let path = VfsPath::parse(path)?;
        let mount = match path.device {
            Some(name) => self.find(name),
            None => self.default.map(|index| &self.mounts[index]),
        };
        let mount = mount.ok_or_else(|| {
            log::debug!("vfs: no device for {:?}", path.device);
            Error::NotFound
        })?;

        Ok((mount, path))
    }

    /// 列出目录；路径不含分量时为根目录
    pub fn read_directory(&self, path: &str) -> Result<Vec<DirEntry>, Error> {
        let (mount, path) = self.resolve(path)?;
        mount.fs.read_directory(&path.components)
    }

    pub fn open(&self, path: &str, mode: OpenMode) -> Result<File, Error> {
        if !mode.is_read_only() {
            return Err(Error::ReadOnly);
        }

        let (mount, path) = self.resolve(path)?;
        let entry = lookup(mount, &path)?;
        if entry.is_dir() {
            return Err(Error::Invalid);
        }
        let inner = mount.fs.open(&entry)?;

        Ok(File::new(mount.clone(), inner))
    }

    pub fn stat(&self, path: &str) -> Result<Stat, Error> {
        let (mount, path) = self.resolve(path)?;
        let block_size = mount.device().block_size() as u64;

        if path.components.is_empty() {
            return Ok(Stat {
                mode: DirEntryType::Directory,
                block_size,
                blocks: 0,
                size: 0,
            });
        }
        let entry = lookup(mount, &path)?;
        let size = u64::from(entry.size);

        Ok(Stat {
            mode: entry.ty,
            block_size,
            blocks: size.div_ceil(block_size.max(1)),
            size,
        })
    }
}

/// 列出所在目录，再按名称线性查找目标项
fn lookup(mount: &Mount, path: &VfsPath) -> Result<DirEntry, Error> {
    let (dir, name) = path.split_last().ok_or(Error::Invalid)?;
    mount
        .fs
        .read_directory(dir)?
        .into_iter()
        .find(|entry| entry.name == name)
        .ok_or(Error::NotFound)
}
