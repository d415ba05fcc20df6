mod block_file;
mod cli;

use std::fs::File;
use std::io::{self, Write};
use std::sync::Arc;

use block_dev::BlockDevice;
use clap::Parser;
use storage::Vfs;
use typed_bytesize::ByteSizeIec;
use vfs::{DirEntryType, OpenMode};

pub use self::{block_file::BlockFile, cli::Cli};

fn main() -> io::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    log::info!("image={:?} name={:?} kind={:#04x}", cli.image, cli.name, cli.kind);

    let fd = File::open(&cli.image)?;
    let block_dev: Arc<dyn BlockDevice> = Arc::new(BlockFile::new(fd, &cli.name)?);

    let mut vfs = Vfs::new();
    if storage::mount_device(&mut vfs, block_dev, cli.kind) == 0 {
        return Err(io::Error::other("no filesystem found on the image"));
    }

    if cli.devices {
        for name in vfs.devices() {
            let default = if vfs.default_device() == Some(name) { "*" } else { " " };
            let mount = vfs.find(name).ok_or_else(|| io::Error::other("device vanished"))?;
            println!("{default} {name:<12} {}", mount.filesystem().name());
        }
    }

    if let Some(path) = &cli.ls {
        let entries = vfs.read_directory(path).map_err(to_io)?;
        for entry in entries {
            let ty = match entry.ty {
                DirEntryType::Directory => 'd',
                DirEntryType::SymLink => 'l',
                _ => '-',
            };
            println!("{ty} {:>12} {}", ByteSizeIec(entry.size.into()).to_string(), entry.name);
        }
    }

    if let Some(path) = &cli.cat {
        let mut file = vfs.open(path, OpenMode::Read).map_err(to_io)?;
        let data = file.read_to_end().map_err(to_io)?;
        file.close();
        io::stdout().lock().write_all(&data)?;
    }

    Ok(())
}

fn to_io(err: vfs::Error) -> io::Error {
    io::Error::other(err.to_string())
}
