use clap::Parser;
use std::path::PathBuf;

/// Inspect a disk image with the boot loader's storage stack
#[derive(Parser)]
pub struct Cli {
    /// Disk image to open
    #[arg(long, short)]
    pub image: PathBuf,

    /// Device name of the image
    #[arg(long, short, default_value = "img0")]
    pub name: String,

    /// Partition type to mount the image as; 0 scans for an MBR
    #[arg(long, short, default_value_t = 0, value_parser = parse_kind)]
    pub kind: u8,

    /// List the mounted devices
    #[arg(long, short)]
    pub devices: bool,

    /// List a directory, e.g. `(img0_0)/boot`
    #[arg(long)]
    pub ls: Option<String>,

    /// Dump a file to stdout
    #[arg(long)]
    pub cat: Option<String>,
}

/// 接受十进制或`0x`开头的十六进制
fn parse_kind(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x") {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|err| format!("invalid partition type {s:?}: {err}"))
}
