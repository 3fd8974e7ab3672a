use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::warn;

mod rom;
mod size;

use rom::{BuildReport, Format, ImageBuilder, Named};

/// Add padding to a system image and create special ROM formats
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generic zero padding
    Pad {
        /// Target image size (bytes, or with a k/M/G suffix)
        #[arg(value_parser = size::parse_size)]
        size: u64,
        source: PathBuf,
        destination: PathBuf,
    },

    /// Steem Engine cartridge image
    Stc { source: PathBuf, destination: PathBuf },

    /// PAK/3 image
    Pak3 { source: PathBuf, destination: PathBuf },
}

impl Command {
    fn format(&self) -> Format {
        match *self {
            Command::Pad { size, .. } => Format::Pad { target_size: size },
            Command::Stc { .. } => Format::Stc,
            Command::Pak3 { .. } => Format::Pak3,
        }
    }

    fn paths(&self) -> (&Path, &Path) {
        match self {
            Command::Pad {
                source,
                destination,
                ..
            }
            | Command::Stc {
                source,
                destination,
            }
            | Command::Pak3 {
                source,
                destination,
            } => (source.as_path(), destination.as_path()),
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let format = args.command.format();
    let (source, destination) = args.command.paths();
    let (src_name, dst_name) = (source.display().to_string(), destination.display().to_string());

    let report = build_file(format, source, &src_name, destination, &dst_name)?;

    match format {
        Format::Pak3 => println!("# {dst_name} done"),
        _ => println!("# {dst_name} done ({} bytes free)", report.padding),
    }
    Ok(())
}

/// Build `destination` from `source`, deleting the destination on any failure.
fn build_file(
    format: Format,
    source: &Path,
    src_name: &str,
    destination: &Path,
    dst_name: &str,
) -> Result<BuildReport> {
    let input = File::open(source).with_context(|| format!("{src_name}: cannot open"))?;
    let output =
        File::create(destination).with_context(|| format!("{dst_name}: cannot create"))?;

    let kind = match format {
        Format::Stc => " Steem Engine cartridge",
        _ => "",
    };
    println!(
        "# Padding {src_name} to {} KB{kind} image into {dst_name}",
        format.layout().target_size / 1024
    );

    let mut src = Named::new(input, src_name);
    let mut dst = Named::new(output, dst_name);
    let result = ImageBuilder::new()
        .build(format, &mut src, &mut dst)
        .map_err(anyhow::Error::from)
        .and_then(|report| {
            dst.stream
                .sync_all()
                .with_context(|| format!("{dst_name}: cannot flush"))?;
            Ok(report)
        });

    if result.is_err() {
        drop(dst);
        if let Err(e) = fs::remove_file(destination) {
            warn!("{dst_name}: cannot remove partial image: {e}");
        }
    }
    result.with_context(|| format!("failed to build {dst_name}"))
}
