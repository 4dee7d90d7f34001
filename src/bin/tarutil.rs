//! Command-line utility for inspecting and unpacking tar streams.
//!
//! `tarutil` lists the entries of a tar archive, prints the content or
//! metadata of a single entry, and safely extracts an archive's directories
//! and regular files below a destination.

use std::{
    fs::File,
    io::{self, Read, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use tarutil::{
    filesystem::{Filesystem, OsFilesystem},
    iterate,
    metadata::FileType,
    metadata_from_tar, reader_from_tar, ReadLimit, TarExtractor, Visit,
};

/// tarutil
#[derive(Debug, Parser)]
#[clap(name = "tarutil", version)]
pub struct App {
    /// Maximum bytes to extract per regular file (defaults to
    /// $TARUTIL_PER_FILE_READ_LIMIT, then 2 GiB)
    #[clap(long)]
    read_limit: Option<String>,

    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Lists the entries of a tar archive
    Ls {
        /// the archive to read, or '-' for stdin
        archive: PathBuf,
    },
    /// Writes the content of one entry to stdout
    Cat {
        /// the archive to read, or '-' for stdin
        archive: PathBuf,
        /// the path of the entry, exactly as recorded in the archive
        path: String,
    },
    /// Prints the metadata of one entry
    Stat {
        /// the archive to read, or '-' for stdin
        archive: PathBuf,
        /// the path of the entry, exactly as recorded in the archive
        path: String,
    },
    /// Extracts directories and regular files below a destination directory
    Extract {
        /// the archive to read, or '-' for stdin
        archive: PathBuf,
        /// the destination directory
        destination: PathBuf,
    },
}

fn open_archive(path: &Path) -> Result<Box<dyn Read>> {
    if path == Path::new("-") {
        return Ok(Box::new(io::stdin().lock()));
    }
    let file = File::open(path).with_context(|| format!("opening archive {path:?}"))?;
    Ok(Box::new(io::BufReader::new(file)))
}

fn main() -> Result<()> {
    env_logger::init();

    let args = App::parse();

    let read_limit = match &args.read_limit {
        Some(value) => ReadLimit::parse(value),
        None => ReadLimit::process_default(),
    };

    match args.cmd {
        Command::Ls { archive } => {
            let mut stdout = io::stdout().lock();
            iterate(open_archive(&archive)?, |entry| {
                let header = &entry.header;
                write!(
                    stdout,
                    "{:>6} {:<8} {:>12} {}",
                    entry.sequence,
                    FileType::from(header.entry_type),
                    header.size,
                    header.name
                )?;
                if let Some(target) = &header.link_name {
                    write!(stdout, " -> {target}")?;
                }
                writeln!(stdout)?;
                Ok(Visit::Continue)
            })?;
        }
        Command::Cat { archive, path } => {
            let mut reader = reader_from_tar(open_archive(&archive)?, &path)?;
            io::copy(&mut reader, &mut io::stdout().lock())?;
            reader.close();
        }
        Command::Stat { archive, path } => {
            let metadata = metadata_from_tar(open_archive(&archive)?, &path)?;
            println!("path: {}", metadata.path);
            println!("type: {}", metadata.file_type);
            if let Some(target) = &metadata.link_destination {
                println!("link: {target}");
            }
            println!("size: {}", metadata.size);
            println!("mode: {:o}", metadata.mode);
            println!(
                "owner: {}:{}",
                metadata.user_name.as_deref().unwrap_or(&metadata.uid.to_string()),
                metadata.group_name.as_deref().unwrap_or(&metadata.gid.to_string())
            );
            println!("mtime: {}", metadata.mod_time);
            if let Some(digest) = &metadata.digest {
                println!("sha256: {digest}");
            }
        }
        Command::Extract {
            archive,
            destination,
        } => {
            let destination = std::path::absolute(&destination)
                .with_context(|| format!("resolving destination {destination:?}"))?;
            OsFilesystem
                .mkdir_all(&destination, 0o755)
                .with_context(|| format!("creating destination {destination:?}"))?;
            TarExtractor::new(OsFilesystem, &destination, read_limit)?
                .unpack(open_archive(&archive)?)
                .with_context(|| format!("extracting into {destination:?}"))?;
        }
    }

    Ok(())
}
