//! bandview CLI - Inspect and extract banded (sparse bundle) disk images.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bandview_core::{AccessMode, ImageHandle, ImageSource};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use sha2::{Digest, Sha256};

/// Tool for inspecting and extracting banded (sparse bundle) disk images.
#[derive(Parser)]
#[command(name = "bandview")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display information about a banded disk image.
    Info {
        /// Path to the sparse bundle directory.
        bundle: PathBuf,
    },

    /// Extract the virtual media to a raw image file.
    Extract {
        /// Path to the sparse bundle directory.
        bundle: PathBuf,

        /// Output raw image path. Defaults to the bundle name with .raw extension.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Chunk size in megabytes for copying.
        #[arg(long, default_value = "8")]
        chunk_size: usize,

        /// Print the SHA-256 digest of the extracted media.
        #[arg(long)]
        digest: bool,

        /// Suppress progress output.
        #[arg(short, long)]
        quiet: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Info { bundle } => {
            show_info(&bundle)?;
        }
        Commands::Extract {
            bundle,
            output,
            chunk_size,
            digest,
            quiet,
        } => {
            run_extract(&bundle, output.as_deref(), chunk_size, digest, quiet)?;
        }
    }

    Ok(())
}

/// Open a bundle and resolve its band data files.
fn open_image(bundle: &Path) -> Result<ImageHandle> {
    let mut handle = ImageHandle::new();
    handle
        .open(ImageSource::path(bundle), AccessMode::Read)
        .with_context(|| format!("failed to open image '{}'", bundle.display()))?;
    handle
        .open_band_data_files()
        .with_context(|| format!("failed to open band data files of '{}'", bundle.display()))?;
    Ok(handle)
}

fn show_info(bundle: &Path) -> Result<()> {
    let handle = open_image(bundle)?;

    let band_count = handle.band_count()?;
    let present = handle.present_band_count()?;

    println!("Image Information");
    println!("=================");
    println!();
    println!("Bundle:        {}", bundle.display());
    println!("Media size:    {}", format_bytes(handle.media_size()?));
    println!("Band size:     {}", format_bytes(handle.band_size()?));
    println!("Bands:         {}", band_count);
    println!("  present:     {}", present);
    println!("  sparse:      {}", band_count - present);

    Ok(())
}

fn run_extract(
    bundle: &Path,
    output: Option<&Path>,
    chunk_size_mb: usize,
    digest: bool,
    quiet: bool,
) -> Result<()> {
    let mut handle = open_image(bundle)?;
    let media_size = handle.media_size()?;

    let output_path = match output {
        Some(path) => path.to_path_buf(),
        None => {
            let stem = bundle
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "image".to_string());
            PathBuf::from(format!("{}.raw", stem))
        }
    };

    if !quiet {
        println!("Extracting {}", bundle.display());
        println!("Media size: {}", format_bytes(media_size));
        println!("Output:     {}", output_path.display());
        println!();
    }

    let file = File::create(&output_path)
        .with_context(|| format!("failed to create '{}'", output_path.display()))?;
    let mut writer = BufWriter::new(file);

    let progress_bar = if quiet {
        None
    } else {
        let pb = ProgressBar::new(media_size);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")?
            .progress_chars("#>-");
        pb.set_style(style);
        Some(pb)
    };

    let chunk_size = (chunk_size_mb.max(1) * 1024 * 1024) as u64;
    let mut hasher = digest.then(Sha256::new);
    let mut extracted = 0u64;

    loop {
        let chunk = handle
            .read_buffer(Some(chunk_size))
            .context("failed to read media")?;
        if chunk.is_empty() {
            break;
        }

        writer.write_all(&chunk).context("failed to write output")?;
        if let Some(hasher) = hasher.as_mut() {
            hasher.update(&chunk);
        }

        extracted += chunk.len() as u64;
        if let Some(pb) = &progress_bar {
            pb.set_position(extracted);
        }
    }

    writer.flush().context("failed to flush output")?;
    handle.close()?;

    if let Some(pb) = progress_bar {
        pb.finish_with_message("Complete!");
    }

    if !quiet {
        println!();
        println!(
            "Extracted {} to {}",
            format_bytes(extracted),
            output_path.display()
        );
    }

    if let Some(hasher) = hasher {
        let sum = hasher.finalize();
        println!("SHA-256: {}", hex_string(&sum));
    }

    Ok(())
}

/// Format bytes as human-readable string.
fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if bytes >= TB {
        format!("{:.2} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Render a digest as lowercase hex.
fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
