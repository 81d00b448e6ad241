//! Binary entry point for the `hexconv` command-line tool.
//!
//! Loads one firmware image, optionally crops or shifts it, and either
//! writes it in another format or prints a block summary.
//!
//! # Control flow
//!
//! 1. `clap` parses the arguments into [`hexmap::cli::Args`].
//! 2. A `tracing` subscriber is installed at the verbosity selected by
//!    `-v` flags.
//! 3. [`run`] performs the load, the edits, and the save, and returns the
//!    process exit code (0 = success, 1 = parse problems or I/O failure).

use anyhow::Context;
use clap::Parser;
use tracing::debug;

use hexmap::cli::Args;
use hexmap::{DataFile, FormatKind};

fn main() {
    let args = Args::parse();
    init_tracing(&args);
    match run(args) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("hexconv: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing(args: &Args) {
    let level = if args.quiet {
        tracing::Level::ERROR
    } else {
        match args.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: Args) -> anyhow::Result<i32> {
    let mut file = DataFile::new();
    file.invalid_checksum_warning = args.checksum_warn;
    file.memory_map.set_blank_data(args.fill);

    file.load_path(&args.input, args.from)
        .with_context(|| format!("cannot load {}", args.input.display()))?;
    let loaded_format = file.format.expect("format set by load");
    debug!(
        format = %loaded_format,
        blocks = file.memory_map.block_count(),
        bytes = file.memory_map.size(),
        "image loaded"
    );

    for warning in &file.warnings {
        eprintln!("hexconv: {}: warning: {warning}", args.input.display());
    }
    for error in &file.errors {
        eprintln!("hexconv: {}: {error}", args.input.display());
    }
    let had_errors = !file.errors.is_empty();

    if let Some(region) = args.crop {
        file.memory_map.crop(region).context("crop failed")?;
    }
    if let Some(delta) = args.offset {
        file.memory_map
            .offset_all_data(delta, !args.down)
            .context("offset failed")?;
    }

    match &args.output {
        Some(output) => {
            let kind = args
                .to
                .unwrap_or_else(|| FormatKind::from_extension(output));
            save_with_options(&mut file, output, kind, args.bytes_per_line)
                .with_context(|| format!("cannot save {}", output.display()))?;
        }
        None => print_summary(&file, loaded_format),
    }

    Ok(if had_errors { 1 } else { 0 })
}

/// Save honoring a `--bytes-per-line` override, which needs a hand-built
/// codec instead of the format's default one.
fn save_with_options(
    file: &mut DataFile,
    output: &std::path::Path,
    kind: FormatKind,
    bytes_per_line: Option<usize>,
) -> anyhow::Result<()> {
    match bytes_per_line {
        None => file.save_path(output, Some(kind))?,
        Some(n) => {
            let Some(mut codec) = kind.codec() else {
                anyhow::bail!("--bytes-per-line does not apply to binary formats");
            };
            codec.set_bytes_per_line(n);
            file.memory_map.organize();
            let out = std::fs::File::create(output)?;
            let mut out = std::io::BufWriter::new(out);
            codec.save(&file.memory_map, &mut out)?;
            use std::io::Write;
            out.flush()?;
        }
    }
    Ok(())
}

fn print_summary(file: &DataFile, format: FormatKind) {
    println!(
        "{}: {} block(s), {} byte(s)",
        format,
        file.memory_map.block_count(),
        file.memory_map.size()
    );
    for region in file.memory_map.regions() {
        println!("  {:#010X}..{:#010X}  {:>10} bytes", region.start(), region.end(), region.size());
    }
}
