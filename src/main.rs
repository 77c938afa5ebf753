#![forbid(unsafe_code)]

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};
use structopt::StructOpt;

////////////////////////////////////////////////////////////////////////////////

#[derive(StructOpt, Debug)]
#[structopt(name = "gzslice", about = "Decompresses a gzip file.")]
struct Opts {
    /// Increases log verbosity, may be repeated.
    #[structopt(short = "v", parse(from_occurrences))]
    verbose: usize,

    /// Skips the header crc16, size and crc32 checks.
    #[structopt(long)]
    no_verify: bool,

    /// Writes the contents to stdout.
    #[structopt(short = "c", long)]
    stdout: bool,

    /// Output file. Defaults to the name stored in the archive.
    #[structopt(short, long, parse(from_os_str))]
    output: Option<PathBuf>,

    #[structopt(parse(from_os_str))]
    input: PathBuf,
}

fn output_path(input: &Path, stored_name: Option<&str>) -> PathBuf {
    // Only the final component of a stored name is trusted.
    if let Some(name) = stored_name.and_then(|name| Path::new(name).file_name()) {
        return input.with_file_name(name);
    }
    match input.extension() {
        Some(ext) if ext == "gz" => input.with_extension(""),
        _ => {
            let mut name = std::ffi::OsString::from("decompressed_");
            name.push(input.file_name().unwrap_or_default());
            input.with_file_name(name)
        }
    }
}

fn main() -> Result<()> {
    let opts = Opts::from_args();
    stderrlog::new().verbosity(opts.verbose).init()?;

    let input = fs::read(&opts.input)
        .with_context(|| format!("failed to read {}", opts.input.display()))?;
    let result = gzslice::decompress(&input)
        .with_context(|| format!("failed to decompress {}", opts.input.display()))?;
    info!(
        "{}: {} -> {} bytes",
        opts.input.display(),
        input.len(),
        result.contents.len()
    );

    if opts.no_verify {
        warn!("skipping trailer verification");
    } else {
        result.verify().context("integrity check failed")?;
    }

    if opts.stdout {
        let mut stdout = io::stdout().lock();
        stdout.write_all(&result.contents)?;
        stdout.flush()?;
        return Ok(());
    }

    let path = match opts.output {
        Some(path) => path,
        None => output_path(&opts.input, result.name.as_deref()),
    };
    fs::write(&path, &result.contents)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!("wrote {}", path.display());
    Ok(())
}

////////////////////////////////////////////////////////////////////////////////
