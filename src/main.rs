use clap::Parser;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use torrent_compress_recovery::header::{CompressionFormat, Header};
use torrent_compress_recovery::recover::Recovery;
use torrent_compress_recovery::torrent::TorrentMeta;
use torrent_compress_recovery::verify::verify_last_piece_against_raw;
use torrent_compress_recovery::{RecoveryError, Result};
use tracing_subscriber::EnvFilter;

/// Rebuild the exact .gz/.bz2 files of a torrent from their uncompressed sources.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// The .torrent file
    torrent: PathBuf,
    /// Directory holding the uncompressed sources
    raw_dir: PathBuf,
    /// Directory holding the (partial) download
    partial_dir: PathBuf,
    /// Output directory; files land in <TARGET_DIR>/<torrent name>/
    target_dir: PathBuf,
    /// Compress the raw source directly when no exact match is found
    #[arg(long)]
    raw_fallback: bool,
    /// Replace files that already exist in the output directory
    #[arg(long)]
    overwrite: bool,
    /// Report what would happen without writing anything
    #[arg(long)]
    dry_run: bool,
    /// Print the headers of the compressed files in PARTIAL_DIR and exit
    #[arg(long)]
    header_info: bool,
    /// Only check complete partial .gz files against their raw sources
    #[arg(long)]
    verify_only: bool,
    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(1)
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: &Args) -> Result<ExitCode> {
    if args.header_info {
        print_headers(&args.partial_dir)?;
        return Ok(ExitCode::SUCCESS);
    }

    let torrent = TorrentMeta::read_from_file(&args.torrent)?;

    if args.verify_only {
        let results = verify_last_piece_against_raw(&torrent, &args.raw_dir, &args.partial_dir)?;
        for (path, verified) in &results {
            println!("{}: {}", path.display(), if *verified { "ok" } else { "mismatch" });
        }
        return Ok(if results.values().all(|&verified| verified) {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(1)
        });
    }

    let result = Recovery::new(&torrent, &args.raw_dir, &args.partial_dir, &args.target_dir)
        .set_raw_fallback(args.raw_fallback)
        .set_overwrite(args.overwrite)
        .set_dry_run(args.dry_run)
        .run()?;
    println!("{}", result);

    Ok(if result.missing > 0 {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    })
}

// Non-recursive, sorted by file name.
fn print_headers(partial_dir: &Path) -> Result<()> {
    let entries = fs::read_dir(partial_dir).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => RecoveryError::NotFound(partial_dir.to_path_buf()),
        _ => RecoveryError::Io(e),
    })?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_file() && CompressionFormat::from_path(path).is_some())
        .collect();
    paths.sort();

    for path in paths {
        println!("{}:", path.display());
        match Header::read_from_file(&path)? {
            Some(header) => println!("{}\n", header),
            None => println!("(no valid header)\n"),
        }
    }
    Ok(())
}
