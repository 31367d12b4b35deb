//! Raw-fallback compressors.
//!
//! When no candidate reproduces a file exactly, the orchestrator can still
//! produce *a* valid compressed file by running the compressor registered
//! for the target's extension. These outputs are not hash-verified.

use crate::util;
use crate::{RecoveryError, Result};
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

/// Compress a source file into a destination file.
///
/// Implementations create the destination's parent directories and must
/// not touch the filesystem when `dry_run` is set.
pub trait Compressor: Send + Sync {
    fn compress(&self, src: &Path, dst: &Path, dry_run: bool) -> Result<()>;
}

impl<F> Compressor for F
where
    F: Fn(&Path, &Path, bool) -> Result<()> + Send + Sync,
{
    fn compress(&self, src: &Path, dst: &Path, dry_run: bool) -> Result<()> {
        self(src, dst, dry_run)
    }
}

/// gzip at the best level, mtime 0 and no stored file name.
#[derive(Clone, Copy, Debug, Default)]
pub struct GzipCompressor;

/// bzip2 at the best level.
#[derive(Clone, Copy, Debug, Default)]
pub struct Bzip2Compressor;

// Open `src` and a fresh `dst` (parents included), then hand both to `write`.
fn compress_with<W>(src: &Path, dst: &Path, write: W) -> Result<()>
where
    W: FnOnce(&mut BufReader<File>, BufWriter<File>) -> io::Result<()>,
{
    let mut reader = BufReader::new(util::open_file(src)?);
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    let writer = BufWriter::new(File::create(dst)?);
    write(&mut reader, writer)?;
    Ok(())
}

impl Compressor for GzipCompressor {
    fn compress(&self, src: &Path, dst: &Path, dry_run: bool) -> Result<()> {
        if dry_run {
            return Ok(());
        }
        compress_with(src, dst, |reader, writer| {
            let mut encoder = flate2::GzBuilder::new()
                .mtime(0)
                .write(writer, flate2::Compression::best());
            io::copy(reader, &mut encoder)?;
            encoder.finish()?.flush()
        })
    }
}

impl Compressor for Bzip2Compressor {
    fn compress(&self, src: &Path, dst: &Path, dry_run: bool) -> Result<()> {
        if dry_run {
            return Ok(());
        }
        compress_with(src, dst, |reader, writer| {
            let mut encoder = bzip2::write::BzEncoder::new(writer, bzip2::Compression::best());
            io::copy(reader, &mut encoder)?;
            encoder.finish()?.flush()
        })
    }
}

/// Extension (e.g. `".gz"`) to compressor mapping.
///
/// `Default` registers [`GzipCompressor`] for `.gz` and [`Bzip2Compressor`]
/// for `.bz2`; more can be added at runtime.
#[derive(Clone)]
pub struct CompressorRegistry {
    compressors: HashMap<String, Arc<dyn Compressor>>,
}

impl CompressorRegistry {
    /// A registry with nothing registered.
    pub fn empty() -> CompressorRegistry {
        CompressorRegistry {
            compressors: HashMap::new(),
        }
    }

    /// Register `compressor` for `extension`, replacing any previous one.
    pub fn register<S, C>(&mut self, extension: S, compressor: C) -> &mut CompressorRegistry
    where
        S: Into<String>,
        C: Compressor + 'static,
    {
        self.compressors
            .insert(extension.into(), Arc::new(compressor));
        self
    }

    /// The compressor for `extension`, or `Err(UnknownExtension)`.
    pub fn get(&self, extension: &str) -> Result<&dyn Compressor> {
        self.compressors
            .get(extension)
            .map(|compressor| compressor.as_ref())
            .ok_or_else(|| RecoveryError::UnknownExtension(extension.to_owned()))
    }

    /// Registered extensions, sorted.
    pub fn extensions(&self) -> Vec<&str> {
        let mut extensions: Vec<&str> = self.compressors.keys().map(String::as_str).collect();
        extensions.sort_unstable();
        extensions
    }
}

impl Default for CompressorRegistry {
    fn default() -> CompressorRegistry {
        let mut registry = CompressorRegistry::empty();
        registry
            .register(".gz", GzipCompressor)
            .register(".bz2", Bzip2Compressor);
        registry
    }
}

impl fmt::Debug for CompressorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CompressorRegistry")
            .field("extensions", &self.extensions())
            .finish()
    }
}
