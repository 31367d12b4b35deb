//! Recovery orchestrator.
//!
//! Every torrent file with a `.gz` or `.bz2` extension goes through the same
//! sequence, stopping at the first step that settles it:
//!
//! 1. the target exists and overwriting is off => `skipped`
//! 2. neither a partial download nor a raw source exists => `missing`
//! 3. the partial download is already complete and correct => copied, `recovered`
//! 4. a candidate built from the raw source reproduces the piece hash => written, `recovered`
//! 5. raw fallback is on => the raw source is compressed directly, `gzipped`
//! 6. otherwise => `missing`
//!
//! Paths are laid out as follows:
//! - partial download: `<partial_dir>/<file path>`
//! - raw source: `<raw_dir>/<file path without its extension>`
//! - output: `<target_dir>/<torrent name>/<file path>`

use crate::candidate::{self, Candidate};
use crate::compressors::CompressorRegistry;
use crate::hash::HashAlgorithm;
use crate::header::{CompressionFormat, Header};
use crate::torrent::{TorrentFile, TorrentMeta};
use crate::util;
use crate::verify;
use crate::Result;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What happened to a single file.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FileOutcome {
    /// Byte-exact output verified against the torrent.
    Recovered,
    /// Compressed directly from the raw source, not verified.
    Gzipped,
    /// Target already exists.
    Skipped,
    /// Nothing could be produced.
    Missing,
}

/// Per-outcome file counts of one recovery run.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct RecoveryResult {
    pub recovered: usize,
    pub gzipped: usize,
    pub skipped: usize,
    pub missing: usize,
}

/// A configured recovery run over one torrent.
///
/// Required inputs are given to [`new()`], everything else has a default
/// and can be changed with the `set_*` methods.
///
/// [`new()`]: #method.new
#[derive(Clone, Debug)]
pub struct Recovery<'a> {
    torrent: &'a TorrentMeta,
    raw_dir: PathBuf,
    partial_dir: PathBuf,
    target_dir: PathBuf,
    raw_fallback: bool,
    overwrite: bool,
    dry_run: bool,
    hash_algorithm: HashAlgorithm,
    compressors: CompressorRegistry,
}

// The digest a reconstructed file must reproduce over its first `length` bytes.
struct MatchTarget {
    hash: Vec<u8>,
    length: usize,
    algorithm: HashAlgorithm,
}

impl RecoveryResult {
    pub fn record(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Recovered => self.recovered += 1,
            FileOutcome::Gzipped => self.gzipped += 1,
            FileOutcome::Skipped => self.skipped += 1,
            FileOutcome::Missing => self.missing += 1,
        }
    }

    /// Number of files considered.
    pub fn total(&self) -> usize {
        self.recovered + self.gzipped + self.skipped + self.missing
    }
}

impl FromIterator<FileOutcome> for RecoveryResult {
    fn from_iter<I>(outcomes: I) -> RecoveryResult
    where
        I: IntoIterator<Item = FileOutcome>,
    {
        let mut result = RecoveryResult::default();
        for outcome in outcomes {
            result.record(outcome);
        }
        result
    }
}

impl fmt::Display for FileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            FileOutcome::Recovered => write!(f, "recovered"),
            FileOutcome::Gzipped => write!(f, "gzipped"),
            FileOutcome::Skipped => write!(f, "skipped"),
            FileOutcome::Missing => write!(f, "missing"),
        }
    }
}

impl fmt::Display for RecoveryResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "recovered: {}", self.recovered)?;
        writeln!(f, "gzipped: {}", self.gzipped)?;
        writeln!(f, "skipped: {}", self.skipped)?;
        write!(f, "missing: {}", self.missing)
    }
}

impl<'a> Recovery<'a> {
    /// Create a new `Recovery` with required fields set.
    ///
    /// Defaults: no raw fallback, no overwriting, writes enabled, SHA-1,
    /// and the default [`CompressorRegistry`].
    ///
    /// [`CompressorRegistry`]: ../compressors/struct.CompressorRegistry.html
    pub fn new<P, Q, R>(
        torrent: &'a TorrentMeta,
        raw_dir: P,
        partial_dir: Q,
        target_dir: R,
    ) -> Recovery<'a>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
        R: AsRef<Path>,
    {
        Recovery {
            torrent,
            raw_dir: raw_dir.as_ref().to_path_buf(),
            partial_dir: partial_dir.as_ref().to_path_buf(),
            target_dir: target_dir.as_ref().to_path_buf(),
            raw_fallback: false,
            overwrite: false,
            dry_run: false,
            hash_algorithm: HashAlgorithm::default(),
            compressors: CompressorRegistry::default(),
        }
    }

    /// Compress the raw source directly when no candidate matches.
    pub fn set_raw_fallback(self, raw_fallback: bool) -> Recovery<'a> {
        Recovery {
            raw_fallback,
            ..self
        }
    }

    /// Replace targets that already exist instead of skipping them.
    pub fn set_overwrite(self, overwrite: bool) -> Recovery<'a> {
        Recovery { overwrite, ..self }
    }

    /// Compute the outcome of every file without writing anything.
    pub fn set_dry_run(self, dry_run: bool) -> Recovery<'a> {
        Recovery { dry_run, ..self }
    }

    /// Digest used for piece hashes (SHA-1 for v1 torrents).
    ///
    /// Whole-file BEP 47 `sha1` fields are always checked with SHA-1.
    pub fn set_hash_algorithm(self, hash_algorithm: HashAlgorithm) -> Recovery<'a> {
        Recovery {
            hash_algorithm,
            ..self
        }
    }

    /// Compressors used by raw fallback.
    pub fn set_compressors(self, compressors: CompressorRegistry) -> Recovery<'a> {
        Recovery {
            compressors,
            ..self
        }
    }

    /// Process every compressed file of the torrent and count the outcomes.
    ///
    /// Only hard failures (a file vanishing mid-run, I/O errors) abort the run.
    pub fn run(&self) -> Result<RecoveryResult> {
        let files: Vec<(&TorrentFile, CompressionFormat)> = self
            .torrent
            .files
            .iter()
            .filter(|file| !file.is_padding())
            .filter_map(|file| CompressionFormat::from_path(&file.path).map(|format| (file, format)))
            .collect();

        let outcomes = self.recover_all(&files)?;
        let result: RecoveryResult = outcomes.into_iter().collect();
        info!(
            recovered = result.recovered,
            gzipped = result.gzipped,
            skipped = result.skipped,
            missing = result.missing,
            "recovery finished"
        );
        Ok(result)
    }

    #[cfg(not(feature = "parallel"))]
    fn recover_all(&self, files: &[(&TorrentFile, CompressionFormat)]) -> Result<Vec<FileOutcome>> {
        files
            .iter()
            .map(|&(file, format)| self.recover_file(file, format))
            .collect()
    }

    #[cfg(feature = "parallel")]
    fn recover_all(&self, files: &[(&TorrentFile, CompressionFormat)]) -> Result<Vec<FileOutcome>> {
        files
            .par_iter()
            .map(|&(file, format)| self.recover_file(file, format))
            .collect()
    }

    /// Where `file` is written: `<target_dir>/<torrent name>/<file path>`.
    pub fn target_path(&self, file: &TorrentFile) -> PathBuf {
        self.target_dir.join(&self.torrent.name).join(&file.path)
    }

    pub fn partial_path(&self, file: &TorrentFile) -> PathBuf {
        self.partial_dir.join(&file.path)
    }

    pub fn raw_path(&self, file: &TorrentFile) -> PathBuf {
        self.raw_dir.join(util::strip_extension(&file.path))
    }

    fn recover_file(&self, file: &TorrentFile, format: CompressionFormat) -> Result<FileOutcome> {
        let outcome = self.decide(file, format)?;
        info!(file = %file.path.display(), %outcome);
        Ok(outcome)
    }

    fn decide(&self, file: &TorrentFile, format: CompressionFormat) -> Result<FileOutcome> {
        let target = self.target_path(file);
        if target.exists() && !self.overwrite {
            return Ok(FileOutcome::Skipped);
        }

        let partial = self.partial_path(file);
        let raw = self.raw_path(file);
        let has_partial = partial.is_file();
        let has_raw = raw.is_file();
        if !has_partial && !has_raw {
            debug!(file = %file.path.display(), "neither partial nor raw source exists");
            return Ok(FileOutcome::Missing);
        }

        if has_partial && self.partial_is_intact(file, format, &partial, &raw)? {
            debug!(file = %file.path.display(), "partial download is complete");
            self.copy_partial(&partial, &target)?;
            return Ok(FileOutcome::Recovered);
        }

        if has_raw {
            let header = if has_partial {
                Header::read_from_file(&partial)?
            } else {
                None
            };
            if header.is_none() && has_partial {
                debug!(file = %file.path.display(), "no usable header in partial download");
            }

            if let Some(candidate) = self.search(file, format, &raw, header.as_ref())? {
                info!(file = %file.path.display(), candidate = %candidate.label, "matched piece hash");
                self.write_output(&target, &candidate.data)?;
                return Ok(FileOutcome::Recovered);
            }

            if self.raw_fallback {
                warn!(file = %file.path.display(), "no exact match, compressing raw source");
                self.compressors
                    .get(format.extension())?
                    .compress(&raw, &target, self.dry_run)?;
                return Ok(FileOutcome::Gzipped);
            }
        }

        Ok(FileOutcome::Missing)
    }

    // The piece that owns the file's opening bytes, else the file's own SHA-1.
    // A piece hash of the wrong size for the configured digest never matches.
    fn match_target(&self, file: &TorrentFile) -> Result<Option<MatchTarget>> {
        if let Some(window) = self.torrent.piece_window(file) {
            if window.hash.len() == self.hash_algorithm.output_len() {
                return Ok(Some(MatchTarget {
                    hash: window.hash.to_vec(),
                    length: window.length,
                    algorithm: self.hash_algorithm,
                }));
            }
            debug!(
                file = %file.path.display(),
                algorithm = %self.hash_algorithm,
                "piece hash length does not fit the digest"
            );
        }

        match (file.sha1.as_ref(), file.length) {
            (Some(sha1), Some(length)) => Ok(Some(MatchTarget {
                hash: sha1.clone(),
                length: util::u64_to_usize(length)?,
                algorithm: HashAlgorithm::Sha1,
            })),
            _ => Ok(None),
        }
    }

    // Declared length and BEP 47 SHA-1 must agree, when present.
    fn consistent_with_torrent(file: &TorrentFile, data: &[u8]) -> bool {
        let length_ok = file
            .length
            .map_or(true, |length| util::usize_to_u64(data.len()).ok() == Some(length));
        length_ok
            && file
                .sha1
                .as_ref()
                .map_or(true, |sha1| HashAlgorithm::Sha1.digest(data) == *sha1)
    }

    fn search(
        &self,
        file: &TorrentFile,
        format: CompressionFormat,
        raw: &Path,
        header: Option<&Header>,
    ) -> Result<Option<Candidate>> {
        let target = match self.match_target(file)? {
            Some(target) => target,
            None => {
                debug!(file = %file.path.display(), "no piece hash covers the file's opening bytes");
                return Ok(None);
            }
        };

        let candidates: Box<dyn Iterator<Item = Candidate> + '_> = match (format, header) {
            (CompressionFormat::Gzip, Some(Header::Gzip(header))) => {
                Box::new(candidate::generate_gzip_candidates(raw, Some(header))?)
            }
            (CompressionFormat::Bzip2, Some(Header::Bzip2(header))) => {
                Box::new(candidate::generate_bzip2_candidates(raw, Some(header))?)
            }
            (CompressionFormat::Gzip, _) => Box::new(candidate::generate_gzip_candidates(raw, None)?),
            (CompressionFormat::Bzip2, _) => {
                Box::new(candidate::generate_bzip2_candidates(raw, None)?)
            }
        };
        let candidates = candidates.filter(|candidate| Self::consistent_with_torrent(file, &candidate.data));

        Ok(candidate::find_matching_candidate(
            candidates,
            &target.hash,
            target.length,
            target.algorithm,
        ))
    }

    fn partial_is_intact(
        &self,
        file: &TorrentFile,
        format: CompressionFormat,
        partial: &Path,
        raw: &Path,
    ) -> Result<bool> {
        let length = match file.length {
            Some(length) => length,
            None => return Ok(false),
        };
        if fs::metadata(partial)?.len() != length {
            return Ok(false);
        }

        if let Some(window) = self.torrent.piece_window(file) {
            let mut piece = Vec::with_capacity(window.length);
            util::open_file(partial)?
                .take(util::usize_to_u64(window.length)?)
                .read_to_end(&mut piece)?;
            Ok(self.hash_algorithm.digest(&piece) == window.hash)
        } else if let Some(ref sha1) = file.sha1 {
            Ok(HashAlgorithm::Sha1.digest(&fs::read(partial)?) == *sha1)
        } else if format.has_trailer() && raw.is_file() {
            verify::verify_raw_against_gz(raw, partial)
        } else {
            Ok(false)
        }
    }

    fn copy_partial(&self, partial: &Path, target: &Path) -> Result<()> {
        if self.dry_run {
            return Ok(());
        }
        if target.exists() && fs::canonicalize(partial)? == fs::canonicalize(target)? {
            return Ok(());
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(partial, target)?;
        Ok(())
    }

    fn write_output(&self, target: &Path, data: &[u8]) -> Result<()> {
        if self.dry_run {
            return Ok(());
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(target, data)?;
        Ok(())
    }
}

/// Recover every compressed file of `torrent` into `target_dir`.
///
/// Shorthand for [`Recovery`] with the given switches and defaults otherwise.
///
/// [`Recovery`]: struct.Recovery.html
pub fn recover<P, Q, R>(
    torrent: &TorrentMeta,
    raw_dir: P,
    partial_dir: Q,
    target_dir: R,
    raw_fallback: bool,
    overwrite: bool,
    dry_run: bool,
) -> Result<RecoveryResult>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    R: AsRef<Path>,
{
    Recovery::new(torrent, raw_dir, partial_dir, target_dir)
        .set_raw_fallback(raw_fallback)
        .set_overwrite(overwrite)
        .set_dry_run(dry_run)
        .run()
}

#[cfg(test)]
mod recovery_result_tests {
    use super::*;

    #[test]
    fn from_outcomes() {
        let result: RecoveryResult = vec![
            FileOutcome::Recovered,
            FileOutcome::Missing,
            FileOutcome::Recovered,
            FileOutcome::Skipped,
        ]
        .into_iter()
        .collect();

        assert_eq!(
            result,
            RecoveryResult {
                recovered: 2,
                gzipped: 0,
                skipped: 1,
                missing: 1,
            }
        );
        assert_eq!(result.total(), 4);
    }

    #[test]
    fn display_ok() {
        let result = RecoveryResult {
            recovered: 1,
            gzipped: 2,
            skipped: 3,
            missing: 4,
        };
        assert_eq!(
            result.to_string(),
            "recovered: 1\ngzipped: 2\nskipped: 3\nmissing: 4"
        );
    }
}
