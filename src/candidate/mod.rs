//! Candidate engine: produce compressed renditions of a raw file and pick the one
//! whose leading bytes reproduce a torrent piece hash.
//!
//! Candidates come from two places, in priority order: the in-process
//! compressor driven by a captured header, then a sweep over the external
//! compressor executables installed on the system. Sequences are lazy, so
//! the external tools only run until a match is found.

use crate::hash::HashAlgorithm;
use crate::header::CompressionFormat;
use crate::util;
use crate::Result;
use std::ffi::OsString;
use std::fmt;
use std::io::{self, Read};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::debug;

mod bz2;
mod gzip;

pub use self::bz2::generate_bzip2_candidates;
pub use self::gzip::generate_gzip_candidates;

/// Label of the candidate built from a captured header.
pub const HEADER_MATCH_LABEL: &str = "header_match";
/// Levels tried by the tool sweep: minimum, default and maximum.
pub const SWEEP_LEVELS: [u8; 3] = [1, 6, 9];

/// A compressed buffer together with a description of what produced it.
#[derive(Clone, Eq, PartialEq)]
pub struct Candidate {
    pub label: String,
    pub data: Vec<u8>,
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Candidate")
            .field("label", &self.label)
            .field("len", &self.data.len())
            .finish()
    }
}

/// External compressor executables known to the sweep.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Tool {
    Gzip,
    Pigz,
    Bzip2,
    Pbzip2,
}

/// An external tool could not produce a candidate.
#[derive(Debug, Error)]
pub enum ToolUnavailable {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with {status}")]
    Failed {
        program: &'static str,
        status: ExitStatus,
    },
}

/// One invocation of an external tool.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ToolSettings {
    pub tool: Tool,
    pub level: u8,
    /// Pass `-n` (do not store name and timestamp).
    pub no_name: bool,
    /// Pass `--rsyncable`.
    pub rsyncable: bool,
}

static PIGZ_AVAILABLE: OnceLock<bool> = OnceLock::new();
static PBZIP2_AVAILABLE: OnceLock<bool> = OnceLock::new();

impl Tool {
    pub fn program(self) -> &'static str {
        match self {
            Tool::Gzip => "gzip",
            Tool::Pigz => "pigz",
            Tool::Bzip2 => "bzip2",
            Tool::Pbzip2 => "pbzip2",
        }
    }

    pub fn format(self) -> CompressionFormat {
        match self {
            Tool::Gzip | Tool::Pigz => CompressionFormat::Gzip,
            Tool::Bzip2 | Tool::Pbzip2 => CompressionFormat::Bzip2,
        }
    }

    /// Baseline tools are always swept; a missing one simply yields nothing.
    pub fn is_baseline(self) -> bool {
        matches!(self, Tool::Gzip | Tool::Bzip2)
    }

    pub fn supports_rsyncable(self) -> bool {
        self == Tool::Gzip
    }

    pub fn supports_no_name(self) -> bool {
        self.format() == CompressionFormat::Gzip
    }

    /// Whether the tool should be part of the sweep.
    ///
    /// Non-baseline tools are probed once per process.
    pub fn is_available(self) -> bool {
        if self.is_baseline() {
            return true;
        }
        let cache = match self {
            Tool::Pbzip2 => &PBZIP2_AVAILABLE,
            _ => &PIGZ_AVAILABLE,
        };
        *cache.get_or_init(|| self.probe())
    }

    fn probe_arg(self) -> &'static str {
        match self {
            Tool::Pbzip2 => "-h",
            _ => "--version",
        }
    }

    fn probe(self) -> bool {
        let available = Command::new(self.program())
            .arg(self.probe_arg())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_or(false, |status| status.success());
        debug!(tool = self.program(), available, "probed compressor");
        available
    }

    /// Available tools producing `format`, baseline first.
    pub fn available_for(format: CompressionFormat) -> Vec<Tool> {
        [Tool::Gzip, Tool::Pigz, Tool::Bzip2, Tool::Pbzip2]
            .into_iter()
            .filter(|tool| tool.format() == format)
            .filter(|tool| tool.is_available())
            .collect()
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.program())
    }
}

impl ToolSettings {
    /// Every combination the sweep tries for `tools`, in priority order:
    /// tool, then level, then `-n` on/off, then `--rsyncable` off/on.
    pub fn sweep(tools: &[Tool]) -> Vec<ToolSettings> {
        let mut settings = Vec::new();
        for &tool in tools {
            for level in SWEEP_LEVELS {
                let no_name_options: &[bool] = if tool.supports_no_name() {
                    &[true, false]
                } else {
                    &[false]
                };
                let rsyncable_options: &[bool] = if tool.supports_rsyncable() {
                    &[false, true]
                } else {
                    &[false]
                };
                for &no_name in no_name_options {
                    for &rsyncable in rsyncable_options {
                        settings.push(ToolSettings {
                            tool,
                            level,
                            no_name,
                            rsyncable,
                        });
                    }
                }
            }
        }
        settings
    }

    /// Command-line arguments, writing the compressed `src` to stdout.
    pub fn args(&self, src: &Path) -> Vec<OsString> {
        let mut args = vec![OsString::from(format!("-{}", self.level))];
        if self.no_name {
            args.push(OsString::from("-n"));
        }
        if self.rsyncable {
            args.push(OsString::from("--rsyncable"));
        }
        args.push(OsString::from("-c"));
        args.push(src.as_os_str().to_owned());
        args
    }

    /// Run the tool on `src` and capture what it writes to stdout.
    pub fn run(&self, src: &Path) -> std::result::Result<Vec<u8>, ToolUnavailable> {
        let program = self.tool.program();
        let output = Command::new(program)
            .args(self.args(src))
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map_err(|source| ToolUnavailable::Spawn { program, source })?;

        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(ToolUnavailable::Failed {
                program,
                status: output.status,
            })
        }
    }
}

impl fmt::Display for ToolSettings {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} -{}", self.tool, self.level)?;
        if self.no_name {
            write!(f, " -n")?;
        }
        if self.rsyncable {
            write!(f, " --rsyncable")?;
        }
        Ok(())
    }
}

fn read_source(src: &Path) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    util::open_file(src)?.read_to_end(&mut bytes)?;
    Ok(bytes)
}

// Lazily run each setting, dropping the ones whose tool fails.
fn sweep_candidates<'a, F>(
    src: &'a Path,
    settings: Vec<ToolSettings>,
    finish: F,
) -> impl Iterator<Item = Candidate> + 'a
where
    F: Fn(Vec<u8>) -> Vec<u8> + 'a,
{
    settings
        .into_iter()
        .filter_map(move |settings| match settings.run(src) {
            Ok(data) => Some(Candidate {
                label: settings.to_string(),
                data: finish(data),
            }),
            Err(e) => {
                debug!(candidate = %settings, error = %e, "skipping candidate");
                None
            }
        })
}

/// Return the first candidate whose first `piece_length` bytes hash to `target`.
///
/// Candidates shorter than `piece_length` are skipped. `None` means no
/// candidate reproduces the piece, which is an expected outcome.
pub fn find_matching_candidate<I>(
    candidates: I,
    target: &[u8],
    piece_length: usize,
    algorithm: HashAlgorithm,
) -> Option<Candidate>
where
    I: IntoIterator<Item = Candidate>,
{
    candidates.into_iter().find(|candidate| {
        if candidate.data.len() < piece_length {
            debug!(candidate = %candidate.label, len = candidate.data.len(), "shorter than piece");
            return false;
        }
        let matched = algorithm.digest(&candidate.data[..piece_length]) == target;
        debug!(candidate = %candidate.label, matched, "tried candidate");
        matched
    })
}
