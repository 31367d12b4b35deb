use super::{read_source, sweep_candidates, Candidate, Tool, ToolSettings, HEADER_MATCH_LABEL};
use crate::header::{Bzip2Header, CompressionFormat};
use crate::{RecoveryError, Result};
use bzip2::write::BzEncoder;
use bzip2::Compression;
use std::io::{self, Write};
use std::path::Path;

/// Bzip2 `data` in-process at `level` (1 to 9).
pub fn compress_at_level(data: &[u8], level: u8) -> io::Result<Vec<u8>> {
    let mut encoder = BzEncoder::new(Vec::new(), Compression::new(u32::from(level)));
    encoder.write_all(data)?;
    encoder.finish()
}

/// Bzip2 candidates for the raw file `src`, most likely first.
///
/// With a captured `header`, the in-process compressor runs first at the
/// captured level. External tools run lazily as the iterator is advanced.
///
/// Fails with `NotFound` if `src` does not exist.
pub fn generate_bzip2_candidates<'a>(
    src: &'a Path,
    header: Option<&Bzip2Header>,
) -> Result<impl Iterator<Item = Candidate> + 'a> {
    if !src.is_file() {
        return Err(RecoveryError::NotFound(src.to_path_buf()));
    }

    let header_match = match header {
        Some(header) => Some(Candidate {
            label: HEADER_MATCH_LABEL.to_owned(),
            data: compress_at_level(&read_source(src)?, header.level)?,
        }),
        None => None,
    };

    let header = header.copied();
    let settings = ToolSettings::sweep(&Tool::available_for(CompressionFormat::Bzip2));
    let sweep = sweep_candidates(src, settings, move |data| match header {
        Some(header) => header.patch(&data),
        None => data,
    });

    Ok(header_match.into_iter().chain(sweep))
}
