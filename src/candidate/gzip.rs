use super::{read_source, sweep_candidates, Candidate, Tool, ToolSettings, HEADER_MATCH_LABEL};
use crate::header::{CompressionFormat, GzipHeader};
use crate::{RecoveryError, Result};
use flate2::{Compression, GzBuilder};
use std::io::{self, Write};
use std::path::Path;

/// Gzip `data` in-process with zlib at the best level, stamping `mtime` and no file name.
pub fn compress_with_mtime(data: &[u8], mtime: u32) -> io::Result<Vec<u8>> {
    let mut encoder = GzBuilder::new()
        .mtime(mtime)
        .write(Vec::new(), Compression::best());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Gzip candidates for the raw file `src`, most likely first.
///
/// With a captured `header`, the in-process compressor runs first and every
/// candidate is patched to carry that header. External tools run lazily as
/// the returned iterator is advanced.
///
/// Fails with `NotFound` if `src` does not exist.
pub fn generate_gzip_candidates<'a>(
    src: &'a Path,
    header: Option<&GzipHeader>,
) -> Result<impl Iterator<Item = Candidate> + 'a> {
    if !src.is_file() {
        return Err(RecoveryError::NotFound(src.to_path_buf()));
    }

    let header_match = match header {
        Some(header) => {
            let data = compress_with_mtime(&read_source(src)?, header.mtime)?;
            Some(Candidate {
                label: HEADER_MATCH_LABEL.to_owned(),
                data: header.patch(&data),
            })
        }
        None => None,
    };

    let header = header.cloned();
    let settings = ToolSettings::sweep(&Tool::available_for(CompressionFormat::Gzip));
    let sweep = sweep_candidates(src, settings, move |data| match header.as_ref() {
        Some(header) => header.patch(&data),
        None => data,
    });

    Ok(header_match.into_iter().chain(sweep))
}
