// File-level I/O helpers for applying a VCDIFF patch.
//
// Provides `apply_patch()`, a convenience function that wraps the streaming
// decode pipeline with proper buffered I/O. Optionally computes a streaming
// SHA-256 checksum of the reconstructed output (feature-gated behind
// `file-io`).

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

#[cfg(feature = "file-io")]
use sha2::Digest;

use crate::compress::decoder::DeltaDecoder;
use crate::vcdiff::decoder::DecodeError;

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by [`apply_patch`].
#[derive(Debug, Clone)]
pub struct ApplyStats {
    /// Source file size in bytes.
    pub source_size: u64,
    /// Patch file size in bytes.
    pub patch_size: u64,
    /// Reconstructed output size in bytes.
    pub output_size: u64,
    /// Number of VCDIFF windows decoded.
    pub windows: u64,
    /// SHA-256 of the reconstructed output (if `file-io` feature is enabled).
    pub output_sha256: Option<[u8; 32]>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for file I/O operations.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
}

// ---------------------------------------------------------------------------
// Default buffer size
// ---------------------------------------------------------------------------

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// apply_patch
// ---------------------------------------------------------------------------

/// Apply a VCDIFF patch to a source file, writing the reconstructed image to
/// `output_path`.
///
/// The source is read fully into memory, since COPY instructions may
/// reference any offset within it. The patch is streamed via `BufReader`.
/// The output uses `BufWriter`.
///
/// When the `file-io` feature is enabled, a SHA-256 checksum of the output is
/// computed incrementally as it is written.
pub fn apply_patch(
    source_path: &Path,
    patch_path: &Path,
    output_path: &Path,
) -> Result<ApplyStats, IoError> {
    let source = std::fs::read(source_path)?;
    let source_size = source.len() as u64;

    let patch_file = File::open(patch_path)?;
    let patch_size = patch_file.metadata()?.len();
    let patch_reader = BufReader::with_capacity(BUF_SIZE, patch_file);

    let output_file = File::create(output_path)?;
    let mut output_writer = BufWriter::with_capacity(BUF_SIZE, output_file);

    let mut decoder = DeltaDecoder::new(patch_reader);
    let mut src: &[u8] = &source;

    log::debug!(
        "applying patch {:?} ({patch_size} bytes) to source {:?} ({source_size} bytes)",
        patch_path,
        source_path
    );

    #[cfg(feature = "file-io")]
    let mut output_hasher = sha2::Sha256::new();

    #[cfg(feature = "file-io")]
    let output_size = {
        let mut hashing_writer = HashingWriter {
            inner: &mut output_writer,
            hasher: &mut output_hasher,
        };
        decoder.decode_to(&mut src, &mut hashing_writer)?
    };

    #[cfg(not(feature = "file-io"))]
    let output_size = decoder.decode_to(&mut src, &mut output_writer)?;

    let windows = decoder.windows_decoded();

    output_writer.flush()?;

    #[cfg(feature = "file-io")]
    let output_sha256 = Some(output_hasher.finalize().into());
    #[cfg(not(feature = "file-io"))]
    let output_sha256: Option<[u8; 32]> = None;

    log::info!("applied patch: {windows} windows, {output_size} bytes written");

    Ok(ApplyStats {
        source_size,
        patch_size,
        output_size,
        windows,
        output_sha256,
    })
}

// ---------------------------------------------------------------------------
// Hashing writer (used with file-io feature)
// ---------------------------------------------------------------------------

#[cfg(feature = "file-io")]
struct HashingWriter<'a, W: Write> {
    inner: &'a mut W,
    hasher: &'a mut sha2::Sha256,
}

#[cfg(feature = "file-io")]
impl<W: Write> Write for HashingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
