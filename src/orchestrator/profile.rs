// Source image identification.
//
// Recognizes a candidate disc image by a short magic prefix, then hashes the
// full file with CRC-32 and matches it against a small fixed table of known
// profiles. An image that doesn't match any known profile is refused before
// any patching is attempted.

use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use crate::orchestrator::reshape::ContainerFormat;

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("file does not match any known source image profile")]
    Unrecognized,
}

/// A known-good source image: its container format, a content checksum to
/// validate against, and a human-readable note on provenance.
#[derive(Debug, Clone, Copy)]
pub struct ImageProfile {
    /// Six-byte magic prefix identifying the game disc.
    pub magic: &'static [u8],
    /// CRC-32 (IEEE) of the full file, as lowercase hex.
    pub crc32_hex: &'static str,
    /// Container format the catalog's patches are built against.
    pub format: ContainerFormat,
    /// Notes carried over from the original tool about this specific dump.
    pub note: &'static str,
}

/// Fixed table of recognized source images.
///
/// `55ee8b1a` is the hash of the "bad" dump: it pads with zeroes instead of
/// random bytes, which compresses far better than the pristine `60aefa3e`
/// dump. The original tool deliberately targets the bad dump for this
/// reason, and this table preserves that choice rather than the "better"
/// one.
pub const KNOWN_PROFILES: &[ImageProfile] = &[ImageProfile {
    magic: b"G4NJDA",
    crc32_hex: "55ee8b1a",
    format: ContainerFormat::Iso,
    note: "bad dump (zero-padded); preferred over the pristine 60aefa3e dump for compressibility",
}];

/// Read the magic prefix and CRC-32 of `path` and match it against
/// [`KNOWN_PROFILES`].
///
/// `candidate_format` should reflect how the file was obtained (a `.ciso` or
/// `.nkit.iso` extension implies its format before reshaping); the returned
/// profile's `format` field still describes the canonical post-reshape
/// target, so callers check it against `candidate_format` to decide whether
/// a [`crate::orchestrator::reshape`] pass is needed.
pub fn identify_image(path: &Path) -> Result<ImageProfile, ProfileError> {
    let mut file = File::open(path)?;
    let mut magic = [0u8; 6];
    let read = file.read(&mut magic)?;
    if read < magic.len() {
        return Err(ProfileError::Unrecognized);
    }

    let matching_magic: Vec<&ImageProfile> = KNOWN_PROFILES
        .iter()
        .filter(|p| p.magic == magic)
        .collect();
    if matching_magic.is_empty() {
        return Err(ProfileError::Unrecognized);
    }

    let mut hasher = crc32fast::Hasher::new();
    file.rewind()?;
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let digest = hasher.finalize();
    let hex = format!("{digest:08x}");

    matching_magic
        .into_iter()
        .find(|p| p.crc32_hex == hex)
        .copied()
        .ok_or(ProfileError::Unrecognized)
}
