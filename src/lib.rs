//! deltapatch: a VCDIFF (RFC 3284) decoder and game-patch applier.
//!
//! The crate provides:
//! - A pure-Rust VCDIFF decode engine (`vcdiff`) — decode-only, no encoder
//! - High-level streaming decode APIs (`compress`)
//! - File-oriented helpers (`io`)
//! - An orchestrator that locates a source image, fetches patch releases,
//!   reshapes known container formats, and applies a VCDIFF patch (`orchestrator`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```no_run
//! use deltapatch::compress::decoder;
//!
//! let source = b"hello old world";
//! let delta: &[u8] = &[]; // a real VCDIFF stream
//! let decoded = decoder::decode_all(source, delta).unwrap();
//! ```

pub mod compress;
pub mod io;
pub mod orchestrator;
pub mod vcdiff;

#[cfg(feature = "cli")]
pub mod cli;
