// Streaming decode pipeline built on top of the core VCDIFF decoder.
//
// - `decoder` — DeltaDecoder: streaming decode with progress tracking

pub mod decoder;

pub use decoder::DeltaDecoder;
