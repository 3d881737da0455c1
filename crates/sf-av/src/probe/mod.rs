//! Duration probe backends that shell out to external tools.
//!
//! [`FfprobeProbe`] implements the [`sf_core::DurationProbe`] trait so the
//! orchestrator can read a file's timeline length without knowing which tool
//! does the work.

pub mod ffprobe;

pub use self::ffprobe::FfprobeProbe;
