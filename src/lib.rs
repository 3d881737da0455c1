//! Splitforge - split media files into parts
//!
//! This library crate exposes the CLI's building blocks for integration testing.

pub mod config;
pub mod duration;
pub mod output;
pub mod progress;

/// Process exit status for `err`: the mapped code of the first
/// [`sf_core::Error`] in its chain, or 1.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<sf_core::Error>())
        .map(sf_core::Error::exit_code)
        .unwrap_or(1)
}
