//! Command implementations for the CLI.
//!
//! Each submodule contains the implementation of a specific command.

/// Batch conversion of video files.
pub mod encode;
/// Stream details for individual files.
pub mod info;
pub mod presets;
