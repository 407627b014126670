// vbconv-cli/src/lib.rs
//
// Library portion of the vbconv CLI application.
// Contains argument definitions and command logic.

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;

// Re-export items needed by the binary or integration tests
pub use cli::{Cli, Commands, EncodeArgs, InfoArgs};
pub use commands::encode::run_encode;
pub use commands::info::run_info;
pub use commands::presets::run_presets;
