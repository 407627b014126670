// vbconv-cli/src/main.rs
//
// Entry point for the vbconv binary: parses the command line, dispatches to
// the command implementations and turns their results into exit codes.
//
// Exit codes:
// - 0: success
// - 1: fatal error, or a batch in which at least one file failed
// - 2: invalid command line (reported by clap)
// - 130: the batch was stopped with Ctrl-C

use clap::Parser;
use std::process;
use vbconv_cli::output::print_error;
use vbconv_cli::{run_encode, run_info, run_presets, Cli, Commands};

const EXIT_FAILURE: i32 = 1;
const EXIT_INTERRUPTED: i32 = 130;

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Encode(args) => run_encode(args, cli.verbose, cli.log_level).map(|summary| {
            if summary.stopped {
                EXIT_INTERRUPTED
            } else if summary.has_failures() {
                EXIT_FAILURE
            } else {
                0
            }
        }),
        Commands::Info(args) => run_info(args).map(|()| 0),
        Commands::Presets => {
            run_presets();
            Ok(0)
        }
    };

    match result {
        Ok(0) => {}
        Ok(code) => process::exit(code),
        Err(e) => {
            log::error!("{e}");
            print_error(&e.to_string());
            process::exit(EXIT_FAILURE);
        }
    }
}
