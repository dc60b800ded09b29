//! btrfstxn CLI entry point
//!
//! Parses args, dispatches to the CLI commands, and reports failures as a
//! single JSON error line with a non-zero exit.

use std::process;

use btrfstxn::cli::{run_command, Cli};

fn main() {
    let cli = Cli::parse_args();

    if let Err(e) = run_command(cli.command) {
        let error_json = serde_json::json!({
            "status": "error",
            "code": e.code_str(),
            "message": e.to_string(),
        });

        eprintln!("{}", error_json);
        process::exit(1);
    }
}
