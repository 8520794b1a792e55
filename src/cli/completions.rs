//! Completions command implementation

use crate::cli::{Cli, CompletionsArgs};
use clap::CommandFactory;
use clap_complete::{generate, Shell};
use std::io::{self, Write};

fn write_completions(shell: Shell, out: &mut dyn Write) {
    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, out);
}

/// Handle `fleetdeck completions` command
pub fn handle_completions(args: &CompletionsArgs) {
    write_completions(args.shell, &mut io::stdout());
}
