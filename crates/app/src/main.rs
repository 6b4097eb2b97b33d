//! `metis` binary.

mod cli;

use clap::Parser;

use crate::cli::Cli;

fn main() -> eyre::Result<()> {
    Cli::parse().run()
}
