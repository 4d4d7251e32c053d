//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

use std::{env, io};

use eyre::WrapErr;
use structured_logger::{Builder, json::new_writer};

const LOG_LEVEL_ENV: &str = "OSMLITE_LOG";
const DEFAULT_LOG_LEVEL: &str = "info";

fn main() -> eyre::Result<()> {
    let level = env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_owned());
    Builder::with_level(&level)
        .with_target_writer("*", new_writer(io::stderr()))
        .init();

    osmlite_cli::run().wrap_err("osmlite failed")
}
