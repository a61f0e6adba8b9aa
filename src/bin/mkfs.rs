//! `mkfs`: formats a new pool (component P, SPEC_FULL.md §6).
//!
//! Built on `clap`'s derive API; `-v` raises the log verbosity by one level
//! per occurrence, a leveled tracing style brought over to a host binary via
//! `env_logger`.

use std::process::ExitCode;

use clap::Parser;

#[derive(Parser)]
#[command(name = "mkfs", about = "Format an empty pmemfs pool")]
struct Args {
    /// Increase log verbosity (repeatable).
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Pool size in bytes.
    size: u64,

    /// Path to the new pool file.
    path: String,
}

fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(level_for(args.verbose)),
    )
    .init();

    match pmemfs::Pool::format(args.size, pmemfs::Config::default()) {
        Ok(pool) => {
            let stats = pool.stats();
            log::info!(
                "mkfs: wrote pool {} ({} bytes) with {} inode(s)",
                args.path,
                args.size,
                stats.inodes
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("mkfs: failed to format {}: {e}", args.path);
            ExitCode::from(1)
        }
    }
}
