// File: cli.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025
// - The smuggles developers

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = env!("CARGO_PKG_DESCRIPTION"),
)]
pub struct Cli {
    #[arg(
        short = 'c',
        long = "workers",
        default_value_t = 10,
        help = "Number of concurrent workers"
    )]
    pub workers: usize,

    #[arg(
        short = 'm',
        long = "methods",
        value_delimiter = ',',
        default_value = "GET,POST,PUT,DELETE",
        help = "HTTP methods to test"
    )]
    pub methods: Vec<String>,

    #[arg(
        long = "delay",
        default_value_t = 5,
        help = "Extra seconds on top of the base time that indicate a desync"
    )]
    pub delay: u64,

    #[arg(
        short = 'e',
        long = "enable",
        value_delimiter = ',',
        help = "Globs of mutation names to enable"
    )]
    pub enable: Vec<String>,

    #[arg(
        short = 'd',
        long = "disable",
        value_delimiter = ',',
        help = "Globs of mutation names to disable (wins over --enable)"
    )]
    pub disable: Vec<String>,

    #[arg(
        short = 'x',
        long = "stop-after",
        default_value_t = 0,
        help = "Findings per host before that host stops being tested; queued tests still finish, so slightly more may be reported. 0 means unlimited"
    )]
    pub stop_after: u64,

    #[arg(
        short = 'p',
        long = "progress",
        help = "Show a progress bar instead of writing findings to stdout"
    )]
    pub progress: bool,

    #[arg(short = 'v', long = "verbose", help = "Print scanned hosts to stdout")]
    pub verbose: bool,

    #[arg(long = "debug", help = "Log the timing of every probe")]
    pub debug: bool,

    #[arg(short = 'o', long = "output", help = "Findings log file")]
    pub output: Option<PathBuf>,

    #[arg(
        short = 'b',
        long = "base",
        help = "Base-time file to reuse between runs (default \"smuggles.base\")"
    )]
    pub base: Option<PathBuf>,

    #[arg(long = "error-log", help = "File to log errors to")]
    pub error_log: Option<PathBuf>,

    #[arg(
        short = 'O',
        long = "dir",
        help = "Directory supplying defaults for the findings log, error log and base file"
    )]
    pub dir: Option<PathBuf>,

    #[arg(long = "seed", help = "Fixed RNG seed for a reproducible test order")]
    pub seed: Option<u64>,

    #[arg(
        short = 'l',
        long = "list",
        help = "List the enabled mutation names and exit"
    )]
    pub list: bool,

    #[arg(
        long = "mutation",
        value_name = "NAME",
        help = "Print the named Transfer-Encoding mutation and exit"
    )]
    pub mutation: Option<String>,

    #[arg(
        long = "poc",
        help = "Generate a PoC from a findings-log line given as <method> <url> <status> <mutation> and exit"
    )]
    pub poc: bool,

    #[arg(
        long = "script",
        value_name = "FILE",
        help = "Generate a Turbo Intruder script from the given base file and a findings-log line given as <method> <url> <status> <mutation>"
    )]
    pub script: Option<PathBuf>,

    #[arg(value_name = "ARGS", help = "Positional arguments for --poc/--script")]
    pub args: Vec<String>,
}
