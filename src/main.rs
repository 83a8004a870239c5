// File: main.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025
// - The smuggles developers

use std::io::{self, BufRead};
use std::process::exit;
use std::sync::Arc;

use anyhow::{Context, Result};
use atty::Stream;
use clap::Parser;
use log::LevelFilter;
use rand::rngs::StdRng;
use rand::SeedableRng;
use url::Url;

use smuggles::baseline;
use smuggles::cli::Cli;
use smuggles::config::Config;
use smuggles::engine::{self, Engine};
use smuggles::output;
use smuggles::poc;

fn init_logging(cli: &Cli) {
    let level = if cli.debug {
        LevelFilter::Debug
    } else if cli.verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

/// Handles the modes that never scan. Returns true when the process should
/// stop after them.
fn early_exit(cli: &Cli, config: &Config) -> Result<bool> {
    if cli.list {
        for name in config.mutations.keys() {
            println!("{}", name);
        }
        return Ok(true);
    }

    if let Some(name) = &cli.mutation {
        match config.mutations.get(name) {
            Some(header) => println!("{}", header),
            None => {
                eprintln!("Mutation not found");
                exit(1);
            }
        }
        return Ok(true);
    }

    if cli.poc || cli.script.is_some() {
        if cli.args.len() != 4 {
            eprintln!("Positional arguments should be: <method> <url> <desync type> <mutation name>");
            eprintln!("e.g.: smuggles --poc GET https://example.com CL.TE lineprefix-space");
            exit(1);
        }
        let finding = match poc::parse_finding(&cli.args) {
            Ok(finding) => finding,
            Err(e) => {
                eprintln!("Couldn't parse finding: {}", e);
                exit(1);
            }
        };

        if let Some(script_file) = &cli.script {
            let template = std::fs::read_to_string(script_file).with_context(|| {
                format!("failed to read script base {}", script_file.display())
            })?;
            print!(
                "{}",
                poc::generate_script(&template, &config.mutations, &finding)?
            );
        } else {
            print!("{}", poc::generate_poc(&config.mutations, &finding)?);
        }
        return Ok(true);
    }

    Ok(false)
}

fn read_urls(errors: &output::LineSink) -> Result<Vec<Url>> {
    let mut urls = Vec::new();
    for line in io::stdin().lock().lines() {
        let line = line.context("failed to read from stdin")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match Url::parse(line) {
            Ok(url) => urls.push(url),
            Err(e) => errors.writeln(&format!("ERROR: {}: {}", line, e)),
        }
    }
    Ok(urls)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let config = Arc::new(Config::from_cli(&cli)?);
    if early_exit(&cli, &config)? {
        return Ok(());
    }

    if atty::is(Stream::Stdin) {
        eprintln!("Usage: cat urls.txt | smuggles [options]");
        eprintln!("Expecting newline-delimited URLs on stdin; see --help.");
        exit(1);
    }

    let findings = Arc::new(output::findings_sink(&config)?);
    let errors = Arc::new(output::error_sink(&config)?);

    // Fatal before any probe goes out: a corrupt base file must not be
    // silently replaced.
    let base = baseline::load(&config.base_file)?;

    let urls = read_urls(&errors)?;

    println!("Getting missing base times...");
    let base = baseline::collect(&urls, base, config.clone(), errors.clone()).await;
    if let Err(e) = baseline::save(&config.base_file, &base) {
        errors.writeln(&format!("ERROR: {}", e));
    }

    println!("Testing smuggling...");
    let tests = engine::build_tests(&urls, &base, &config);
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let engine = Engine::new(config.clone(), findings, errors);
    engine.run(tests, &mut rng).await;

    Ok(())
}
