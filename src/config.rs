// File: config.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025
// - The smuggles developers

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;

use crate::cli::Cli;
use crate::mutation;

const DEFAULT_BASE_FILE: &str = "smuggles.base";
const DEFAULT_OUT_FILE: &str = "smuggles.log";
const DEFAULT_ERR_FILE: &str = "smuggles.errors";

/// Resolved scan configuration, shared read-only across workers.
#[derive(Debug, Clone)]
pub struct Config {
    pub workers: usize,
    pub methods: Vec<String>,
    pub delay: Duration,
    pub mutations: BTreeMap<String, String>,
    pub stop_after: u64,
    pub show_progress: bool,
    pub verbose: bool,
    pub debug: bool,
    pub out_file: Option<PathBuf>,
    pub base_file: PathBuf,
    pub err_file: Option<PathBuf>,
    pub seed: Option<u64>,
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let all = mutation::generate();
        let mutations = filter_mutations(all, &cli.enable, &cli.disable)?;

        let mut out_file = cli.output.clone();
        let mut base_file = cli.base.clone();
        let mut err_file = cli.error_log.clone();
        if let Some(dir) = &cli.dir {
            out_file = out_file.or_else(|| Some(dir.join(DEFAULT_OUT_FILE)));
            base_file = base_file.or_else(|| Some(dir.join(DEFAULT_BASE_FILE)));
            err_file = err_file.or_else(|| Some(dir.join(DEFAULT_ERR_FILE)));
        }

        Ok(Config {
            workers: cli.workers.max(1),
            methods: cli.methods.iter().map(|m| m.to_uppercase()).collect(),
            delay: Duration::from_secs(cli.delay),
            mutations,
            stop_after: cli.stop_after,
            show_progress: cli.progress,
            verbose: cli.verbose,
            debug: cli.debug,
            out_file,
            base_file: base_file.unwrap_or_else(|| PathBuf::from(DEFAULT_BASE_FILE)),
            err_file,
            seed: cli.seed,
        })
    }
}

/// Applies enable/disable glob filters to the mutation set. An empty enable
/// list means everything is in; disable wins when both match.
pub fn filter_mutations(
    all: BTreeMap<String, String>,
    enable: &[String],
    disable: &[String],
) -> Result<BTreeMap<String, String>> {
    let enabled = compile_globs(enable)?;
    let disabled = compile_globs(disable)?;

    Ok(all
        .into_iter()
        .filter(|(name, _)| {
            let included = enabled.is_empty() || enabled.iter().any(|re| re.is_match(name));
            included && !disabled.iter().any(|re| re.is_match(name))
        })
        .collect())
}

fn compile_globs(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns.iter().map(|p| glob_to_regex(p)).collect()
}

// `*` and `?` wildcards, everything else literal.
fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');
    for c in pattern.chars() {
        match c {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            c => expr.push_str(&regex::escape(&c.to_string())),
        }
    }
    expr.push('$');
    Regex::new(&expr).with_context(|| format!("invalid filter glob: {}", pattern))
}
