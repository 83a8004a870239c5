// File: engine.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025
// - The smuggles developers

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tokio::sync::{mpsc, RwLock, Semaphore};
use url::Url;

use crate::config::Config;
use crate::output::LineSink;
use crate::worker::Worker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestStatus {
    Safe,
    Clte,
    Tecl,
    Error,
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TestStatus::Safe => "SAFE",
            TestStatus::Clte => "CL.TE",
            TestStatus::Tecl => "TE.CL",
            TestStatus::Error => "ERROR",
        };
        write!(f, "{}", s)
    }
}

/// One (url, method, mutation) probe pair. `timeout` is the target's base
/// time plus the configured delay; crossing it is the vulnerability signal.
#[derive(Debug, Clone)]
pub struct SmuggleTest {
    pub url: Url,
    pub method: String,
    pub mutation: String,
    pub timeout: Duration,
    pub status: TestStatus,
}

/// Cartesian product of URLs-with-baseline, methods and enabled mutations.
/// URLs without a base time are left out entirely.
pub fn build_tests(
    urls: &[Url],
    base: &HashMap<String, Duration>,
    config: &Config,
) -> Vec<SmuggleTest> {
    let mut tests = Vec::new();
    for url in urls {
        let Some(base_time) = base.get(url.as_str()) else {
            continue;
        };
        let timeout = *base_time + config.delay;
        for mutation in config.mutations.keys() {
            for method in &config.methods {
                tests.push(SmuggleTest {
                    url: url.clone(),
                    method: method.clone(),
                    mutation: mutation.clone(),
                    timeout,
                    status: TestStatus::Safe,
                });
            }
        }
    }
    tests
}

pub struct Engine {
    config: Arc<Config>,
    findings: Arc<LineSink>,
    errors: Arc<LineSink>,
}

impl Engine {
    pub fn new(config: Arc<Config>, findings: Arc<LineSink>, errors: Arc<LineSink>) -> Self {
        Engine {
            config,
            findings,
            errors,
        }
    }

    /// Runs the full matrix: shuffles, dispatches onto at most
    /// `config.workers` in-flight probes, gates per host on the
    /// vulnerability counter, and serializes findings as they come back.
    /// Returns the number of findings written.
    pub async fn run(&self, mut tests: Vec<SmuggleTest>, rng: &mut StdRng) -> u64 {
        tests.shuffle(rng);

        let (err_tx, mut err_rx) = mpsc::channel::<String>(self.config.workers);
        let err_sink = self.errors.clone();
        let err_task = tokio::spawn(async move {
            while let Some(msg) = err_rx.recv().await {
                err_sink.writeln(&format!("ERROR: {}", msg));
            }
        });

        let worker = Arc::new(Worker::new(self.config.clone(), err_tx));
        let vulns: Arc<RwLock<HashMap<String, u64>>> = Arc::new(RwLock::new(HashMap::new()));
        let semaphore = Arc::new(Semaphore::new(self.config.workers));
        let (res_tx, mut res_rx) = mpsc::channel::<SmuggleTest>(self.config.workers);

        let dispatcher = {
            let config = self.config.clone();
            let worker = worker.clone();
            let vulns = vulns.clone();
            tokio::spawn(async move {
                let bar = config.show_progress.then(|| {
                    let bar = ProgressBar::new(tests.len() as u64);
                    bar.set_style(
                        ProgressStyle::default_bar()
                            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>7}/{len:7} {msg}")
                            .unwrap()
                            .progress_chars("##-"),
                    );
                    bar
                });

                for test in tests {
                    // Back-pressure: at most `workers` probes in flight.
                    let permit = match semaphore.clone().acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => break,
                    };

                    if let Some(bar) = &bar {
                        bar.inc(1);
                    }

                    if config.stop_after > 0 {
                        let counts = vulns.read().await;
                        let found = counts.get(test.url.as_str()).copied().unwrap_or(0);
                        if found >= config.stop_after {
                            continue;
                        }
                    }

                    if config.verbose {
                        println!("Testing: {} {} {}", test.method, test.url, test.mutation);
                    }

                    let worker = worker.clone();
                    let tx = res_tx.clone();
                    let vulns = vulns.clone();
                    let stop_after = config.stop_after;
                    tokio::spawn(async move {
                        let done = worker.smuggle_test(test).await;
                        // The increment lands before the permit frees up,
                        // so the dispatch gate never reads a stale count
                        // for a slot this test vacates.
                        if stop_after > 0
                            && matches!(done.status, TestStatus::Clte | TestStatus::Tecl)
                        {
                            let mut counts = vulns.write().await;
                            *counts.entry(done.url.as_str().to_string()).or_insert(0) += 1;
                        }
                        drop(permit);
                        let _ = tx.send(done).await;
                    });
                }

                if let Some(bar) = bar {
                    bar.finish();
                }
                // res_tx drops here; the consumer ends once every in-flight
                // clone is gone.
            })
        };

        let mut found = 0u64;
        while let Some(test) = res_rx.recv().await {
            match test.status {
                TestStatus::Clte | TestStatus::Tecl => {
                    self.findings.writeln(&format!(
                        "{} {} {} {}",
                        test.method, test.url, test.status, test.mutation
                    ));
                    found += 1;
                }
                TestStatus::Safe | TestStatus::Error => {}
            }
        }

        let _ = dispatcher.await;
        drop(worker);
        let _ = err_task.await;
        found
    }
}
