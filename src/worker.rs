// File: worker.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025
// - The smuggles developers

use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::sync::mpsc;
use url::Url;

use crate::config::Config;
use crate::engine::{SmuggleTest, TestStatus};
use crate::probe;
use crate::rawhttp::{ClientError, RawClient, RawSample, Target};

/// Executes probes. Stateless between tests apart from the configuration;
/// transport errors go out on the dedicated error channel.
pub struct Worker {
    config: Arc<Config>,
    client: RawClient,
    errs: mpsc::Sender<String>,
}

impl Worker {
    pub fn new(config: Arc<Config>, errs: mpsc::Sender<String>) -> Self {
        Worker {
            config,
            client: RawClient::new(),
            errs,
        }
    }

    /// Measures one well-formed round trip. Returns None after reporting
    /// when the target cannot produce a usable base time.
    pub async fn base_time(&self, url: &Url) -> Option<Duration> {
        let target = match Target::from_url(url) {
            Ok(target) => target,
            Err(e) => {
                self.report(format!("{}: {}", url, e)).await;
                return None;
            }
        };

        let request = probe::baseline(&target);
        match self.send(&target, request, self.config.delay).await {
            Ok(sample) if sample.timed_out => {
                self.report(format!("{}: base request timed out", url)).await;
                None
            }
            Ok(sample) => {
                debug!("base {} {}ms", url, sample.elapsed.as_millis());
                Some(sample.elapsed)
            }
            Err(e) => {
                self.report(format!("{}: {}", url, e)).await;
                None
            }
        }
    }

    /// Runs the CL.TE probe, then the TE.CL probe, each over a fresh
    /// connection. The first timing positive classifies the test and skips
    /// the remaining probe.
    pub async fn smuggle_test(&self, mut test: SmuggleTest) -> SmuggleTest {
        let Some(header) = self.config.mutations.get(&test.mutation).cloned() else {
            return test;
        };
        let target = match Target::from_url(&test.url) {
            Ok(target) => target,
            Err(e) => {
                self.report(format!("{} {}: {}", test.method, test.url, e))
                    .await;
                test.status = TestStatus::Error;
                return test;
            }
        };

        let request = probe::clte(&test.method, &target, &header);
        match self.send(&target, request, test.timeout).await {
            Ok(sample) => {
                debug!(
                    "{} {} {} clte {}ms",
                    test.method,
                    test.url,
                    test.mutation,
                    sample.elapsed.as_millis()
                );
                if positive(&sample, test.timeout) {
                    test.status = TestStatus::Clte;
                    return test;
                }
            }
            Err(e) => {
                self.report(format!(
                    "{} {} {}: {}",
                    test.method, test.url, test.mutation, e
                ))
                .await;
                test.status = TestStatus::Error;
                return test;
            }
        }

        let request = probe::tecl(&test.method, &target, &header);
        match self.send(&target, request, test.timeout).await {
            Ok(sample) => {
                debug!(
                    "{} {} {} tecl {}ms",
                    test.method,
                    test.url,
                    test.mutation,
                    sample.elapsed.as_millis()
                );
                if positive(&sample, test.timeout) {
                    test.status = TestStatus::Tecl;
                }
            }
            Err(e) => {
                self.report(format!(
                    "{} {} {}: {}",
                    test.method, test.url, test.mutation, e
                ))
                .await;
                test.status = TestStatus::Error;
            }
        }

        test
    }

    // Blocking socket I/O on its own OS thread keeps the scheduler out of
    // the write-to-read window.
    async fn send(
        &self,
        target: &Target,
        request: String,
        timeout: Duration,
    ) -> Result<RawSample, ClientError> {
        let client = self.client.clone();
        let target = target.clone();
        match tokio::task::spawn_blocking(move || client.send(&target, request.as_bytes(), timeout))
            .await
        {
            Ok(result) => result,
            Err(e) => Err(ClientError::Task(e.to_string())),
        }
    }

    async fn report(&self, msg: String) {
        let _ = self.errs.send(msg).await;
    }
}

fn positive(sample: &RawSample, timeout: Duration) -> bool {
    sample.timed_out || sample.elapsed >= timeout
}
