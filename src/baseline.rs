// File: baseline.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025
// - The smuggles developers

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::{mpsc, Semaphore};
use url::Url;

use crate::config::Config;
use crate::output::LineSink;
use crate::worker::Worker;

/// Reads the persisted base-time file: a flat JSON object mapping URL
/// strings to durations in nanoseconds. A missing or empty file is an empty
/// map; an unparseable one is fatal.
pub fn load(path: &Path) -> Result<HashMap<String, Duration>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read base file {}", path.display()))
        }
    };
    if bytes.is_empty() {
        return Ok(HashMap::new());
    }

    let raw: HashMap<String, u64> = serde_json::from_slice(&bytes)
        .with_context(|| format!("base file {} is not valid JSON", path.display()))?;
    Ok(raw
        .into_iter()
        .map(|(url, nanos)| (url, Duration::from_nanos(nanos)))
        .collect())
}

/// Rewrites the base-time file atomically: full write to a sibling temp
/// file, then rename over the old one.
pub fn save(path: &Path, base: &HashMap<String, Duration>) -> Result<()> {
    let raw: BTreeMap<&str, u64> = base
        .iter()
        .map(|(url, time)| (url.as_str(), time.as_nanos() as u64))
        .collect();
    let json = serde_json::to_vec(&raw).context("failed to serialize base times")?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);

    std::fs::write(&tmp, &json)
        .with_context(|| format!("failed to write base file {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to replace base file {}", path.display()))?;
    Ok(())
}

/// Phase 1: probes every URL that has no persisted base time, one
/// well-formed request each, and merges the measurements into the map.
/// Errors skip the URL; those targets see no phase-2 tests.
pub async fn collect(
    urls: &[Url],
    mut base: HashMap<String, Duration>,
    config: Arc<Config>,
    errors: Arc<LineSink>,
) -> HashMap<String, Duration> {
    let mut seen = HashSet::new();
    let missing: Vec<Url> = urls
        .iter()
        .filter(|u| !base.contains_key(u.as_str()) && seen.insert(u.as_str().to_string()))
        .cloned()
        .collect();
    if missing.is_empty() {
        return base;
    }

    let (err_tx, mut err_rx) = mpsc::channel::<String>(config.workers);
    let err_task = tokio::spawn(async move {
        while let Some(msg) = err_rx.recv().await {
            errors.writeln(&format!("ERROR: {}", msg));
        }
    });

    let worker = Arc::new(Worker::new(config.clone(), err_tx));
    let semaphore = Arc::new(Semaphore::new(config.workers));
    let (res_tx, mut res_rx) = mpsc::channel::<(Url, Duration)>(config.workers);

    let dispatcher = {
        let config = config.clone();
        let worker = worker.clone();
        tokio::spawn(async move {
            let bar = config.show_progress.then(|| {
                let bar = ProgressBar::new(missing.len() as u64);
                bar.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>7}/{len:7} {msg}")
                        .unwrap()
                        .progress_chars("##-"),
                );
                bar
            });

            for url in missing {
                let permit = match semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                if let Some(bar) = &bar {
                    bar.inc(1);
                }
                let worker = worker.clone();
                let tx = res_tx.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    if let Some(time) = worker.base_time(&url).await {
                        let _ = tx.send((url, time)).await;
                    }
                });
            }

            if let Some(bar) = bar {
                bar.finish();
            }
        })
    };

    while let Some((url, time)) = res_rx.recv().await {
        if config.verbose {
            println!("{} {}", url, time.as_nanos());
        }
        base.insert(url.as_str().to_string(), time);
    }

    let _ = dispatcher.await;
    drop(worker);
    let _ = err_task.await;
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_an_empty_map() {
        let dir = tempfile::tempdir().unwrap();
        let base = load(&dir.path().join("absent.base")).unwrap();
        assert!(base.is_empty());
    }

    #[test]
    fn roundtrip_preserves_durations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("smuggles.base");

        let mut base = HashMap::new();
        base.insert(
            "https://a.example/".to_string(),
            Duration::from_nanos(123_456_789),
        );
        base.insert("http://b.example/".to_string(), Duration::from_millis(50));

        save(&path, &base).unwrap();
        assert_eq!(load(&path).unwrap(), base);

        // the on-disk form stays a flat JSON object of integers
        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["https://a.example/"], 123_456_789u64);
    }

    #[test]
    fn garbage_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("smuggles.base");
        std::fs::write(&path, b"not json at all").unwrap();
        assert!(load(&path).is_err());
    }

    #[test]
    fn save_replaces_not_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("smuggles.base");

        let mut base = HashMap::new();
        base.insert("http://a.example/".to_string(), Duration::from_millis(10));
        save(&path, &base).unwrap();

        base.insert("http://b.example/".to_string(), Duration::from_millis(20));
        save(&path, &base).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
    }
}
