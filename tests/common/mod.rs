// File: common/mod.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025
// - The smuggles developers

use std::collections::BTreeMap;
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;

use smuggles::config::Config;

/// Trailing bytes of the CL.TE probe body.
pub const CLTE_TAIL: &[u8] = b"1\r\nA\r\nX";
/// Trailing bytes of the TE.CL probe body.
pub const TECL_TAIL: &[u8] = b"0\r\n\r\nX";

pub struct FakeServer {
    pub addr: SocketAddr,
    connections: Arc<AtomicUsize>,
}

impl FakeServer {
    pub fn url(&self) -> Url {
        Url::parse(&format!("http://{}/", self.addr)).unwrap()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

/// Raw TCP server that answers 200 immediately, except when the received
/// request ends with one of `slow_tails`: those connections stall for
/// `stall` before the response, mimicking a back-end blocked on framing.
pub async fn start_server(slow_tails: Vec<Vec<u8>>, stall: Duration) -> FakeServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let accepted = connections.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            accepted.fetch_add(1, Ordering::SeqCst);
            let tails = slow_tails.clone();
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut chunk = [0u8; 4096];
                loop {
                    // Probe requests end with a known tail or a blank line;
                    // the idle timeout is a fallback for anything else.
                    if request.ends_with(CLTE_TAIL)
                        || request.ends_with(TECL_TAIL)
                        || request.ends_with(b"\r\n\r\n")
                    {
                        break;
                    }
                    match tokio::time::timeout(
                        Duration::from_millis(150),
                        socket.read(&mut chunk),
                    )
                    .await
                    {
                        Ok(Ok(0)) => break,
                        Ok(Ok(n)) => request.extend_from_slice(&chunk[..n]),
                        Ok(Err(_)) => return,
                        Err(_) => break,
                    }
                }

                if tails.iter().any(|tail| request.ends_with(tail)) {
                    tokio::time::sleep(stall).await;
                }
                let _ = socket
                    .write_all(
                        b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                    )
                    .await;
                let _ = socket.shutdown().await;
            });
        }
    });

    FakeServer { addr, connections }
}

/// In-memory sink target so tests can read back what the scanner wrote.
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

pub fn named_mutations(names: &[&str]) -> BTreeMap<String, String> {
    names
        .iter()
        .map(|n| (n.to_string(), "Transfer-Encoding: chunked".to_string()))
        .collect()
}

pub fn test_config(
    workers: usize,
    mutations: BTreeMap<String, String>,
    delay: Duration,
    stop_after: u64,
) -> Config {
    Config {
        workers,
        methods: vec!["GET".to_string()],
        delay,
        mutations,
        stop_after,
        show_progress: false,
        verbose: false,
        debug: false,
        out_file: None,
        base_file: PathBuf::from("smuggles.base"),
        err_file: None,
        seed: Some(1),
    }
}
