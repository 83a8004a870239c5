// File: rawhttp.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025
// - The smuggles developers

use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use url::Url;

const MAX_HEAD: usize = 65536;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("unsupported url: {0}")]
    UnsupportedUrl(String),

    #[error("dns lookup for {host} failed: {source}")]
    Resolve {
        host: String,
        source: std::io::Error,
    },

    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("tls handshake with {host} failed: {source}")]
    Tls {
        host: String,
        source: std::io::Error,
    },

    #[error("i/o with {host} failed: {source}")]
    Io {
        host: String,
        source: std::io::Error,
    },

    #[error("probe task failed: {0}")]
    Task(String),
}

/// One connection endpoint plus the request path, as resolved from a URL.
#[derive(Debug, Clone)]
pub struct Target {
    pub tls: bool,
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl Target {
    pub fn from_url(url: &Url) -> Result<Self, ClientError> {
        let tls = match url.scheme() {
            "http" => false,
            "https" => true,
            _ => return Err(ClientError::UnsupportedUrl(url.to_string())),
        };
        let host = url
            .host_str()
            .ok_or_else(|| ClientError::UnsupportedUrl(url.to_string()))?
            .to_string();
        let port = url
            .port_or_known_default()
            .unwrap_or(if tls { 443 } else { 80 });
        let mut path = url.path().to_string();
        if path.is_empty() {
            path.push('/');
        }
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }
        Ok(Target {
            tls,
            host,
            port,
            path,
        })
    }

    /// Host header value; the port only appears when it is non-default.
    pub fn host_header(&self) -> String {
        let default = if self.tls { 443 } else { 80 };
        if self.port == default {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// One timing sample. A timeout is a result, not an error: `elapsed` is
/// valid either way.
#[derive(Debug, Clone)]
pub struct RawSample {
    pub elapsed: Duration,
    pub head: Vec<u8>,
    pub timed_out: bool,
}

struct NoCertVerification;

impl rustls::client::ServerCertVerifier for NoCertVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::Certificate,
        _intermediates: &[rustls::Certificate],
        _server_name: &rustls::ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: std::time::SystemTime,
    ) -> Result<rustls::client::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::ServerCertVerified::assertion())
    }
}

/// Writes request bytes verbatim over a fresh TCP or TLS connection and
/// times the exchange. Blocking by design: the caller runs each send on a
/// dedicated OS thread so nothing interposes between write and read.
#[derive(Clone)]
pub struct RawClient {
    tls_config: Arc<rustls::ClientConfig>,
}

impl RawClient {
    pub fn new() -> Self {
        let mut root_store = rustls::RootCertStore::empty();
        root_store.add_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.iter().map(|ta| {
            rustls::OwnedTrustAnchor::from_subject_spki_name_constraints(
                ta.subject,
                ta.spki,
                ta.name_constraints,
            )
        }));

        let mut config = rustls::ClientConfig::builder()
            .with_safe_defaults()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        // Scan targets routinely present broken chains; reaching them wins
        // over validating them.
        config
            .dangerous()
            .set_certificate_verifier(Arc::new(NoCertVerification));

        RawClient {
            tls_config: Arc::new(config),
        }
    }

    /// Sends `request` and reads until end-of-headers, peer close, or the
    /// deadline. Never retries; each call yields at most one sample.
    pub fn send(
        &self,
        target: &Target,
        request: &[u8],
        timeout: Duration,
    ) -> Result<RawSample, ClientError> {
        let io_err = |source| ClientError::Io {
            host: target.host.clone(),
            source,
        };

        let addr = resolve(&target.host, target.port)?;
        let tcp = TcpStream::connect_timeout(&addr, timeout)
            .map_err(|source| ClientError::Connect { addr, source })?;
        tcp.set_nodelay(true).map_err(io_err)?;
        // Blocking writes must not outlive the probe deadline either.
        tcp.set_write_timeout(Some(timeout)).map_err(io_err)?;

        if target.tls {
            let name = rustls::ServerName::try_from(target.host.as_str())
                .map_err(|_| ClientError::UnsupportedUrl(target.host.clone()))?;
            let conn = rustls::ClientConnection::new(self.tls_config.clone(), name).map_err(
                |e| ClientError::Tls {
                    host: target.host.clone(),
                    source: std::io::Error::new(ErrorKind::InvalidData, e),
                },
            )?;
            let mut stream = rustls::StreamOwned::new(conn, tcp);
            // Finish the handshake before the clock starts, under its own
            // deadline: a target that accepts the connection but stalls the
            // handshake is a transport error, not a hung worker.
            let handshake_deadline = Instant::now() + timeout;
            while stream.conn.is_handshaking() {
                let remaining = handshake_deadline
                    .checked_duration_since(Instant::now())
                    .filter(|d| !d.is_zero())
                    .ok_or_else(|| ClientError::Tls {
                        host: target.host.clone(),
                        source: std::io::Error::new(
                            ErrorKind::TimedOut,
                            "tls handshake timed out",
                        ),
                    })?;
                stream
                    .sock
                    .set_read_timeout(Some(remaining))
                    .map_err(io_err)?;
                stream
                    .conn
                    .complete_io(&mut stream.sock)
                    .map_err(|source| ClientError::Tls {
                        host: target.host.clone(),
                        source,
                    })?;
            }
            exchange(&mut stream, &target.host, request, timeout)
        } else {
            let mut stream = tcp;
            exchange(&mut stream, &target.host, request, timeout)
        }
    }
}

impl Default for RawClient {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr, ClientError> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| ClientError::Resolve {
            host: host.to_string(),
            source,
        })?;
    addrs.next().ok_or_else(|| ClientError::Resolve {
        host: host.to_string(),
        source: std::io::Error::new(ErrorKind::NotFound, "no address records"),
    })
}

trait RawStream: Read + Write {
    fn socket(&self) -> &TcpStream;
}

impl RawStream for TcpStream {
    fn socket(&self) -> &TcpStream {
        self
    }
}

impl RawStream for rustls::StreamOwned<rustls::ClientConnection, TcpStream> {
    fn socket(&self) -> &TcpStream {
        &self.sock
    }
}

fn exchange<S: RawStream>(
    stream: &mut S,
    host: &str,
    request: &[u8],
    timeout: Duration,
) -> Result<RawSample, ClientError> {
    let io_err = |source| ClientError::Io {
        host: host.to_string(),
        source,
    };

    let started = Instant::now();
    stream.write_all(request).map_err(io_err)?;
    stream.flush().map_err(io_err)?;

    let mut head = Vec::new();
    let mut buf = [0u8; 4096];
    let timed_out = loop {
        let elapsed = started.elapsed();
        if elapsed >= timeout {
            break true;
        }
        stream
            .socket()
            .set_read_timeout(Some(timeout - elapsed))
            .map_err(io_err)?;
        match stream.read(&mut buf) {
            Ok(0) => break false,
            Ok(n) => {
                head.extend_from_slice(&buf[..n]);
                if header_end(&head).is_some() || head.len() >= MAX_HEAD {
                    break false;
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                break true;
            }
            // A close without close_notify, or an RST after the response,
            // still ends the sample.
            Err(e) if matches!(e.kind(), ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset) => {
                break false;
            }
            Err(e) => return Err(io_err(e)),
        }
    };

    Ok(RawSample {
        elapsed: started.elapsed(),
        head,
        timed_out,
    })
}

fn header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4)
}
