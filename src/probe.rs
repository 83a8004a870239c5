// File: probe.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025
// - The smuggles developers

use crate::rawhttp::Target;

/// CL.TE probe. A Content-Length front-end forwards all six body bytes; a
/// Transfer-Encoding back-end consumes the one-byte chunk and then blocks
/// on the orphan `X`, which is not a valid chunk-size line.
pub fn clte(method: &str, target: &Target, mutation: &str) -> String {
    format!(
        "{} {} HTTP/1.1\r\nHost: {}\r\n{}\r\nContent-Length: 4\r\n\r\n1\r\nA\r\nX",
        method,
        target.path,
        target.host_header(),
        mutation
    )
}

/// TE.CL probe. A Transfer-Encoding front-end sees the terminating chunk
/// and forwards; a Content-Length back-end waits for a sixth body byte that
/// never arrives.
pub fn tecl(method: &str, target: &Target, mutation: &str) -> String {
    format!(
        "{} {} HTTP/1.1\r\nHost: {}\r\nContent-Length: 6\r\n{}\r\n\r\n0\r\n\r\nX",
        method,
        target.path,
        target.host_header(),
        mutation
    )
}

/// Well-formed request used to measure a target's base round-trip time.
pub fn baseline(target: &Target) -> String {
    format!(
        "GET / HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        target.host_header()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn target(url: &str) -> Target {
        Target::from_url(&Url::parse(url).unwrap()).unwrap()
    }

    #[test]
    fn clte_bytes_are_exact() {
        let t = target("https://target.example/path");
        assert_eq!(
            clte("POST", &t, "Transfer-Encoding : chunked"),
            "POST /path HTTP/1.1\r\nHost: target.example\r\nTransfer-Encoding : chunked\r\nContent-Length: 4\r\n\r\n1\r\nA\r\nX"
        );
    }

    #[test]
    fn tecl_bytes_are_exact() {
        let t = target("https://target.example/path");
        assert_eq!(
            tecl("POST", &t, "Transfer-Encoding : chunked"),
            "POST /path HTTP/1.1\r\nHost: target.example\r\nContent-Length: 6\r\nTransfer-Encoding : chunked\r\n\r\n0\r\n\r\nX"
        );
    }

    #[test]
    fn baseline_closes_the_connection() {
        let t = target("http://example.com/");
        assert_eq!(
            baseline(&t),
            "GET / HTTP/1.1\r\nHost: example.com\r\nConnection: close\r\n\r\n"
        );
    }

    #[test]
    fn nonstandard_port_lands_in_host_header() {
        let t = target("http://example.com:8080/");
        assert!(clte("GET", &t, "Transfer-Encoding: chunked")
            .starts_with("GET / HTTP/1.1\r\nHost: example.com:8080\r\n"));
    }
}
