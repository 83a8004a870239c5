// File: poc.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025
// - The smuggles developers

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use url::Url;

use crate::engine::TestStatus;
use crate::probe;
use crate::rawhttp::Target;

/// One parsed findings-log line.
#[derive(Debug, Clone)]
pub struct Finding {
    pub method: String,
    pub url: Url,
    pub status: TestStatus,
    pub mutation: String,
}

/// Parses the first four whitespace-separated tokens of a findings-log
/// line: `<METHOD> <URL> <STATUS> <MUTATION>`.
pub fn parse_finding(tokens: &[String]) -> Result<Finding> {
    if tokens.len() < 4 {
        bail!("expected <method> <url> <status> <mutation>");
    }

    let url = Url::parse(&tokens[1]).with_context(|| format!("invalid url: {}", tokens[1]))?;
    let status = match tokens[2].as_str() {
        "CL.TE" | "CLTE" => TestStatus::Clte,
        "TE.CL" | "TECL" => TestStatus::Tecl,
        other => bail!("unknown desync type: {}", other),
    };

    Ok(Finding {
        method: tokens[0].to_uppercase(),
        url,
        status,
        mutation: tokens[3].clone(),
    })
}

/// Reproduces the classified probe as a shell one-liner.
pub fn generate_poc(mutations: &BTreeMap<String, String>, finding: &Finding) -> Result<String> {
    let (target, request) = build_request(mutations, finding)?;
    let transport = if target.tls {
        format!("openssl s_client -quiet -connect {}:{}", target.host, target.port)
    } else {
        format!("nc {} {}", target.host, target.port)
    };
    Ok(format!(
        "printf '%b' '{}' | {}\n",
        escape_bytes(&request),
        transport
    ))
}

/// Fills a Turbo-Intruder-style base script: `{host}`, `{port}` and
/// `{request}` placeholders are replaced with the target endpoint and the
/// escaped probe bytes.
pub fn generate_script(
    template: &str,
    mutations: &BTreeMap<String, String>,
    finding: &Finding,
) -> Result<String> {
    let (target, request) = build_request(mutations, finding)?;
    Ok(template
        .replace("{host}", &target.host)
        .replace("{port}", &target.port.to_string())
        .replace("{request}", &escape_bytes(&request)))
}

fn build_request(
    mutations: &BTreeMap<String, String>,
    finding: &Finding,
) -> Result<(Target, String)> {
    let header = mutations
        .get(&finding.mutation)
        .with_context(|| format!("unknown mutation: {}", finding.mutation))?;
    let target = Target::from_url(&finding.url)?;
    let request = match finding.status {
        TestStatus::Clte => probe::clte(&finding.method, &target, header),
        TestStatus::Tecl => probe::tecl(&finding.method, &target, header),
        other => bail!("cannot build a probe for status {}", other),
    };
    Ok((target, request))
}

// C-style escapes understood by printf '%b' and by Python string literals.
fn escape_bytes(request: &str) -> String {
    let mut out = String::with_capacity(request.len() + 16);
    for b in request.bytes() {
        match b {
            b'\r' => out.push_str("\\r"),
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            b'\\' => out.push_str("\\\\"),
            b'\'' => out.push_str("\\x27"),
            0x20..=0x7e => out.push(b as char),
            other => out.push_str(&format!("\\x{:02x}", other)),
        }
    }
    out
}
