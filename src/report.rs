//! Human-readable timing reports and the optional results file.
//!
//! The SIP core exposes raw timestamps; everything about formatting,
//! printing and persistence lives here.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::time::Duration;

use crate::config::ProbeConfig;
use crate::sip::client::{CallProgress, CallSetupOutcome, RegisterOutcome, RegisterResult};

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn mask(secret: &str) -> String {
    "*".repeat(secret.chars().count())
}

/// Banner shared by both probes.
pub fn render_header(config: &ProbeConfig, started: DateTime<Local>) -> String {
    let mut out = String::new();
    let rule = "=".repeat(60);
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "SIP delay probe");
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "Started:  {}", started.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "Proxy:    {}:{}", config.proxy_host, config.proxy_port);
    let _ = writeln!(out, "User:     {}@{}", config.username, config.domain);
    let _ = writeln!(out, "Password: {}", mask(&config.password));
    let _ = writeln!(out, "{}", rule);
    out
}

/// Registration delay breakdown for the results file.
pub fn render_register_report(outcome: &RegisterOutcome) -> String {
    let mut out = String::new();
    let rule = "=".repeat(60);
    let _ = writeln!(out, "REGISTRATION TIMING:");
    let _ = writeln!(out, "{}", rule);
    match outcome.result {
        RegisterResult::Authenticated => {
            if let Some(challenge) = outcome.challenge_roundtrip() {
                let _ = writeln!(
                    out,
                    "Initial REGISTER to 401:       {:.3} ms",
                    ms(challenge)
                );
            }
            if let Some(auth) = outcome.auth_delay() {
                let _ = writeln!(
                    out,
                    "Auth REGISTER to 200 OK:       {:.3} ms",
                    ms(auth)
                );
            }
            let _ = writeln!(
                out,
                "Total registration delay:      {:.3} ms",
                ms(outcome.total_delay())
            );
        }
        RegisterResult::OkWithoutChallenge => {
            let _ = writeln!(
                out,
                "REGISTER accepted without challenge in {:.3} ms",
                ms(outcome.total_delay())
            );
        }
        RegisterResult::Rejected { status } => {
            let _ = writeln!(
                out,
                "Registration REJECTED with status {} after {:.3} ms",
                status,
                ms(outcome.total_delay())
            );
            let _ = writeln!(out, "Check the account credentials on the proxy.");
        }
    }
    let _ = writeln!(out, "{}", rule);
    out
}

/// Call-setup delay breakdown for the INVITE probe.
pub fn render_call_report(outcome: &CallSetupOutcome) -> String {
    let mut out = String::new();
    let rule = "=".repeat(60);
    let _ = writeln!(out, "CALL SETUP TIMING:");
    let _ = writeln!(out, "{}", rule);
    if let Some(trying) = outcome.trying_delay() {
        let _ = writeln!(out, "INVITE to 100 Trying:          {:.3} ms", ms(trying));
    }
    let label = match &outcome.progress {
        CallProgress::Ringing { .. } => "INVITE to 180 Ringing:",
        CallProgress::NotFound { .. } => "INVITE to 404 Not Found:",
        CallProgress::ProxyAuthRequired => "INVITE to 407 challenge:",
    };
    let _ = writeln!(
        out,
        "{:<30} {:.3} ms",
        label,
        ms(outcome.progress_delay())
    );
    match &outcome.progress {
        CallProgress::Ringing { to_tag } => {
            let _ = writeln!(out, "Callee is being alerted (answer not awaited).");
            if let Some(tag) = to_tag {
                let _ = writeln!(out, "Remote tag: {}", tag);
            }
        }
        CallProgress::NotFound { acked } => {
            let _ = writeln!(out, "Callee not registered at the proxy.");
            if *acked {
                let _ = writeln!(out, "Final response ACKed.");
            }
        }
        CallProgress::ProxyAuthRequired => {
            let _ = writeln!(out, "Proxy authentication on INVITE is not attempted.");
        }
    }
    let _ = writeln!(out, "{}", rule);
    out
}

/// Write the combined report to the configured results path.
pub fn save_results(path: &str, contents: &str) -> Result<()> {
    std::fs::write(path, contents)
        .with_context(|| format!("failed to write results file '{}'", path))
}
