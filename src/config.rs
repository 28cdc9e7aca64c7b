use anyhow::{bail, Context, Result};
use std::env;
use std::net::ToSocketAddrs;

use crate::sip::client::CseqPolicy;

/// Immutable probe configuration, passed into the client at construction.
/// No process-wide mutable state: every identifier the flows need is either
/// here or generated per dialog.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub proxy_host: String,
    pub proxy_port: u16,

    // Account identity
    pub username: String,
    pub password: String,
    pub domain: String,

    // Called party for the INVITE probe (optional; REGISTER-only runs
    // don't need it)
    pub callee: Option<String>,

    // Receive deadline per transaction, milliseconds
    pub recv_timeout_ms: u64,

    // Whether the digest-authenticated retry bumps CSeq (default) or
    // reuses it (RFC-strict)
    pub cseq_policy: CseqPolicy,

    pub user_agent: String,

    // Optional path for the results text file
    pub results_path: Option<String>,
}

impl ProbeConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env if present, ignore if missing
        Self::from_getter(|key| env::var(key).ok())
    }

    /// Parse config from a custom getter function (for testing)
    pub fn from_getter<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let cseq_policy = match get("SIP_CSEQ_RETRY").as_deref() {
            None | Some("increment") => CseqPolicy::IncrementOnRetry,
            Some("reuse") => CseqPolicy::ReuseOnRetry,
            Some(other) => bail!(
                "SIP_CSEQ_RETRY must be 'increment' or 'reuse', got '{}'",
                other
            ),
        };

        Ok(ProbeConfig {
            proxy_host: get("SIP_PROXY").context("SIP_PROXY not set")?,
            proxy_port: get("SIP_PORT")
                .unwrap_or_else(|| "5060".to_string())
                .parse()
                .context("SIP_PORT must be a valid port number")?,

            username: get("SIP_USERNAME").context("SIP_USERNAME not set")?,
            password: get("SIP_PASSWORD").context("SIP_PASSWORD not set")?,
            domain: get("SIP_DOMAIN").context("SIP_DOMAIN not set")?,

            callee: get("SIP_CALLEE").filter(|s| !s.is_empty()),

            recv_timeout_ms: get("SIP_RECV_TIMEOUT_MS")
                .unwrap_or_else(|| "5000".to_string())
                .parse()
                .context("SIP_RECV_TIMEOUT_MS must be a number of milliseconds")?,

            cseq_policy,

            user_agent: get("SIP_USER_AGENT").unwrap_or_else(|| "sipprobe/0.1.0".to_string()),

            results_path: get("SIPPROBE_RESULTS_PATH").filter(|s| !s.is_empty()),
        })
    }

    /// Create config from a HashMap (convenience for testing)
    #[cfg(test)]
    pub fn from_map(map: &std::collections::HashMap<&str, &str>) -> Result<Self> {
        Self::from_getter(|key| map.get(key).map(|v| v.to_string()))
    }

    /// Validate configuration values at startup, collecting every failure.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        let proxy = format!("{}:{}", self.proxy_host, self.proxy_port);
        if proxy.to_socket_addrs().is_err() {
            errors.push(format!(
                "Cannot resolve SIP proxy '{}'. Check DNS or network.",
                self.proxy_host
            ));
        }

        if self.username.trim().is_empty() {
            errors.push("SIP_USERNAME cannot be empty.".to_string());
        }

        if self.domain.trim().is_empty() {
            errors.push("SIP_DOMAIN cannot be empty.".to_string());
        }

        if self.recv_timeout_ms == 0 {
            errors.push("SIP_RECV_TIMEOUT_MS must be greater than 0.".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )
        }
    }

    /// URI of the account, used in From/To of REGISTER and From of INVITE.
    pub fn from_uri(&self) -> String {
        format!("sip:{}@{}", self.username, self.domain)
    }

    /// Request URI for REGISTER and the digest `uri` parameter.
    pub fn registrar_uri(&self) -> String {
        format!("sip:{}", self.domain)
    }

    /// URI of the called party, when configured.
    pub fn callee_uri(&self) -> Option<String> {
        self.callee
            .as_ref()
            .map(|c| format!("sip:{}@{}", c, self.domain))
    }
}
