/// SIP Digest Authentication (RFC 2617, legacy mode)
///
/// Only the qop-less MD5 scheme is supported:
/// HA1 = MD5(username:realm:password), HA2 = MD5(method:uri),
/// response = MD5(HA1:nonce:HA2), all lowercase hex over UTF-8 input.
///
/// Uses the md-5 crate for hashing - no custom crypto implementation.
use digest::Digest;
use md5::Md5;
use tracing::debug;

use crate::error::SipError;
use crate::sip::response::SipResponse;

/// Challenge parameters extracted from a 401/407 response. The realm and
/// nonce are opaque server strings and are echoed back verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
}

impl DigestChallenge {
    /// Parse a WWW-Authenticate / Proxy-Authenticate header value.
    /// Example: `Digest realm="ims.localdomain", nonce="abc", algorithm=MD5`
    pub fn parse(header_value: &str) -> Option<Self> {
        let params = header_value.strip_prefix("Digest ").unwrap_or(header_value);

        if let Some(algorithm) = find_quoted_or_token(params, "algorithm") {
            if !algorithm.eq_ignore_ascii_case("md5") {
                debug!("unsupported digest algorithm: {}", algorithm);
                return None;
            }
        }

        Some(Self {
            realm: find_quoted(params, "realm")?,
            nonce: find_quoted(params, "nonce")?,
        })
    }

    /// Extract the challenge from a 401/407 response. A challenge response
    /// without a usable realm/nonce pair aborts the transaction.
    pub fn from_response(response: &SipResponse) -> Result<Self, SipError> {
        let header = response
            .header("WWW-Authenticate")
            .or_else(|| response.header("Proxy-Authenticate"))
            .ok_or(SipError::AuthChallengeMissingFields)?;
        Self::parse(header).ok_or(SipError::AuthChallengeMissingFields)
    }
}

/// Account credentials. The password never appears on the wire; only the
/// derived digest does.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// response = MD5(MD5(username:realm:password):nonce:MD5(method:uri))
pub fn compute_digest_response(
    username: &str,
    realm: &str,
    password: &str,
    method: &str,
    uri: &str,
    nonce: &str,
) -> String {
    let ha1 = md5_hex(&format!("{}:{}:{}", username, realm, password));
    let ha2 = md5_hex(&format!("{}:{}", method, uri));
    md5_hex(&format!("{}:{}:{}", ha1, nonce, ha2))
}

/// Format the Authorization header value for an answered challenge.
pub fn authorization_header(
    credentials: &Credentials,
    challenge: &DigestChallenge,
    method: &str,
    uri: &str,
) -> String {
    let response = compute_digest_response(
        &credentials.username,
        &challenge.realm,
        &credentials.password,
        method,
        uri,
        &challenge.nonce,
    );
    format!(
        "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", response=\"{}\", algorithm=MD5",
        credentials.username, challenge.realm, challenge.nonce, uri, response
    )
}

/// Compute MD5 and return as lowercase hex
fn md5_hex(input: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(input.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Value of `key="..."` in a parameter list. Quoted values only; the realm
/// and nonce are always quoted on the wire.
fn find_quoted(params: &str, key: &str) -> Option<String> {
    let lower = params.to_ascii_lowercase();
    let mut search_from = 0;
    while let Some(rel) = lower[search_from..].find(key) {
        let key_pos = search_from + rel;
        // require an actual `key=` occurrence, not a substring of another
        // key such as cnonce
        let starts_word = key_pos == 0
            || !lower.as_bytes()[key_pos - 1].is_ascii_alphanumeric();
        let after = &params[key_pos + key.len()..];
        let after_eq = after.trim_start();
        if !starts_word {
            search_from = key_pos + key.len();
            continue;
        }
        if let Some(rest) = after_eq.strip_prefix('=') {
            let rest = rest.trim_start();
            if let Some(quoted) = rest.strip_prefix('"') {
                if let Some(end) = quoted.find('"') {
                    return Some(quoted[..end].to_string());
                }
                return None; // unterminated quote
            }
        }
        search_from = key_pos + key.len();
    }
    None
}

/// Value of `key=token` or `key="..."`; used for the algorithm parameter,
/// which servers send unquoted.
fn find_quoted_or_token(params: &str, key: &str) -> Option<String> {
    if let Some(quoted) = find_quoted(params, key) {
        return Some(quoted);
    }
    let lower = params.to_ascii_lowercase();
    let mut search_from = 0;
    while let Some(rel) = lower[search_from..].find(key) {
        let key_pos = search_from + rel;
        let starts_word = key_pos == 0
            || !lower.as_bytes()[key_pos - 1].is_ascii_alphanumeric();
        if !starts_word {
            search_from = key_pos + key.len();
            continue;
        }
        let after = params[key_pos + key.len()..].trim_start();
        if let Some(rest) = after.strip_prefix('=') {
            let rest = rest.trim_start();
            let end = rest
                .find(|c: char| c == ',' || c.is_whitespace())
                .unwrap_or(rest.len());
            let token = &rest[..end];
            if !token.is_empty() && !token.starts_with('"') {
                return Some(token.to_string());
            }
            return None;
        }
        search_from = key_pos + key.len();
    }
    None
}
