/// SIP response parsing
///
/// Deliberately partial: status line plus a flat header scan, no generic
/// parameter grammar. Malformed datagrams are a typed error; malformed
/// individual headers are skipped and simply yield "not found".
use crate::error::SipError;

#[derive(Debug, Clone)]
pub struct SipResponse {
    pub status: u16,
    pub reason: String,
    headers: Vec<(String, String)>,
}

impl SipResponse {
    /// Parse one UDP datagram as a SIP response.
    pub fn parse(datagram: &str) -> Result<Self, SipError> {
        let mut lines = datagram.split("\r\n");
        let status_line = lines.next().unwrap_or("");
        let (status, reason) = parse_status_line(status_line).ok_or_else(|| {
            SipError::MalformedResponse {
                line: status_line.chars().take(80).collect(),
            }
        })?;

        let mut headers = Vec::new();
        for line in lines {
            if line.is_empty() {
                // blank line: body follows, which this probe never inspects
                break;
            }
            if let Some(colon) = line.find(':') {
                let name = line[..colon].trim();
                let value = line[colon + 1..].trim();
                if !name.is_empty() {
                    headers.push((name.to_string(), value.to_string()));
                }
            }
            // lines without a colon are skipped, not fatal
        }

        Ok(Self {
            status,
            reason,
            headers,
        })
    }

    /// First header value matching `name`, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_provisional(&self) -> bool {
        (100..200).contains(&self.status)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 401 Unauthorized or 407 Proxy Authentication Required.
    pub fn is_challenge(&self) -> bool {
        self.status == 401 || self.status == 407
    }

    /// The tag parameter of the To header, if the response carries one.
    pub fn to_tag(&self) -> Option<&str> {
        let to = self.header("To")?;
        extract_param(to, "tag=")
    }

    /// The branch parameter of the topmost Via header.
    pub fn via_branch(&self) -> Option<&str> {
        let via = self.header("Via")?;
        extract_param(via, "branch=")
    }

    /// Raw status line, reassembled for diagnostics.
    pub fn status_line(&self) -> String {
        format!("SIP/2.0 {} {}", self.status, self.reason)
    }
}

fn parse_status_line(line: &str) -> Option<(u16, String)> {
    let rest = line.strip_prefix("SIP/2.0 ")?;
    let mut parts = rest.splitn(2, ' ');
    let code: u16 = parts.next()?.parse().ok()?;
    if !(100..700).contains(&code) {
        return None;
    }
    let reason = parts.next().unwrap_or("").to_string();
    Some((code, reason))
}

/// Find `marker` (e.g. "tag=") in a header value and return the token after
/// it, ending at the next delimiter. Case-insensitive on the marker.
fn extract_param<'a>(value: &'a str, marker: &str) -> Option<&'a str> {
    let lower = value.to_ascii_lowercase();
    let pos = lower.find(marker)?;
    let start = pos + marker.len();
    let rest = value.get(start..)?;
    let end = rest
        .find(|c: char| c == ';' || c == ',' || c == '>' || c.is_whitespace())
        .unwrap_or(rest.len());
    let token = &rest[..end];
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
