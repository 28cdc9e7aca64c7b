/// SIP request construction
/// Reference: RFC 3261 - SIP: Session Initiation Protocol
///
/// Requests are built as an ordered header list plus an optional body and
/// only turned into bytes by `encode()`, which owns the CRLF framing and the
/// Content-Length accounting.
use rand::Rng;
use std::fmt;
use std::net::SocketAddr;

/// RFC 3261 branch parameters must start with this magic cookie.
pub const MAGIC_COOKIE: &str = "z9hG4bK";

/// Static media port advertised in the SDP offer. The probe never opens an
/// RTP socket; the offer only has to be well-formed.
const SDP_AUDIO_PORT: u16 = 49170;

/// Generate a random Call-ID, unique per dialog
pub fn generate_call_id(local_host: &str) -> String {
    let random: u64 = rand::thread_rng().gen();
    format!("{:016x}@{}", random, local_host)
}

/// Generate a random tag for From/To headers
pub fn generate_tag() -> String {
    let random: u64 = rand::thread_rng().gen();
    format!("{:010x}", random & 0xff_ffff_ffff)
}

/// Generate a random branch parameter for Via header
pub fn generate_branch() -> String {
    let random: u64 = rand::thread_rng().gen();
    format!("{}{:016x}", MAGIC_COOKIE, random)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Register,
    Invite,
    Ack,
    Bye,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Register => "REGISTER",
            Method::Invite => "INVITE",
            Method::Ack => "ACK",
            Method::Bye => "BYE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dialog identity: stable for every request in the dialog.
///
/// `call_id` and `from_tag` are generated once; `to_tag` is learned from the
/// first response that carries one and echoed in later in-dialog requests.
#[derive(Debug, Clone)]
pub struct Dialog {
    pub call_id: String,
    pub from_uri: String,
    pub from_tag: String,
    pub to_uri: String,
    pub to_tag: Option<String>,
}

impl Dialog {
    pub fn new(from_uri: impl Into<String>, to_uri: impl Into<String>, local_host: &str) -> Self {
        Self {
            call_id: generate_call_id(local_host),
            from_uri: from_uri.into(),
            from_tag: generate_tag(),
            to_uri: to_uri.into(),
            to_tag: None,
        }
    }

    /// Record the remote tag the first time a response supplies one.
    pub fn learn_to_tag(&mut self, tag: impl Into<String>) {
        if self.to_tag.is_none() {
            self.to_tag = Some(tag.into());
        }
    }
}

/// Transaction identity: a fresh branch per request attempt.
///
/// The initial request and its digest-authenticated retry are distinct
/// transactions, so each gets its own branch.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub branch: String,
    pub cseq: u32,
}

impl Transaction {
    pub fn new(cseq: u32) -> Self {
        Self {
            branch: generate_branch(),
            cseq,
        }
    }

    /// Next transaction in the dialog: cseq + 1, fresh branch.
    pub fn next(&self) -> Self {
        Self::new(self.cseq + 1)
    }

    /// Same cseq, fresh branch (RFC-strict digest retry).
    pub fn retry_same_cseq(&self) -> Self {
        Self::new(self.cseq)
    }
}

/// A SIP request: ordered headers plus an optional body.
///
/// Header order is preserved verbatim; `encode()` appends the Content-Length
/// header last so it always equals the exact body byte length.
#[derive(Debug, Clone)]
pub struct SipRequest {
    pub method: Method,
    pub request_uri: String,
    headers: Vec<(String, String)>,
    body: Option<String>,
}

impl SipRequest {
    pub fn new(method: Method, request_uri: impl Into<String>) -> Self {
        Self {
            method,
            request_uri: request_uri.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn push_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }

    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = Some(body.into());
    }

    /// First header value matching `name`, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Number of headers matching `name`, case-insensitive.
    pub fn header_count(&self, name: &str) -> usize {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .count()
    }

    /// Exact byte length the encoded Content-Length will declare.
    pub fn content_length(&self) -> usize {
        self.body.as_ref().map(|b| b.len()).unwrap_or(0)
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Serialize to the wire form: CRLF line endings throughout, blank line
    /// between headers and body, Content-Length emitted last.
    pub fn encode(&self) -> String {
        let mut out = format!("{} {} SIP/2.0\r\n", self.method, self.request_uri);
        for (name, value) in &self.headers {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(value);
            out.push_str("\r\n");
        }
        out.push_str(&format!("Content-Length: {}\r\n\r\n", self.content_length()));
        if let Some(body) = &self.body {
            out.push_str(body);
        }
        out
    }
}

fn to_header_value(dialog: &Dialog) -> String {
    match &dialog.to_tag {
        Some(tag) => format!("<{}>;tag={}", dialog.to_uri, tag),
        None => format!("<{}>", dialog.to_uri),
    }
}

fn push_common_headers(
    request: &mut SipRequest,
    dialog: &Dialog,
    txn: &Transaction,
    local_addr: SocketAddr,
) {
    request.push_header(
        "Via",
        format!(
            "SIP/2.0/UDP {}:{};branch={};rport",
            local_addr.ip(),
            local_addr.port(),
            txn.branch
        ),
    );
    request.push_header("From", format!("<{}>;tag={}", dialog.from_uri, dialog.from_tag));
    request.push_header("To", to_header_value(dialog));
    request.push_header("Call-ID", dialog.call_id.clone());
    request.push_header("CSeq", format!("{} {}", txn.cseq, request.method));
}

fn push_trailing_headers(request: &mut SipRequest, user_agent: &str) {
    request.push_header("Max-Forwards", "70");
    request.push_header("User-Agent", user_agent);
}

/// Build a REGISTER request. `auth` is the full Authorization header value
/// computed from a prior digest challenge; it is never sent speculatively.
pub fn build_register(
    registrar_uri: &str,
    contact_uri: &str,
    dialog: &Dialog,
    txn: &Transaction,
    local_addr: SocketAddr,
    user_agent: &str,
    auth: Option<&str>,
) -> SipRequest {
    let mut request = SipRequest::new(Method::Register, registrar_uri);
    push_common_headers(&mut request, dialog, txn, local_addr);
    request.push_header("Contact", format!("<{}>", contact_uri));
    if let Some(auth) = auth {
        request.push_header("Authorization", auth);
    }
    push_trailing_headers(&mut request, user_agent);
    request.push_header("Expires", "3600");
    request
}

/// Build an INVITE carrying an SDP offer. The request URI is the callee URI
/// from the dialog.
pub fn build_invite(
    contact_uri: &str,
    dialog: &Dialog,
    txn: &Transaction,
    local_addr: SocketAddr,
    user_agent: &str,
    sdp: &str,
) -> SipRequest {
    let mut request = SipRequest::new(Method::Invite, dialog.to_uri.clone());
    push_common_headers(&mut request, dialog, txn, local_addr);
    request.push_header("Contact", format!("<{}>", contact_uri));
    push_trailing_headers(&mut request, user_agent);
    request.push_header("Content-Type", "application/sdp");
    request.set_body(sdp);
    request
}

/// Build an ACK for a final response. Reuses the transaction of the INVITE
/// it acknowledges (same branch, same cseq number) per RFC 3261 §17.1.1.3.
pub fn build_ack(
    dialog: &Dialog,
    txn: &Transaction,
    local_addr: SocketAddr,
    user_agent: &str,
) -> SipRequest {
    let mut request = SipRequest::new(Method::Ack, dialog.to_uri.clone());
    push_common_headers(&mut request, dialog, txn, local_addr);
    push_trailing_headers(&mut request, user_agent);
    request
}

/// Build a BYE to tear down an established dialog.
pub fn build_bye(
    dialog: &Dialog,
    txn: &Transaction,
    local_addr: SocketAddr,
    user_agent: &str,
) -> SipRequest {
    let mut request = SipRequest::new(Method::Bye, dialog.to_uri.clone());
    push_common_headers(&mut request, dialog, txn, local_addr);
    push_trailing_headers(&mut request, user_agent);
    request
}

/// Build the SDP offer: one audio line with PCMA(8), PCMU(0) and
/// telephone-event(96), sendrecv.
pub fn build_sdp(username: &str, session_host: &str) -> String {
    let session_id: u32 = rand::thread_rng().gen();
    let session_version: u32 = rand::thread_rng().gen();

    format!(
        "v=0\r\n\
         o={} {} {} IN IP4 {}\r\n\
         s=sipprobe call\r\n\
         c=IN IP4 {}\r\n\
         t=0 0\r\n\
         m=audio {} RTP/AVP 8 0 96\r\n\
         a=rtpmap:8 PCMA/8000\r\n\
         a=rtpmap:0 PCMU/8000\r\n\
         a=rtpmap:96 telephone-event/8000\r\n\
         a=fmtp:96 0-16\r\n\
         a=ptime:20\r\n\
         a=sendrecv\r\n",
        username, session_id, session_version, session_host, session_host, SDP_AUDIO_PORT
    )
}
