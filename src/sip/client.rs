/// SIP transaction client (UAC side)
///
/// Builds requests, performs one UDP round trip per transaction and drives
/// the digest challenge/response cycle. Flow sequencing beyond a single
/// transaction (register-then-call, reporting, retries) belongs to the
/// caller; the client only ever retries once, to answer a challenge.
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::lookup_host;
use tracing::{debug, info, warn};

use crate::config::ProbeConfig;
use crate::error::SipError;

use super::digest::{authorization_header, Credentials, DigestChallenge};
use super::message::{self, Dialog, Transaction};
use super::response::SipResponse;
use super::transport::UdpTransport;

/// CSeq numbering for the digest-authenticated retry of a REGISTER.
///
/// The default increments CSeq before the retry; RFC-strict stacks resubmit
/// the same CSeq within the same transaction. Both are tolerated by lenient
/// registrars, so the choice is surfaced as policy instead of being silently
/// "fixed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CseqPolicy {
    #[default]
    IncrementOnRetry,
    ReuseOnRetry,
}

/// Digest authentication progress for one REGISTER flow.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    Unchallenged,
    Challenged(DigestChallenge),
    Authenticated,
    Rejected { status: u16 },
}

impl AuthState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AuthState::Authenticated | AuthState::Rejected { .. })
    }
}

/// Terminal classification of a REGISTER flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterResult {
    /// Challenged, answered, accepted.
    Authenticated,
    /// Accepted without ever being challenged.
    OkWithoutChallenge,
    /// The authenticated retry was refused; no third attempt is made.
    Rejected { status: u16 },
}

/// Per-transaction timestamps of a REGISTER flow, exposed so the caller can
/// compute and report delays. The core does no I/O beyond the socket.
#[derive(Debug, Clone)]
pub struct RegisterOutcome {
    pub result: RegisterResult,
    pub final_status: u16,
    pub initial_sent: Instant,
    pub challenge_received: Option<Instant>,
    pub auth_sent: Option<Instant>,
    pub final_received: Instant,
    /// CSeq of the last request sent, so callers can continue the sequence.
    pub last_cseq: u32,
}

impl RegisterOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(
            self.result,
            RegisterResult::Authenticated | RegisterResult::OkWithoutChallenge
        )
    }

    /// Initial REGISTER to the 401/407 challenge.
    pub fn challenge_roundtrip(&self) -> Option<Duration> {
        self.challenge_received
            .map(|t| t.duration_since(self.initial_sent))
    }

    /// Authenticated REGISTER to the final response.
    pub fn auth_delay(&self) -> Option<Duration> {
        self.auth_sent
            .map(|t| self.final_received.duration_since(t))
    }

    /// Initial REGISTER to the final response.
    pub fn total_delay(&self) -> Duration {
        self.final_received.duration_since(self.initial_sent)
    }
}

/// How far the INVITE got. Ringing means the callee is being alerted; the
/// answer itself is outside this probe's scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallProgress {
    Ringing { to_tag: Option<String> },
    /// Callee unknown to the proxy. The non-2xx final response has been
    /// ACKed to close the transaction.
    NotFound { acked: bool },
    /// Proxy wants credentials on INVITE; terminal for this probe.
    ProxyAuthRequired,
}

/// Timestamps and classification of one INVITE attempt.
#[derive(Debug, Clone)]
pub struct CallSetupOutcome {
    pub invite_sent: Instant,
    pub trying_received: Option<Instant>,
    pub progress_received: Instant,
    pub progress_status: u16,
    pub progress: CallProgress,
}

impl CallSetupOutcome {
    /// INVITE to 100 Trying.
    pub fn trying_delay(&self) -> Option<Duration> {
        self.trying_received
            .map(|t| t.duration_since(self.invite_sent))
    }

    /// INVITE to the first non-Trying response.
    pub fn progress_delay(&self) -> Duration {
        self.progress_received.duration_since(self.invite_sent)
    }
}

/// SIP transaction client bound to one proxy for the duration of a run.
pub struct SipClient {
    transport: UdpTransport,
    local_addr: SocketAddr,
    credentials: Credentials,
    domain: String,
    user_agent: String,
    recv_timeout: Duration,
    cseq_policy: CseqPolicy,
}

impl SipClient {
    pub async fn new(config: &ProbeConfig) -> Result<Self, SipError> {
        let proxy = format!("{}:{}", config.proxy_host, config.proxy_port);
        let peer = lookup_host(&proxy)
            .await?
            .next()
            .ok_or_else(|| {
                SipError::Transport(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no addresses found for SIP proxy {}", proxy),
                ))
            })?;

        info!("SIP proxy resolved to {}", peer);

        let transport = UdpTransport::bind(peer).await?;
        let local_addr = transport.local_addr()?;

        Ok(Self {
            transport,
            local_addr,
            credentials: Credentials {
                username: config.username.clone(),
                password: config.password.clone(),
            },
            domain: config.domain.clone(),
            user_agent: config.user_agent.clone(),
            recv_timeout: Duration::from_millis(config.recv_timeout_ms),
            cseq_policy: config.cseq_policy,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn from_uri(&self) -> String {
        format!("sip:{}@{}", self.credentials.username, self.domain)
    }

    fn registrar_uri(&self) -> String {
        format!("sip:{}", self.domain)
    }

    fn contact_uri(&self) -> String {
        format!(
            "sip:{}@{}:{}",
            self.credentials.username,
            self.local_addr.ip(),
            self.local_addr.port()
        )
    }

    /// One request/response round trip. Provisional responses are logged and
    /// skipped; the first final response is returned with its send/receive
    /// timestamps.
    async fn transaction(
        &self,
        request: &message::SipRequest,
    ) -> Result<(SipResponse, Instant, Instant), SipError> {
        let encoded = request.encode();
        let sent = Instant::now();
        self.transport.send(&encoded).await?;
        loop {
            let raw = self.transport.receive(self.recv_timeout).await?;
            let received = Instant::now();
            let response = SipResponse::parse(&raw)?;
            if response.is_provisional() {
                debug!("provisional response {}, still waiting", response.status_line());
                continue;
            }
            return Ok((response, sent, received));
        }
    }

    /// REGISTER flow: initial request, digest challenge, single
    /// authenticated retry. Terminal states follow the auth machine:
    /// Unchallenged -> Challenged -> Authenticated | Rejected.
    pub async fn register(&self) -> Result<RegisterOutcome, SipError> {
        let from_uri = self.from_uri();
        let mut dialog = Dialog::new(&from_uri, &from_uri, &self.local_addr.ip().to_string());
        let txn = Transaction::new(1);

        info!("sending REGISTER for {} to {}", from_uri, self.transport.peer());
        let request = message::build_register(
            &self.registrar_uri(),
            &self.contact_uri(),
            &dialog,
            &txn,
            self.local_addr,
            &self.user_agent,
            None,
        );

        let (response, initial_sent, received) = self.transaction(&request).await?;

        if response.is_success() {
            info!("registered without challenge ({})", response.status_line());
            return Ok(RegisterOutcome {
                result: RegisterResult::OkWithoutChallenge,
                final_status: response.status,
                initial_sent,
                challenge_received: None,
                auth_sent: None,
                final_received: received,
                last_cseq: txn.cseq,
            });
        }

        if !response.is_challenge() {
            return Err(SipError::UnexpectedStatus {
                status: response.status,
                line: response.status_line(),
            });
        }

        // Unchallenged -> Challenged
        let challenge = DigestChallenge::from_response(&response)?;
        let state = AuthState::Challenged(challenge.clone());
        debug!(
            "challenged by realm {:?} (state {:?})",
            challenge.realm, state
        );
        if let Some(tag) = response.to_tag() {
            dialog.learn_to_tag(tag);
        }

        let auth = authorization_header(
            &self.credentials,
            &challenge,
            "REGISTER",
            &self.registrar_uri(),
        );
        let retry_txn = match self.cseq_policy {
            CseqPolicy::IncrementOnRetry => txn.next(),
            CseqPolicy::ReuseOnRetry => txn.retry_same_cseq(),
        };
        let retry = message::build_register(
            &self.registrar_uri(),
            &self.contact_uri(),
            &dialog,
            &retry_txn,
            self.local_addr,
            &self.user_agent,
            Some(&auth),
        );

        info!("answering challenge (cseq {})", retry_txn.cseq);
        let (final_response, auth_sent, final_received) = self.transaction(&retry).await?;

        // Challenged -> Authenticated | Rejected; never a third attempt
        let result = if final_response.is_success() {
            info!("registration authenticated");
            RegisterResult::Authenticated
        } else {
            warn!(
                "authenticated REGISTER refused: {}",
                final_response.status_line()
            );
            RegisterResult::Rejected {
                status: final_response.status,
            }
        };

        Ok(RegisterOutcome {
            result,
            final_status: final_response.status,
            initial_sent,
            challenge_received: Some(received),
            auth_sent: Some(auth_sent),
            final_received,
            last_cseq: retry_txn.cseq,
        })
    }

    /// INVITE flow: send the offer, absorb an optional 100 Trying, then
    /// classify the first progress response. 404 finals are ACKed to close
    /// the transaction; 407 is terminal for this core.
    pub async fn call_setup(
        &self,
        callee_uri: &str,
        cseq: u32,
    ) -> Result<CallSetupOutcome, SipError> {
        let mut dialog = Dialog::new(
            self.from_uri(),
            callee_uri,
            &self.local_addr.ip().to_string(),
        );
        let txn = Transaction::new(cseq);
        let sdp = message::build_sdp(&self.credentials.username, &self.local_addr.ip().to_string());
        let invite = message::build_invite(
            &self.contact_uri(),
            &dialog,
            &txn,
            self.local_addr,
            &self.user_agent,
            &sdp,
        );

        info!("sending INVITE to {}", callee_uri);
        let encoded = invite.encode();
        let invite_sent = Instant::now();
        self.transport.send(&encoded).await?;

        let mut trying_received = None;
        loop {
            let raw = self.transport.receive(self.recv_timeout).await?;
            let received = Instant::now();
            let response = SipResponse::parse(&raw)?;

            match response.status {
                100 => {
                    debug!("100 Trying");
                    if trying_received.is_none() {
                        trying_received = Some(received);
                    }
                }
                180 => {
                    info!("callee is ringing");
                    if let Some(tag) = response.to_tag() {
                        dialog.learn_to_tag(tag);
                    }
                    return Ok(CallSetupOutcome {
                        invite_sent,
                        trying_received,
                        progress_received: received,
                        progress_status: response.status,
                        progress: CallProgress::Ringing {
                            to_tag: dialog.to_tag.clone(),
                        },
                    });
                }
                404 => {
                    info!("callee not found, acking final response");
                    if let Some(tag) = response.to_tag() {
                        dialog.learn_to_tag(tag);
                    }
                    // non-2xx final over UDP: ACK within the INVITE
                    // transaction (same branch, same cseq)
                    let ack =
                        message::build_ack(&dialog, &txn, self.local_addr, &self.user_agent);
                    self.transport.send(&ack.encode()).await?;
                    return Ok(CallSetupOutcome {
                        invite_sent,
                        trying_received,
                        progress_received: received,
                        progress_status: response.status,
                        progress: CallProgress::NotFound { acked: true },
                    });
                }
                407 => {
                    warn!("proxy requires authentication for INVITE; stopping");
                    return Ok(CallSetupOutcome {
                        invite_sent,
                        trying_received,
                        progress_received: received,
                        progress_status: response.status,
                        progress: CallProgress::ProxyAuthRequired,
                    });
                }
                _ => {
                    return Err(SipError::UnexpectedStatus {
                        status: response.status,
                        line: response.status_line(),
                    });
                }
            }
        }
    }

    /// Tear down an established dialog. Requires the remote tag; callers
    /// must not attempt a BYE before a response supplied one.
    pub async fn hangup(&self, dialog: &Dialog, cseq: u32) -> Result<(), SipError> {
        if dialog.to_tag.is_none() {
            return Err(SipError::MissingDialogState);
        }
        let txn = Transaction::new(cseq);
        let bye = message::build_bye(dialog, &txn, self.local_addr, &self.user_agent);
        self.transport.send(&bye.encode()).await?;
        // best-effort wait for the 200; the dialog is done either way
        match self.transport.receive(self.recv_timeout).await {
            Ok(_) | Err(SipError::Timeout) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
