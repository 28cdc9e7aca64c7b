//! sipprobe - SIP registration and call-setup delay measurement
//!
//! The library half is the reusable SIP transaction client: request
//! building, digest authentication, UDP transport and the REGISTER/INVITE
//! probe flows. The binary half wires configuration, probes and reporting
//! together.

pub mod cli;
pub mod config;
pub mod error;
pub mod report;
pub mod sip;

pub use config::ProbeConfig;
pub use error::SipError;
pub use sip::{CallProgress, CallSetupOutcome, RegisterOutcome, RegisterResult, SipClient};
