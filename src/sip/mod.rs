//! SIP transaction client: message building, digest authentication,
//! UDP transport and the REGISTER/INVITE probe flows.

pub mod client;
pub mod digest;
pub mod message;
pub mod response;
pub mod transport;

#[cfg(test)]
mod model;

pub use client::{
    AuthState, CallProgress, CallSetupOutcome, CseqPolicy, RegisterOutcome, RegisterResult,
    SipClient,
};
pub use digest::{Credentials, DigestChallenge};
pub use message::{Dialog, SipRequest, Transaction};
pub use response::SipResponse;
