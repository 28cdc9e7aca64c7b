/// SIP UDP transport
///
/// One exclusively-owned socket per probe run, bound to an ephemeral port
/// and released when the transport drops. One send is one datagram; one
/// receive is one datagram bounded by a deadline. No retransmission timers:
/// retry policy belongs to the caller.
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::error::SipError;

/// Default receive deadline per transaction.
pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_secs(5);

const MAX_DATAGRAM: usize = 4096;

pub struct UdpTransport {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UdpTransport {
    /// Bind an ephemeral local port with `peer` as the fixed destination.
    pub async fn bind(peer: SocketAddr) -> Result<Self, SipError> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        debug!(
            "SIP transport bound to {} for peer {}",
            socket
                .local_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| "unknown".to_string()),
            peer
        );
        Ok(Self { socket, peer })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, SipError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Transmit one encoded message as a single datagram.
    pub async fn send(&self, message: &str) -> Result<(), SipError> {
        trace!("sending SIP message:\n{}", message);
        self.socket.send_to(message.as_bytes(), self.peer).await?;
        Ok(())
    }

    /// Block until one datagram arrives or the deadline elapses.
    pub async fn receive(&self, deadline: Duration) -> Result<String, SipError> {
        let mut buf = [0u8; MAX_DATAGRAM];
        let (len, _addr) = timeout(deadline, self.socket.recv_from(&mut buf))
            .await
            .map_err(|_| SipError::Timeout)??;
        let datagram = String::from_utf8_lossy(&buf[..len]).to_string();
        trace!("received SIP message:\n{}", datagram);
        Ok(datagram)
    }
}
