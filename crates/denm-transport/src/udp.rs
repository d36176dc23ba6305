//! UDP transport implementation
//!
//! Stands in for the geo-networking stack: every message is framed with the
//! port header and sent to one configured destination (typically a broadcast
//! or multicast address). Area, lifetime and hop limit are not enforced on
//! UDP.
//!
//! Sending is fire-and-forget: `send` queues the framed datagram and a
//! background task awaits the socket write.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use denm_core::{DenmError, DenmResult};

use crate::{frame, unframe, LinkAddress, TransmitRequest, Transport};

/// Largest datagram read by the receive loop
pub const MAX_DATAGRAM_SIZE: usize = 1500;

/// Datagrams queued for the send task before `send` reports an error
pub const SEND_QUEUE_SIZE: usize = 256;

/// UDP transport for DENMs
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    destination: SocketAddr,
    outbound: mpsc::Sender<Bytes>,
}

impl UdpTransport {
    /// Bind to a local address, sending everything to `destination`
    pub async fn bind(addr: SocketAddr, destination: SocketAddr) -> DenmResult<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| DenmError::TransportError(e.to_string()))?;

        socket
            .set_broadcast(true)
            .map_err(|e| DenmError::TransportError(e.to_string()))?;

        let local_addr = socket
            .local_addr()
            .map_err(|e| DenmError::TransportError(e.to_string()))?;

        let socket = Arc::new(socket);
        let outbound = start_send_loop(Arc::clone(&socket), destination, SEND_QUEUE_SIZE);

        Ok(UdpTransport {
            socket,
            local_addr,
            destination,
            outbound,
        })
    }

    /// Get local address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    /// Get a clone of the socket for concurrent operations
    pub fn socket(&self) -> Arc<UdpSocket> {
        Arc::clone(&self.socket)
    }
}

impl Transport for UdpTransport {
    fn send(&self, request: TransmitRequest) -> DenmResult<()> {
        let datagram = frame(request.destination_port, &request.payload);
        trace!(
            len = datagram.len(),
            lifetime = ?request.lifetime,
            hop_limit = request.hop_limit,
            traffic_class = request.traffic_class,
            "sending datagram"
        );

        self.outbound.try_send(datagram).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                DenmError::TransportError("send queue full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => {
                DenmError::TransportError("send task stopped".to_string())
            }
        })
    }
}

/// Spawn the task that writes queued datagrams to `destination`
///
/// The task ends once every sender is dropped.
fn start_send_loop(
    socket: Arc<UdpSocket>,
    destination: SocketAddr,
    buffer_size: usize,
) -> mpsc::Sender<Bytes> {
    let (tx, mut rx) = mpsc::channel::<Bytes>(buffer_size);

    tokio::spawn(async move {
        while let Some(datagram) = rx.recv().await {
            if let Err(e) = socket.send_to(&datagram, destination).await {
                warn!(%destination, "UDP send error: {}", e);
            }
        }
        trace!(%destination, "send loop finished");
    });

    tx
}

/// Received payloads, port header already stripped
pub type PacketReceiver = mpsc::Receiver<(Bytes, LinkAddress)>;

/// Start a background receive loop delivering datagrams addressed to `port`
pub fn start_receive_loop(socket: Arc<UdpSocket>, port: u16, buffer_size: usize) -> PacketReceiver {
    let (tx, rx) = mpsc::channel(buffer_size);

    tokio::spawn(async move {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        loop {
            match socket.recv_from(&mut buf).await {
                Ok((len, addr)) => {
                    let (header, payload) = match unframe(&buf[..len]) {
                        Ok(parts) => parts,
                        Err(e) => {
                            debug!(%addr, "dropping datagram: {}", e);
                            continue;
                        }
                    };
                    if header.destination_port != port {
                        trace!(%addr, port = header.destination_port, "datagram for other port");
                        continue;
                    }

                    let packet = Bytes::copy_from_slice(payload);
                    if tx.send((packet, LinkAddress::Udp(addr))).await.is_err() {
                        break; // Receiver dropped
                    }
                }
                Err(e) => {
                    warn!("UDP receive error: {}", e);
                }
            }
        }
    });

    rx
}
