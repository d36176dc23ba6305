//! Async glue between the UDP adapter and the service

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use denm_core::DenmResult;
use denm_transport::{start_receive_loop, PacketReceiver, UdpTransport};

use crate::DenService;

/// Channel depth between the socket task and the service
pub const RECEIVE_BUFFER: usize = 256;

/// Feed received payloads into `service` until the channel closes
///
/// Returns the number of messages that were delivered.
pub async fn run_receive_loop(service: &DenService, mut rx: PacketReceiver) -> u64 {
    let mut delivered = 0u64;
    while let Some((payload, from)) = rx.recv().await {
        if service.receive(&payload, from).is_delivered() {
            delivered += 1;
        }
    }
    debug!(delivered, "receive loop finished");
    delivered
}

/// Spawn [`run_receive_loop`] on the current runtime
pub fn spawn_receive_loop(service: Arc<DenService>, rx: PacketReceiver) -> JoinHandle<u64> {
    tokio::spawn(async move { run_receive_loop(&service, rx).await })
}

/// Bind a UDP socket, attach it as the service transport and start receiving
///
/// Outgoing messages go to `destination`; inbound datagrams are accepted on
/// the configured destination port.
pub async fn attach_udp(
    service: &Arc<DenService>,
    bind: SocketAddr,
    destination: SocketAddr,
) -> DenmResult<(SocketAddr, JoinHandle<u64>)> {
    let transport = UdpTransport::bind(bind, destination).await?;
    let local = transport.local_addr();
    let rx = start_receive_loop(transport.socket(), service.destination_port(), RECEIVE_BUFFER);

    service.set_transport(Arc::new(transport));
    info!(%local, %destination, "UDP transport attached");
    Ok((local, spawn_receive_loop(Arc::clone(service), rx)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{event_at, from_station, Station, T0};
    use denm_transport::{unframe, MAX_DATAGRAM_SIZE};
    use std::time::Duration;
    use tokio::net::UdpSocket;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_receive_loop_counts_deliveries() {
        let a = Station::new(1);
        let b = Station::on(2, &a.sim);
        a.service.trigger(&event_at(T0, 30)).unwrap();
        a.service.trigger(&event_at(T0, 30)).unwrap();

        let (tx, rx) = mpsc::channel(8);
        for payload in a.transport.payloads() {
            tx.send((payload.clone(), from_station(1))).await.unwrap();
            tx.send((payload, from_station(1))).await.unwrap();
        }
        drop(tx);

        let delivered = spawn_receive_loop(b.service.clone(), rx).await.unwrap();
        assert_eq!(delivered, 2);
        assert_eq!(b.service.receiving_len(), 2);
        assert_eq!(b.service.stats().dropped_duplicate, 2);
    }

    #[tokio::test]
    async fn test_first_trigger_after_attach_reaches_the_wire() {
        let sink = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let a = Station::new(1);
        let (local, _loop) = attach_udp(
            &a.service,
            "127.0.0.1:0".parse().unwrap(),
            sink.local_addr().unwrap(),
        )
        .await
        .unwrap();

        a.service.trigger(&event_at(T0, 60)).unwrap();

        let stats = a.service.stats();
        assert_eq!(stats.transmissions, 1);
        assert_eq!(stats.transmit_failures, 0);

        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        let (len, from) = tokio::time::timeout(Duration::from_secs(2), sink.recv_from(&mut buf))
            .await
            .expect("timeout")
            .unwrap();
        assert_eq!(from, local);
        let (header, payload) = unframe(&buf[..len]).unwrap();
        assert_eq!(header.destination_port, a.service.destination_port());
        assert!(denm_wire::is_denm(payload));
    }
}
