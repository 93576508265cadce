use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;

/// One byte heard on the IR medium, stamped on arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrEvent {
    pub sender: u16,
    pub byte: u8,
    pub at: Instant,
}

/// Transmit side of the IR hardware. Each byte goes out tagged with the
/// transmitter's 16-bit address; pacing is the caller's job.
pub trait IrTransceiver {
    fn transmit(&mut self, address: u16, byte: u8) -> std::io::Result<()>;
}

/// Encode one IR transmission as a simulated-medium datagram.
pub fn encode_datagram(address: u16, byte: u8) -> [u8; 3] {
    let [hi, lo] = address.to_be_bytes();
    [hi, lo, byte]
}

/// Decode a simulated-medium datagram. Anything but exactly three bytes is
/// noise.
pub fn decode_datagram(data: &[u8]) -> Option<(u16, u8)> {
    match data {
        [hi, lo, byte] => Some((u16::from_be_bytes([*hi, *lo]), *byte)),
        _ => None,
    }
}

/// IR medium simulated over UDP: every byte is sent to each configured peer.
pub struct UdpTransceiver {
    socket: Arc<UdpSocket>,
    peers: Vec<SocketAddr>,
}

impl UdpTransceiver {
    pub async fn bind(addr: SocketAddr, peers: Vec<SocketAddr>) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self {
            socket: Arc::new(socket),
            peers,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Forward every datagram heard into `tx` until the receiver is dropped.
    pub fn spawn_receiver(&self, tx: mpsc::Sender<IrEvent>) -> tokio::task::JoinHandle<()> {
        let socket = Arc::clone(&self.socket);
        tokio::spawn(async move {
            let mut buf = [0u8; 16];
            loop {
                let (len, from) = match socket.recv_from(&mut buf).await {
                    Ok(received) => received,
                    Err(e) => {
                        tracing::warn!(error = %e, "IR receive failed");
                        continue;
                    },
                };
                let Some((sender, byte)) = decode_datagram(&buf[..len]) else {
                    tracing::trace!(%from, len, "ignoring malformed IR datagram");
                    continue;
                };
                let event = IrEvent {
                    sender,
                    byte,
                    at: Instant::now(),
                };
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        })
    }
}

impl IrTransceiver for UdpTransceiver {
    fn transmit(&mut self, address: u16, byte: u8) -> std::io::Result<()> {
        let datagram = encode_datagram(address, byte);
        let mut result = Ok(());
        for peer in &self.peers {
            if let Err(e) = self.socket.try_send_to(&datagram, *peer) {
                tracing::debug!(%peer, error = %e, "IR transmit failed");
                result = Err(e);
            }
        }
        result
    }
}

/// Records every transmitted byte.
#[derive(Debug, Default)]
pub struct MemoryTransceiver {
    pub sent: Vec<(u16, u8)>,
}

impl MemoryTransceiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transmitted bytes without the address tag.
    pub fn bytes(&self) -> Vec<u8> {
        self.sent.iter().map(|(_, byte)| *byte).collect()
    }
}

impl IrTransceiver for MemoryTransceiver {
    fn transmit(&mut self, address: u16, byte: u8) -> std::io::Result<()> {
        self.sent.push((address, byte));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn datagram_layout() {
        assert_eq!(encode_datagram(0x1234, 7), [0x12, 0x34, 7]);
        assert_eq!(decode_datagram(&[0x12, 0x34, 7]), Some((0x1234, 7)));
        assert_eq!(decode_datagram(&[1, 2]), None);
        assert_eq!(decode_datagram(&[1, 2, 3, 4]), None);
    }

    #[tokio::test]
    async fn udp_bytes_reach_the_peer() {
        let loopback: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let receiver = UdpTransceiver::bind(loopback, vec![]).await.unwrap();
        let receiver_addr = receiver.local_addr().unwrap();
        let mut sender = UdpTransceiver::bind(loopback, vec![receiver_addr])
            .await
            .unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        let _task = receiver.spawn_receiver(tx);

        sender.transmit(4242, 1).unwrap();
        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.sender, 4242);
        assert_eq!(event.byte, 1);
    }

    #[test]
    fn memory_transceiver_records() {
        let mut t = MemoryTransceiver::new();
        t.transmit(9, 1).unwrap();
        t.transmit(9, 2).unwrap();
        assert_eq!(t.bytes(), vec![1, 2]);
        assert_eq!(t.sent[0], (9, 1));
    }
}
