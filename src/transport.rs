use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::os::fd::{AsFd, BorrowedFd};

use crate::error::{Error, Result};

/// Datagram endpoint exchanging packets with a single authorized peer.
///
/// Each datagram carries exactly one raw packet, no framing: message
/// boundaries are datagram boundaries. Datagrams arriving from any other
/// address are discarded at this boundary and never reach the device.
#[derive(Debug)]
pub struct Transport {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl Transport {
    /// Bind the local endpoint and fix the authorized remote peer.
    pub fn bind(local: SocketAddr, peer: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(local).map_err(|source| Error::Bind {
            addr: local,
            source,
        })?;
        socket.set_nonblocking(true)?;
        Ok(Transport { socket, peer })
    }

    /// The address the socket is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// The authorized remote peer.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Receive one datagram. Returns `None` when the sender is not the
    /// authorized peer.
    pub fn recv(&self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        let (n, from) = self.socket.recv_from(buf)?;
        if from != self.peer {
            log::debug!("dropping {n} byte datagram from unauthorized sender {from}");
            return Ok(None);
        }
        Ok(Some(n))
    }

    /// Send one datagram to the authorized peer. All-or-nothing.
    pub fn send(&self, buf: &[u8]) -> io::Result<usize> {
        self.socket.send_to(buf, self.peer)
    }
}

impl AsFd for Transport {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.socket.as_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_twice_fails() {
        let local: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let peer: SocketAddr = "127.0.0.1:9".parse().unwrap();

        let first = Transport::bind(local, peer).unwrap();
        let taken = first.local_addr().unwrap();

        match Transport::bind(taken, peer) {
            Err(Error::Bind { addr, .. }) => assert_eq!(addr, taken),
            other => panic!("expected bind error, got {other:?}"),
        }
    }

    #[test]
    fn filters_unauthorized_sender() {
        let any: SocketAddr = "127.0.0.1:0".parse().unwrap();

        let peer = UdpSocket::bind(any).unwrap();
        let stranger = UdpSocket::bind(any).unwrap();
        let transport = Transport::bind(any, peer.local_addr().unwrap()).unwrap();
        let target = transport.local_addr().unwrap();

        stranger.send_to(b"nope", target).unwrap();
        peer.send_to(b"yes", target).unwrap();

        // Drain in arrival order: the stranger's datagram is dropped.
        let mut buf = [0u8; 64];
        let mut seen = Vec::new();
        for _ in 0..20 {
            match transport.recv(&mut buf) {
                Ok(Some(n)) => seen.push(buf[..n].to_vec()),
                Ok(None) => {}
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    if !seen.is_empty() {
                        break;
                    }
                    std::thread::sleep(std::time::Duration::from_millis(50));
                }
                Err(err) => panic!("recv failed: {err}"),
            }
        }
        assert_eq!(seen, vec![b"yes".to_vec()]);
    }
}
