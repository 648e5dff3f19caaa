//! Readiness-driven packet forwarding between a virtual interface and a
//! remote UDP peer.

use std::io;
use std::os::fd::AsFd;

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};

use crate::device::PacketIo;
use crate::error::Result;
use crate::transport::Transport;

/// Upper bound on a single datagram payload from the socket.
const MAX_DATAGRAM: usize = 65535;

/// Single in-flight packet for one forwarding direction.
///
/// At most one packet may be pending per direction: the source side is not
/// read again until the previous packet has been handed to the destination
/// side, which keeps forwarding strictly FIFO with no duplication.
#[derive(Default)]
struct Pending(Option<Vec<u8>>);

impl Pending {
    fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    fn fill(&mut self, payload: &[u8]) {
        debug_assert!(self.0.is_none(), "a payload is already pending");
        self.0 = Some(payload.to_vec());
    }

    fn payload(&self) -> Option<&[u8]> {
        self.0.as_deref()
    }

    fn clear(&mut self) {
        self.0 = None;
    }
}

/// Forwards packets between a device and a transport until a fatal error.
///
/// Single-threaded: the poll call is the only blocking point, every I/O
/// operation after a readiness signal runs non-blocking. Both endpoints are
/// exclusively owned and dropped when the relay is, whichever way `run`
/// exits.
pub struct Relay<D: PacketIo> {
    device: D,
    transport: Transport,
    mtu: usize,
}

impl<D: PacketIo> Relay<D> {
    pub fn new(device: D, transport: Transport, mtu: usize) -> Self {
        Relay {
            device,
            transport,
            mtu,
        }
    }

    /// Run the forwarding loop.
    ///
    /// Interrupted waits and reads are retried from the top of the loop;
    /// any other failure terminates the relay and propagates to the caller.
    pub fn run(&mut self) -> Result<()> {
        // device -> socket and socket -> device in-flight slots.
        let mut to_peer = Pending::default();
        let mut to_device = Pending::default();

        let mut buf = vec![0u8; MAX_DATAGRAM.max(self.mtu)];

        loop {
            let mut device_interest = PollFlags::empty();
            let mut socket_interest = PollFlags::empty();

            if to_peer.is_empty() {
                device_interest |= PollFlags::POLLIN;
            } else {
                socket_interest |= PollFlags::POLLOUT;
            }
            if to_device.is_empty() {
                socket_interest |= PollFlags::POLLIN;
            } else {
                device_interest |= PollFlags::POLLOUT;
            }

            let (device_ready, socket_ready) = {
                let mut fds = [
                    PollFd::new(self.device.as_fd(), device_interest),
                    PollFd::new(self.transport.as_fd(), socket_interest),
                ];

                match poll(&mut fds, PollTimeout::NONE) {
                    Ok(_) => {}
                    Err(Errno::EINTR) => continue,
                    Err(err) => return Err(io::Error::from(err).into()),
                }

                (
                    fds[0].revents().unwrap_or_else(PollFlags::empty),
                    fds[1].revents().unwrap_or_else(PollFlags::empty),
                )
            };

            if failed(device_ready) {
                return Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "virtual interface is gone",
                )
                .into());
            }
            if failed(socket_ready) {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "socket is gone").into());
            }

            if device_ready.contains(PollFlags::POLLIN) {
                let mtu = self.mtu;
                match self.device.recv(&mut buf[..mtu]) {
                    Ok(0) => {
                        return Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "virtual interface closed",
                        )
                        .into());
                    }
                    Ok(n) => to_peer.fill(&buf[..n]),
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(err) if err.kind() == io::ErrorKind::WouldBlock => {}
                    Err(err) => return Err(err.into()),
                }
            }

            if socket_ready.contains(PollFlags::POLLIN) {
                match self.transport.recv(&mut buf) {
                    // A zero length datagram cannot be told apart from
                    // "nothing to send", treat it as the latter.
                    Ok(Some(0)) | Ok(None) => {}
                    Ok(Some(n)) => to_device.fill(&buf[..n]),
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(err) if err.kind() == io::ErrorKind::WouldBlock => {}
                    Err(err) => return Err(err.into()),
                }
            }

            if device_ready.contains(PollFlags::POLLOUT) {
                if let Some(payload) = to_device.payload() {
                    match self.device.send(payload) {
                        Ok(n) => {
                            log::trace!("{n} bytes to device");
                            to_device.clear();
                        }
                        Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                        Err(err) if err.kind() == io::ErrorKind::WouldBlock => {}
                        Err(err) => return Err(err.into()),
                    }
                }
            }

            if socket_ready.contains(PollFlags::POLLOUT) {
                if let Some(payload) = to_peer.payload() {
                    match self.transport.send(payload) {
                        Ok(n) => {
                            log::trace!("{n} bytes to {}", self.transport.peer());
                            to_peer.clear();
                        }
                        Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                        Err(err) if err.kind() == io::ErrorKind::WouldBlock => {}
                        Err(err) => return Err(err.into()),
                    }
                }
            }
        }
    }
}

/// Whether readiness flags indicate the descriptor is unusable.
fn failed(revents: PollFlags) -> bool {
    revents.intersects(PollFlags::POLLERR | PollFlags::POLLNVAL)
        || (revents.contains(PollFlags::POLLHUP) && !revents.contains(PollFlags::POLLIN))
}

#[cfg(test)]
mod tests {
    use std::net::{SocketAddr, UdpSocket};
    use std::os::fd::{AsFd, BorrowedFd};
    use std::os::unix::net::UnixDatagram;
    use std::sync::mpsc;
    use std::thread::{self, JoinHandle};
    use std::time::Duration;

    use nix::sys::pthread::{Pthread, pthread_kill, pthread_self};
    use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};

    use super::*;
    use crate::error::Error;

    const TIMEOUT: Duration = Duration::from_secs(5);

    /// Datagram socket standing in for the kernel virtual interface.
    struct FakeTun(UnixDatagram);

    impl AsFd for FakeTun {
        fn as_fd(&self) -> BorrowedFd<'_> {
            self.0.as_fd()
        }
    }

    impl PacketIo for FakeTun {
        fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.0.recv(buf)
        }

        fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.send(buf)
        }
    }

    struct Harness {
        relay: JoinHandle<Result<()>>,
        /// Thread the relay loop runs on.
        relay_thread: Pthread,
        /// Our end of the fake device, packets written here enter the relay.
        device: UnixDatagram,
        /// The authorized remote peer.
        peer: UdpSocket,
        /// Where the relay's transport is bound.
        transport_addr: SocketAddr,
    }

    fn harness() -> Harness {
        let (ours, theirs) = UnixDatagram::pair().unwrap();
        ours.set_read_timeout(Some(TIMEOUT)).unwrap();
        theirs.set_nonblocking(true).unwrap();

        let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
        peer.set_read_timeout(Some(TIMEOUT)).unwrap();

        let transport = Transport::bind(
            "127.0.0.1:0".parse().unwrap(),
            peer.local_addr().unwrap(),
        )
        .unwrap();
        let transport_addr = transport.local_addr().unwrap();

        let mut relay = Relay::new(FakeTun(theirs), transport, 1500);
        let (tx, rx) = mpsc::channel();
        let relay = thread::spawn(move || {
            tx.send(pthread_self()).unwrap();
            relay.run()
        });
        let relay_thread = rx.recv().unwrap();

        Harness {
            relay,
            relay_thread,
            device: ours,
            peer,
            transport_addr,
        }
    }

    /// Stop the relay by simulating a closed interface: a zero length read
    /// on the device side is fatal.
    fn shutdown(h: Harness) {
        h.device.send(&[]).unwrap();
        assert!(h.relay.join().unwrap().is_err());
    }

    #[test]
    fn device_to_peer_fifo() {
        let h = harness();

        let packets: Vec<Vec<u8>> = (0u8..8).map(|i| vec![i; 20 + i as usize]).collect();
        for p in &packets {
            h.device.send(p).unwrap();
        }

        let mut buf = [0u8; 2048];
        for expected in &packets {
            let n = h.peer.recv(&mut buf).unwrap();
            assert_eq!(&buf[..n], expected.as_slice());
        }

        shutdown(h);
    }

    #[test]
    fn peer_to_device_forwarded_verbatim() {
        let h = harness();

        let payload = [0xabu8; 40];
        h.peer.send_to(&payload, h.transport_addr).unwrap();

        let mut buf = [0u8; 2048];
        let n = h.device.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], &payload);

        shutdown(h);
    }

    #[test]
    fn unauthorized_datagram_never_reaches_device() {
        let h = harness();

        let stranger = UdpSocket::bind("127.0.0.1:0").unwrap();
        stranger.send_to(&[0x55u8; 40], h.transport_addr).unwrap();
        h.peer.send_to(b"marker", h.transport_addr).unwrap();

        // The stranger's datagram arrived first; the first packet out of the
        // device side must still be the authorized one.
        let mut buf = [0u8; 2048];
        let n = h.device.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"marker");

        shutdown(h);
    }

    #[test]
    fn zero_length_datagram_is_ignored() {
        let h = harness();

        h.peer.send_to(&[], h.transport_addr).unwrap();
        h.peer.send_to(b"after-empty", h.transport_addr).unwrap();

        let mut buf = [0u8; 2048];
        let n = h.device.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"after-empty");

        shutdown(h);
    }

    #[test]
    fn relay_stops_when_device_closes() {
        let h = harness();

        h.device.send(&[]).unwrap();
        let err = h.relay.join().unwrap().unwrap_err();
        assert!(!err.is_interrupted());
        assert!(matches!(err, Error::Io(_)));
    }

    extern "C" fn ignore_signal(_: libc::c_int) {}

    /// Install a no-op SIGUSR1 handler without SA_RESTART, so a blocked
    /// wait in the signalled thread fails with EINTR instead of being
    /// restarted by the kernel.
    fn install_interrupter() {
        let action = SigAction::new(
            SigHandler::Handler(ignore_signal),
            SaFlags::empty(),
            SigSet::empty(),
        );
        unsafe { sigaction(Signal::SIGUSR1, &action) }.unwrap();
    }

    #[test]
    fn interrupted_wait_resumes_forwarding() {
        install_interrupter();
        let h = harness();

        // Forward one packet so the relay is known to be up and parked in
        // its wait again.
        let mut buf = [0u8; 2048];
        h.device.send(b"before").unwrap();
        let n = h.peer.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"before");

        // Interrupt the blocked wait repeatedly; the relay must absorb the
        // EINTRs rather than treat them as fatal.
        for _ in 0..3 {
            pthread_kill(h.relay_thread, Signal::SIGUSR1).unwrap();
            thread::sleep(Duration::from_millis(20));
        }
        assert!(!h.relay.is_finished());

        // Both directions still work after the interruptions.
        h.device.send(b"outbound-after").unwrap();
        let n = h.peer.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"outbound-after");

        h.peer.send_to(b"inbound-after", h.transport_addr).unwrap();
        let n = h.device.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"inbound-after");

        shutdown(h);
    }

    #[test]
    fn both_directions_interleaved() {
        let h = harness();

        let mut buf = [0u8; 2048];
        for i in 0u8..5 {
            let outbound = [i; 24];
            h.device.send(&outbound).unwrap();

            let inbound = [i ^ 0xff; 32];
            h.peer.send_to(&inbound, h.transport_addr).unwrap();

            let n = h.peer.recv(&mut buf).unwrap();
            assert_eq!(&buf[..n], &outbound);

            let n = h.device.recv(&mut buf).unwrap();
            assert_eq!(&buf[..n], &inbound);
        }

        shutdown(h);
    }
}
