use std::io;
use std::net::IpAddr;
use std::os::fd::AsFd;

use crate::configuration::Configuration;
use crate::error::Result;

/// Raw packet I/O on a virtual interface.
///
/// Delivery is datagram oriented: each call to [`recv`](PacketIo::recv)
/// returns exactly one packet and each call to [`send`](PacketIo::send)
/// writes one whole packet, there are no partial-packet semantics. The
/// `AsFd` bound exposes the descriptor for readiness polling.
pub trait PacketIo: AsFd {
    /// Read one packet of at most `buf.len()` bytes.
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write one complete packet.
    fn send(&mut self, buf: &[u8]) -> io::Result<usize>;
}

/// A configurable TUN/TAP device.
pub trait AbstractDevice: PacketIo {
    /// Apply the supplied configuration values, enabling the interface last.
    fn configure(&mut self, config: &Configuration) -> Result<()> {
        if let Some(ip) = config.address {
            self.set_address(ip)?;
        }

        if let Some(ip) = config.destination {
            self.set_destination(ip)?;
        }

        if let Some(ip) = config.netmask {
            self.set_netmask(ip)?;
        }

        if let Some(mtu) = config.mtu {
            self.set_mtu(mtu)?;
        }

        if let Some(enabled) = config.enabled {
            self.enabled(enabled)?;
        }

        Ok(())
    }

    /// Get the device name.
    fn tun_name(&self) -> Result<String>;

    /// Turn the interface on or off.
    fn enabled(&mut self, value: bool) -> Result<()>;

    /// Get the address.
    fn address(&self) -> Result<IpAddr>;

    /// Set the address.
    fn set_address(&mut self, value: IpAddr) -> Result<()>;

    /// Get the destination address.
    fn destination(&self) -> Result<IpAddr>;

    /// Set the destination address.
    fn set_destination(&mut self, value: IpAddr) -> Result<()>;

    /// Get the netmask.
    fn netmask(&self) -> Result<IpAddr>;

    /// Set the netmask.
    fn set_netmask(&mut self, value: IpAddr) -> Result<()>;

    /// Get the MTU.
    fn mtu(&self) -> Result<u16>;

    /// Set the MTU.
    fn set_mtu(&mut self, value: u16) -> Result<()>;

    /// Whether packets carry the 4-byte packet-information header.
    fn packet_information(&self) -> bool;
}
