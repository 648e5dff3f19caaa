//! Session construction and teardown around the forwarding relay.

use std::net::{IpAddr, SocketAddr};

use crate::configuration::{Configuration, Layer};
use crate::device::AbstractDevice;
use crate::error::Result;
use crate::platform;
use crate::relay::Relay;
use crate::transport::Transport;

/// Everything needed to stand up one tunnel, as gathered from the command
/// line.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub layer: Layer,
    pub tun_name: Option<String>,
    pub tun_addr: IpAddr,
    /// Point-to-point peer address of the interface, layer 3 only.
    pub tun_dstaddr: Option<IpAddr>,
    pub tun_netmask: IpAddr,
    pub tun_mtu: u16,
    /// Hardware address for the interface, layer 2 only.
    pub tun_hwaddr: Option<[u8; 6]>,
    pub local_addr: IpAddr,
    pub local_port: u16,
    pub remote_addr: IpAddr,
    pub remote_port: u16,
}

/// Build the device and the transport, then run the relay until it fails.
///
/// The device and the socket are owned by the relay, so both are released
/// whichever way the loop exits.
pub fn run(config: SessionConfig) -> Result<()> {
    let mut device_config = Configuration::default();
    device_config
        .layer(config.layer)
        .address(config.tun_addr)
        .netmask(config.tun_netmask)
        .mtu(config.tun_mtu);
    if let Some(dstaddr) = config.tun_dstaddr {
        device_config.destination(dstaddr);
    }
    if let Some(name) = config.tun_name.as_ref() {
        device_config.tun_name(name);
    }

    let mut device = platform::create(&device_config)?;
    // The hardware address can only change while the interface is down;
    // activation comes after all configuration.
    if let Some(hwaddr) = config.tun_hwaddr {
        device.set_hw_address(hwaddr)?;
    }
    device.enabled(true)?;
    device.set_nonblock()?;

    let local = SocketAddr::new(config.local_addr, config.local_port);
    let remote = SocketAddr::new(config.remote_addr, config.remote_port);
    let transport = Transport::bind(local, remote)?;

    let mtu = device.mtu()? as usize;
    log::info!(
        "interface {} is up (mtu {mtu}), relaying {} <-> {remote}",
        device.tun_name()?,
        transport.local_addr()?,
    );

    Relay::new(device, transport, mtu).run()
}
