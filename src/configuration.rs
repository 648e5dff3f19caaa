use std::net::IpAddr;

use crate::platform::PlatformConfig;

/// OSI layer the interface operates at.
///
/// A layer 3 (TUN) device exchanges raw IP packets, a layer 2 (TAP) device
/// exchanges Ethernet frames.
#[derive(Clone, Copy, Default, Debug, Eq, PartialEq)]
pub enum Layer {
    L2,
    #[default]
    L3,
}

/// Configuration builder for a virtual interface.
#[derive(Clone, Default, Debug)]
pub struct Configuration {
    pub(crate) tun_name: Option<String>,
    pub(crate) platform_config: PlatformConfig,
    pub(crate) address: Option<IpAddr>,
    pub(crate) destination: Option<IpAddr>,
    pub(crate) netmask: Option<IpAddr>,
    pub(crate) mtu: Option<u16>,
    pub(crate) enabled: Option<bool>,
    pub(crate) layer: Option<Layer>,
}

impl Configuration {
    /// Access the platform-dependent configuration.
    pub fn platform_config<F>(&mut self, f: F) -> &mut Self
    where
        F: FnOnce(&mut PlatformConfig),
    {
        f(&mut self.platform_config);
        self
    }

    /// Set the interface name.
    pub fn tun_name<S: AsRef<str>>(&mut self, name: S) -> &mut Self {
        self.tun_name = Some(name.as_ref().into());
        self
    }

    /// Set the address.
    pub fn address(&mut self, value: IpAddr) -> &mut Self {
        self.address = Some(value);
        self
    }

    /// Set the destination (point-to-point peer) address.
    ///
    /// Only meaningful for [`Layer::L3`] devices; an L2 device with a
    /// destination fails at creation time.
    pub fn destination(&mut self, value: IpAddr) -> &mut Self {
        self.destination = Some(value);
        self
    }

    /// Set the netmask.
    pub fn netmask(&mut self, value: IpAddr) -> &mut Self {
        self.netmask = Some(value);
        self
    }

    /// Set the MTU.
    pub fn mtu(&mut self, value: u16) -> &mut Self {
        self.mtu = Some(value);
        self
    }

    /// Bring the interface up once configured.
    pub fn up(&mut self) -> &mut Self {
        self.enabled = Some(true);
        self
    }

    /// Leave the interface down once configured.
    pub fn down(&mut self) -> &mut Self {
        self.enabled = Some(false);
        self
    }

    /// Set the OSI layer of operation.
    pub fn layer(&mut self, value: Layer) -> &mut Self {
        self.layer = Some(value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_accumulates() {
        let mut config = Configuration::default();
        config
            .tun_name("tun7")
            .layer(Layer::L3)
            .address("10.8.0.1".parse().unwrap())
            .destination("10.8.0.2".parse().unwrap())
            .netmask("255.255.255.0".parse().unwrap())
            .mtu(1400)
            .up();

        assert_eq!(config.tun_name.as_deref(), Some("tun7"));
        assert_eq!(config.layer, Some(Layer::L3));
        assert_eq!(config.mtu, Some(1400));
        assert_eq!(config.enabled, Some(true));
        assert!(config.destination.is_some());
    }

    #[test]
    fn layer_defaults_to_l3() {
        assert_eq!(Layer::default(), Layer::L3);
        assert_eq!(Configuration::default().layer, None);
    }
}
