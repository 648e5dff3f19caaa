//! Linux specific functionality.

pub mod sys;

mod device;
pub use self::device::Device;


use crate::configuration::Configuration;
use crate::error::Result;

/// Linux-only interface configuration.
#[derive(Copy, Clone, Debug)]
pub struct PlatformConfig {
    /// When enabled the first 4 bytes of each packet carry a header with
    /// flags and protocol type (no IFF_NO_PI).
    pub(crate) packet_information: bool,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        PlatformConfig {
            packet_information: false,
        }
    }
}

impl PlatformConfig {
    /// Enable or disable the packet-information header.
    pub fn packet_information(&mut self, value: bool) -> &mut Self {
        self.packet_information = value;
        self
    }
}

/// Create a TUN/TAP device from the given configuration.
pub fn create(configuration: &Configuration) -> Result<Device> {
    Device::new(configuration)
}
