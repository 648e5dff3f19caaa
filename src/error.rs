use std::{ffi, fmt, io, net::SocketAddr};

use thiserror::Error;

/// Interface attribute being applied when a configuration call fails.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConfigField {
    Address,
    Destination,
    Netmask,
    Mtu,
    HwAddress,
    State,
}

impl fmt::Display for ConfigField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConfigField::Address => "address",
            ConfigField::Destination => "destination address",
            ConfigField::Netmask => "netmask",
            ConfigField::Mtu => "mtu",
            ConfigField::HwAddress => "hardware address",
            ConfigField::State => "link state",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("interface name too long")]
    NameTooLong,

    #[error("invalid interface name")]
    InvalidName,

    #[error("invalid address")]
    InvalidAddress,

    #[error("bad MTU, should be > 0")]
    InvalidMtu,

    #[error("destination address is only supported on layer 3 devices")]
    DestinationNotSupported,

    #[error("hardware address is only supported on layer 2 devices")]
    HwAddressNotSupported,

    #[error("failed to create device: {0}")]
    DeviceCreation(#[source] io::Error),

    #[error("failed to set {field}: {source}")]
    Configuration {
        field: ConfigField,
        #[source]
        source: io::Error,
    },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Nul(#[from] ffi::NulError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Whether the failure was a signal interruption, in which case the
    /// enclosing readiness wait should simply be retried.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Error::Io(err) if err.kind() == io::ErrorKind::Interrupted)
    }
}
