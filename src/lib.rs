//! Point-to-point tunnelling over UDP through a TUN/TAP virtual interface.
//!
//! The crate has two halves. The device half creates and configures a
//! kernel virtual network interface and performs raw packet I/O on it:
//! [`Configuration`] describes the interface, [`platform::create`] builds
//! the platform device behind the [`AbstractDevice`] trait. The relay half
//! ties such a device to a [`Transport`] (a UDP socket locked to a single
//! remote peer) with a readiness-driven loop, [`Relay`], that moves one
//! packet per direction per iteration and never reorders or duplicates.
//!
//! [`session::run`] wires both halves together from a [`session::SessionConfig`].

mod error;
pub use error::{ConfigField, Error, Result};

mod configuration;
pub use configuration::{Configuration, Layer};

mod device;
pub use device::{AbstractDevice, PacketIo};

pub mod platform;
#[cfg(target_os = "linux")]
pub use platform::create;

mod transport;
pub use transport::Transport;

mod relay;
pub use relay::Relay;

pub mod session;

/// MTU applied to the interface when none is requested.
pub const DEFAULT_MTU: u16 = 1500;
