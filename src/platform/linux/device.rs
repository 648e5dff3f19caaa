use std::ffi::{CStr, CString};
use std::io::{self, Read, Write};
use std::net::{IpAddr, SocketAddr};
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::io::{AsRawFd, RawFd};
use std::{mem, ptr};

use libc::{AF_INET, IFF_NO_PI, IFF_RUNNING, IFF_TAP, IFF_TUN, IFF_UP, IFNAMSIZ, O_RDWR,
    SOCK_DGRAM, c_char, c_short, ifreq};

use crate::configuration::{Configuration, Layer};
use crate::device::{AbstractDevice, PacketIo};
use crate::error::{ConfigField, Error, Result};
use crate::platform::linux::sys::*;
use crate::platform::posix::{Fd, rs_addr_to_sockaddr, sockaddr_to_rs_addr, sockaddr_union};

/// A TUN/TAP device using the Linux driver.
///
/// The interface and its kernel resources are released when the device is
/// dropped, on every exit path.
#[derive(Debug)]
pub struct Device {
    tun_name: String,
    tun: Fd,
    ctl: Fd,
    layer: Layer,
    packet_information: bool,
}

impl Device {
    /// Create a new `Device` for the given `Configuration`.
    pub fn new(config: &Configuration) -> Result<Self> {
        let layer = config.layer.unwrap_or_default();
        if layer != Layer::L3 && config.destination.is_some() {
            return Err(Error::DestinationNotSupported);
        }
        if config.mtu == Some(0) {
            return Err(Error::InvalidMtu);
        }
        for (value, field) in [
            (config.address, ConfigField::Address),
            (config.destination, ConfigField::Destination),
            (config.netmask, ConfigField::Netmask),
        ] {
            if let Some(value) = value {
                if !value.is_ipv4() {
                    return Err(invalid_family(field));
                }
            }
        }

        let dev = match config.tun_name.as_ref() {
            Some(tun_name) => {
                let tun_name = CString::new(tun_name.clone())?;
                if tun_name.as_bytes_with_nul().len() > IFNAMSIZ {
                    return Err(Error::NameTooLong);
                }
                Some(tun_name)
            }
            None => None,
        };

        let mut device = unsafe {
            let tun = Fd::new(libc::open(c"/dev/net/tun".as_ptr(), O_RDWR))
                .map_err(Error::DeviceCreation)?;

            let mut req: ifreq = mem::zeroed();
            if let Some(dev) = dev.as_ref() {
                ptr::copy_nonoverlapping(
                    dev.as_ptr(),
                    req.ifr_name.as_mut_ptr(),
                    dev.as_bytes().len(),
                );
            }

            let mode = match layer {
                Layer::L2 => IFF_TAP,
                Layer::L3 => IFF_TUN,
            };
            let pi = if config.platform_config.packet_information {
                0
            } else {
                IFF_NO_PI
            };
            req.ifr_ifru.ifru_flags = (mode | pi) as c_short;

            if let Err(err) = tunsetiff(tun.as_raw_fd(), &mut req as *mut _ as _) {
                return Err(Error::DeviceCreation(io::Error::from(err)));
            }

            let ctl = Fd::new(libc::socket(AF_INET, SOCK_DGRAM, 0))
                .map_err(Error::DeviceCreation)?;

            Device {
                tun_name: CStr::from_ptr(req.ifr_name.as_ptr())
                    .to_string_lossy()
                    .into(),
                tun,
                ctl,
                layer,
                packet_information: config.platform_config.packet_information,
            }
        };

        device.configure(config)?;

        Ok(device)
    }

    /// Prepare a request for this interface.
    unsafe fn request(&self) -> ifreq {
        let mut req: ifreq = unsafe { mem::zeroed() };
        unsafe {
            ptr::copy_nonoverlapping(
                self.tun_name.as_ptr() as *const c_char,
                req.ifr_name.as_mut_ptr(),
                self.tun_name.len(),
            );
        }
        req
    }

    /// Switch the device to non-blocking mode.
    pub fn set_nonblock(&self) -> io::Result<()> {
        self.tun.set_nonblock()
    }

    /// Make the interface persist after the descriptor is closed.
    pub fn persist(&mut self, value: bool) -> Result<()> {
        unsafe {
            if let Err(err) = tunsetpersist(self.tun.as_raw_fd(), value as _) {
                return Err(io::Error::from(err).into());
            }
        }
        Ok(())
    }

    /// Get the link-level (MAC) address. L2 devices only.
    pub fn hw_address(&self) -> Result<[u8; 6]> {
        if self.layer != Layer::L2 {
            return Err(Error::HwAddressNotSupported);
        }
        unsafe {
            let mut req = self.request();
            if let Err(err) = siocgifhwaddr(self.ctl.as_raw_fd(), &mut req) {
                return Err(io::Error::from(err).into());
            }
            let mut addr = [0u8; 6];
            for (dst, src) in addr.iter_mut().zip(req.ifr_ifru.ifru_hwaddr.sa_data.iter()) {
                *dst = *src as u8;
            }
            Ok(addr)
        }
    }

    /// Set the link-level (MAC) address. L2 devices only.
    pub fn set_hw_address(&mut self, value: [u8; 6]) -> Result<()> {
        if self.layer != Layer::L2 {
            return Err(Error::HwAddressNotSupported);
        }
        unsafe {
            let mut req = self.request();
            req.ifr_ifru.ifru_hwaddr.sa_family = libc::ARPHRD_ETHER;
            for (dst, src) in req.ifr_ifru.ifru_hwaddr.sa_data.iter_mut().zip(value.iter()) {
                *dst = *src as c_char;
            }
            if let Err(err) = siocsifhwaddr(self.ctl.as_raw_fd(), &req) {
                return Err(Error::Configuration {
                    field: ConfigField::HwAddress,
                    source: io::Error::from(err),
                });
            }
        }
        Ok(())
    }

    fn sockaddr_from(&self, value: IpAddr, field: ConfigField) -> Result<libc::sockaddr> {
        if !value.is_ipv4() {
            return Err(invalid_family(field));
        }
        Ok(unsafe { rs_addr_to_sockaddr(SocketAddr::new(value, 0)).addr })
    }
}

fn invalid_family(field: ConfigField) -> Error {
    Error::Configuration {
        field,
        source: io::Error::new(
            io::ErrorKind::InvalidInput,
            "only IPv4 addresses are supported",
        ),
    }
}

impl PacketIo for Device {
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.tun.read(buf)
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tun.write(buf)
    }
}

impl AbstractDevice for Device {
    fn tun_name(&self) -> Result<String> {
        Ok(self.tun_name.clone())
    }

    fn enabled(&mut self, value: bool) -> Result<()> {
        unsafe {
            let mut req = self.request();

            if let Err(err) = siocgifflags(self.ctl.as_raw_fd(), &mut req) {
                return Err(Error::Configuration {
                    field: ConfigField::State,
                    source: io::Error::from(err),
                });
            }

            if value {
                req.ifr_ifru.ifru_flags |= (IFF_UP | IFF_RUNNING) as c_short;
            } else {
                req.ifr_ifru.ifru_flags &= !(IFF_UP as c_short);
            }

            if let Err(err) = siocsifflags(self.ctl.as_raw_fd(), &req) {
                return Err(Error::Configuration {
                    field: ConfigField::State,
                    source: io::Error::from(err),
                });
            }

            Ok(())
        }
    }

    fn address(&self) -> Result<IpAddr> {
        unsafe {
            let mut req = self.request();
            if let Err(err) = siocgifaddr(self.ctl.as_raw_fd(), &mut req) {
                return Err(io::Error::from(err).into());
            }
            let sa = &req.ifr_ifru.ifru_addr as *const _ as *const sockaddr_union;
            Ok(sockaddr_to_rs_addr(&*sa).ok_or(Error::InvalidAddress)?.ip())
        }
    }

    fn set_address(&mut self, value: IpAddr) -> Result<()> {
        unsafe {
            let mut req = self.request();
            req.ifr_ifru.ifru_addr = self.sockaddr_from(value, ConfigField::Address)?;

            if let Err(err) = siocsifaddr(self.ctl.as_raw_fd(), &req) {
                return Err(Error::Configuration {
                    field: ConfigField::Address,
                    source: io::Error::from(err),
                });
            }

            Ok(())
        }
    }

    fn destination(&self) -> Result<IpAddr> {
        unsafe {
            let mut req = self.request();
            if let Err(err) = siocgifdstaddr(self.ctl.as_raw_fd(), &mut req) {
                return Err(io::Error::from(err).into());
            }
            let sa = &req.ifr_ifru.ifru_dstaddr as *const _ as *const sockaddr_union;
            Ok(sockaddr_to_rs_addr(&*sa).ok_or(Error::InvalidAddress)?.ip())
        }
    }

    fn set_destination(&mut self, value: IpAddr) -> Result<()> {
        if self.layer != Layer::L3 {
            return Err(Error::DestinationNotSupported);
        }
        unsafe {
            let mut req = self.request();
            req.ifr_ifru.ifru_dstaddr = self.sockaddr_from(value, ConfigField::Destination)?;

            if let Err(err) = siocsifdstaddr(self.ctl.as_raw_fd(), &req) {
                return Err(Error::Configuration {
                    field: ConfigField::Destination,
                    source: io::Error::from(err),
                });
            }

            Ok(())
        }
    }

    fn netmask(&self) -> Result<IpAddr> {
        unsafe {
            let mut req = self.request();
            if let Err(err) = siocgifnetmask(self.ctl.as_raw_fd(), &mut req) {
                return Err(io::Error::from(err).into());
            }
            let sa = &req.ifr_ifru.ifru_netmask as *const _ as *const sockaddr_union;
            Ok(sockaddr_to_rs_addr(&*sa).ok_or(Error::InvalidAddress)?.ip())
        }
    }

    fn set_netmask(&mut self, value: IpAddr) -> Result<()> {
        unsafe {
            let mut req = self.request();
            req.ifr_ifru.ifru_netmask = self.sockaddr_from(value, ConfigField::Netmask)?;

            if let Err(err) = siocsifnetmask(self.ctl.as_raw_fd(), &req) {
                return Err(Error::Configuration {
                    field: ConfigField::Netmask,
                    source: io::Error::from(err),
                });
            }

            Ok(())
        }
    }

    fn mtu(&self) -> Result<u16> {
        unsafe {
            let mut req = self.request();

            if let Err(err) = siocgifmtu(self.ctl.as_raw_fd(), &mut req) {
                return Err(io::Error::from(err).into());
            }

            req.ifr_ifru.ifru_mtu.try_into().map_err(|_| Error::InvalidMtu)
        }
    }

    fn set_mtu(&mut self, value: u16) -> Result<()> {
        if value == 0 {
            return Err(Error::InvalidMtu);
        }
        unsafe {
            let mut req = self.request();
            req.ifr_ifru.ifru_mtu = value as i32;

            if let Err(err) = siocsifmtu(self.ctl.as_raw_fd(), &req) {
                return Err(Error::Configuration {
                    field: ConfigField::Mtu,
                    source: io::Error::from(err),
                });
            }

            Ok(())
        }
    }

    fn packet_information(&self) -> bool {
        self.packet_information
    }
}

impl AsRawFd for Device {
    fn as_raw_fd(&self) -> RawFd {
        self.tun.as_raw_fd()
    }
}

impl AsFd for Device {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.tun.as_fd()
    }
}
