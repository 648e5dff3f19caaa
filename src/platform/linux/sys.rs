//! Bindings to internal Linux stuff.

use libc::ifreq;
use nix::{ioctl_read_bad, ioctl_write_int, ioctl_write_ptr_bad};

ioctl_read_bad!(siocgifflags, libc::SIOCGIFFLAGS, ifreq);
ioctl_write_ptr_bad!(siocsifflags, libc::SIOCSIFFLAGS, ifreq);
ioctl_read_bad!(siocgifaddr, libc::SIOCGIFADDR, ifreq);
ioctl_write_ptr_bad!(siocsifaddr, libc::SIOCSIFADDR, ifreq);
ioctl_read_bad!(siocgifdstaddr, libc::SIOCGIFDSTADDR, ifreq);
ioctl_write_ptr_bad!(siocsifdstaddr, libc::SIOCSIFDSTADDR, ifreq);
ioctl_read_bad!(siocgifnetmask, libc::SIOCGIFNETMASK, ifreq);
ioctl_write_ptr_bad!(siocsifnetmask, libc::SIOCSIFNETMASK, ifreq);
ioctl_read_bad!(siocgifmtu, libc::SIOCGIFMTU, ifreq);
ioctl_write_ptr_bad!(siocsifmtu, libc::SIOCSIFMTU, ifreq);
ioctl_read_bad!(siocgifhwaddr, libc::SIOCGIFHWADDR, ifreq);
ioctl_write_ptr_bad!(siocsifhwaddr, libc::SIOCSIFHWADDR, ifreq);

ioctl_write_int!(tunsetiff, b'T', 202);
ioctl_write_int!(tunsetpersist, b'T', 203);
