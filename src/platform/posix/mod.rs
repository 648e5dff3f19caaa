//! POSIX compliant support.

mod fd;
pub use self::fd::Fd;

mod sockaddr;
pub use self::sockaddr::{rs_addr_to_sockaddr, sockaddr_to_rs_addr, sockaddr_union};
