use std::net::{IpAddr, Ipv4Addr};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};

use udptun::session::{self, SessionConfig};
use udptun::{DEFAULT_MTU, Layer};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    /// Layer 3, raw IP packets.
    Tun,
    /// Layer 2, Ethernet frames.
    Tap,
}

/// Relay raw packets between a TUN/TAP interface and a single remote peer
/// over UDP.
#[derive(Debug, Parser)]
#[command(name = "udptun", version)]
struct Args {
    /// Interface mode
    #[arg(long, value_enum)]
    mode: Mode,

    /// Interface name (kernel picks one when omitted)
    #[arg(long)]
    tun_name: Option<String>,

    /// Interface local address
    #[arg(long)]
    tun_addr: IpAddr,

    /// Interface point-to-point peer address (tun mode only)
    #[arg(long, required_if_eq("mode", "tun"))]
    tun_dstaddr: Option<IpAddr>,

    /// Interface netmask
    #[arg(long, default_value = "255.255.255.0")]
    tun_netmask: IpAddr,

    /// Interface MTU
    #[arg(long, default_value_t = DEFAULT_MTU)]
    tun_mtu: u16,

    /// Interface hardware address, aa:bb:cc:dd:ee:ff (tap mode only)
    #[arg(long, value_parser = parse_hwaddr)]
    tun_hwaddr: Option<[u8; 6]>,

    /// Local bind address
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    local_addr: IpAddr,

    /// Local bind port
    #[arg(long, default_value_t = 12000)]
    local_port: u16,

    /// Remote peer address, the single authorized correspondent
    #[arg(long)]
    remote_addr: IpAddr,

    /// Remote peer port
    #[arg(long)]
    remote_port: u16,
}

fn parse_hwaddr(s: &str) -> Result<[u8; 6], String> {
    let mut addr = [0u8; 6];
    let mut octets = s.split(':');
    for byte in addr.iter_mut() {
        let octet = octets.next().ok_or_else(|| format!("bad MAC address: {s}"))?;
        *byte = u8::from_str_radix(octet, 16).map_err(|_| format!("bad MAC address: {s}"))?;
    }
    if octets.next().is_some() {
        return Err(format!("bad MAC address: {s}"));
    }
    Ok(addr)
}

fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();

    let config = SessionConfig {
        layer: match args.mode {
            Mode::Tun => Layer::L3,
            Mode::Tap => Layer::L2,
        },
        tun_name: args.tun_name,
        tun_addr: args.tun_addr,
        tun_dstaddr: args.tun_dstaddr,
        tun_netmask: args.tun_netmask,
        tun_mtu: args.tun_mtu,
        tun_hwaddr: args.tun_hwaddr,
        local_addr: args.local_addr,
        local_port: args.local_port,
        remote_addr: args.remote_addr,
        remote_port: args.remote_port,
    };

    if let Err(err) = session::run(config) {
        eprintln!("udptun: {err}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hwaddr_parsing() {
        assert_eq!(
            parse_hwaddr("02:00:5e:10:00:01").unwrap(),
            [0x02, 0x00, 0x5e, 0x10, 0x00, 0x01]
        );
        assert!(parse_hwaddr("02:00:5e:10:00").is_err());
        assert!(parse_hwaddr("02:00:5e:10:00:01:ff").is_err());
        assert!(parse_hwaddr("zz:00:5e:10:00:01").is_err());
    }

    #[test]
    fn dstaddr_required_in_tun_mode() {
        let base = [
            "udptun",
            "--mode",
            "tun",
            "--tun-addr",
            "10.8.0.1",
            "--remote-addr",
            "203.0.113.5",
            "--remote-port",
            "12000",
        ];
        assert!(Args::try_parse_from(base).is_err());

        let mut with_dst = base.to_vec();
        with_dst.extend_from_slice(&["--tun-dstaddr", "10.8.0.2"]);
        let args = Args::try_parse_from(with_dst).unwrap();
        assert_eq!(args.local_port, 12000);
        assert_eq!(args.tun_netmask, "255.255.255.0".parse::<IpAddr>().unwrap());

        // tap mode has no destination
        let tap = [
            "udptun",
            "--mode",
            "tap",
            "--tun-addr",
            "10.8.0.1",
            "--remote-addr",
            "203.0.113.5",
            "--remote-port",
            "12000",
        ];
        assert!(Args::try_parse_from(tap).is_ok());
    }
}
