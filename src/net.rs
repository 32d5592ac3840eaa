// src/net.rs
use anyhow::Context;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};

/// Requested kernel receive buffer; the kernel may grant less.
pub const RECV_BUFFER_BYTES: usize = 16 * 1024 * 1024;

pub fn build_mcast_socket(group: Ipv4Addr, port: u16) -> anyhow::Result<UdpSocket> {
    let sock = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).context("socket")?;

    // Allow multiple listeners on one host.
    sock.set_reuse_address(true).context("SO_REUSEADDR")?;

    // Tolerate bursts; best effort only.
    let _ = sock.set_recv_buffer_size(RECV_BUFFER_BYTES);

    // Bind to wildcard:port, then join the group on the any-interface.
    let bind_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
    sock.bind(&bind_addr.into()).context("bind")?;
    sock.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)
        .context("join_multicast_v4")?;

    let sock: UdpSocket = sock.into();
    sock.set_nonblocking(true).context("set nonblocking")?;
    Ok(sock)
}
