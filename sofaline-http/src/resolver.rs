use std::io;
use std::net::{SocketAddr, ToSocketAddrs};

/// Host resolution hook. Runs synchronously on the submitting thread;
/// swap it out to stub DNS in tests or to plug in a caching resolver.
pub type Resolver = Box<dyn Fn(&str, u16) -> io::Result<Vec<SocketAddr>>>;

/// The system resolver, via `ToSocketAddrs`.
pub(crate) fn std_resolver() -> Resolver {
    Box::new(|host, port| Ok((host, port).to_socket_addrs()?.collect()))
}

/// Prefer the first IPv4 address, falling back to the first of any
/// family.
pub(crate) fn pick_addr(addrs: &[SocketAddr]) -> Option<SocketAddr> {
    addrs
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
}
