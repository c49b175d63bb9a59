//! Host name resolution.

use ks_core::NetError;
use ks_core::NetResult;
use std::net::SocketAddr;
use std::net::ToSocketAddrs;

pub trait DnsResolver {
    fn resolve(&self, host: &str, port: u16) -> NetResult<Vec<SocketAddr>>;
}

/// Resolver backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemDnsResolver;

impl DnsResolver for SystemDnsResolver {
    fn resolve(&self, host: &str, port: u16) -> NetResult<Vec<SocketAddr>> {
        let addresses: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|error| {
                NetError::new(
                    "net.dns.resolve_failed",
                    format!("failed to resolve `{host}:{port}`: {error}"),
                )
            })?
            .collect();

        if addresses.is_empty() {
            return Err(NetError::new(
                "net.dns.no_results",
                format!("resolver returned no addresses for `{host}:{port}`"),
            ));
        }

        Ok(addresses)
    }
}
