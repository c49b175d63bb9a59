//! TCP connection setup.

use ks_core::NetError;
use ks_core::NetResult;
use std::io::Read;
use std::io::Write;
use std::net::SocketAddr;
use std::net::TcpStream;
use std::time::Duration;

/// Byte stream the client reads responses from, plain or TLS.
pub trait IoStream: Read + Write {}
impl<T> IoStream for T where T: Read + Write {}

pub type BoxedIoStream = Box<dyn IoStream>;

pub trait Transport {
    fn connect(&self, address: SocketAddr, timeout: Duration) -> NetResult<TcpStream>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransport;

impl Transport for TcpTransport {
    fn connect(&self, address: SocketAddr, timeout: Duration) -> NetResult<TcpStream> {
        let stream = TcpStream::connect_timeout(&address, timeout).map_err(|error| {
            NetError::new(
                "net.transport.connect_failed",
                format!("failed to connect to `{address}`: {error}"),
            )
        })?;

        let configure = |result: std::io::Result<()>, what: &str| {
            result.map_err(|error| {
                NetError::new(
                    "net.transport.configure_failed",
                    format!("failed to set {what} for `{address}`: {error}"),
                )
            })
        };
        configure(stream.set_nodelay(true), "TCP_NODELAY")?;
        configure(stream.set_read_timeout(Some(timeout)), "read timeout")?;
        configure(stream.set_write_timeout(Some(timeout)), "write timeout")?;

        Ok(stream)
    }
}

/// Tries each resolved address in order and returns the first connection.
pub fn connect_first_available<T: Transport>(
    transport: &T,
    addresses: &[SocketAddr],
    timeout: Duration,
) -> NetResult<TcpStream> {
    let mut last_error: Option<NetError> = None;

    for address in addresses {
        match transport.connect(*address, timeout) {
            Ok(stream) => return Ok(stream),
            Err(error) => {
                tracing::debug!(%address, %error, "connection attempt failed");
                last_error = Some(error);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        NetError::new(
            "net.transport.no_addresses",
            "no addresses available to open a connection",
        )
    }))
}
