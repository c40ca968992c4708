//! Listener bootstrap: bind the preferred port, walking upward while ports are taken.

use std::io;

use tokio::net::TcpListener;

use crate::error::BindError;

/// Bind `host:preferred_port`, trying the next port on `AddrInUse`.
///
/// At most `max_attempts` ports are tried. Any error other than
/// address-in-use is returned immediately. Returns the listener and the
/// port it is bound to.
pub async fn bind_with_retry(
    host: &str,
    preferred_port: u16,
    max_attempts: u16,
) -> Result<(TcpListener, u16), BindError> {
    let mut port = preferred_port;
    let mut attempts: u16 = 0;

    loop {
        attempts += 1;
        match TcpListener::bind((host, port)).await {
            Ok(listener) => {
                let bound = listener
                    .local_addr()
                    .map_err(|source| BindError::Io { port, source })?
                    .port();
                return Ok((listener, bound));
            }
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                let next = port.checked_add(1);
                match next {
                    Some(next) if attempts < max_attempts => {
                        log::warn!("Port {port} in use, trying {next}...");
                        port = next;
                    }
                    _ => {
                        return Err(BindError::PortsExhausted {
                            first: preferred_port,
                            last: port,
                            attempts,
                        });
                    }
                }
            }
            Err(source) => return Err(BindError::Io { port, source }),
        }
    }
}
