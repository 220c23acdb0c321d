//! TCP link to the real controller

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::info;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use super::{Transport, TransportError};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Transport over the controller's TCP command port.
pub struct TcpTransport {
    writer: TcpStream,
    reader: BufReader<TcpStream>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TcpTransport {
    /// Connect to the controller, `address` being `host:port`.
    pub fn connect(address: &str, connect_timeout: Duration) -> Result<Self, TransportError> {
        let conn_err = |e| TransportError::ConnectError(address.to_string(), e);

        let socket_addr = address
            .to_socket_addrs()
            .map_err(conn_err)?
            .next()
            .ok_or_else(|| {
                conn_err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "address did not resolve",
                ))
            })?;

        let writer = TcpStream::connect_timeout(&socket_addr, connect_timeout).map_err(conn_err)?;
        writer.set_nodelay(true).map_err(TransportError::ConfigError)?;

        let reader = BufReader::new(writer.try_clone().map_err(TransportError::ConfigError)?);

        info!("Connected to the controller at {}", address);

        Ok(Self { writer, reader })
    }
}

impl Transport for TcpTransport {
    fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        self.writer
            .write_all(format!("{}\n", line).as_bytes())
            .and_then(|_| self.writer.flush())
            .map_err(TransportError::WriteError)
    }

    fn read_line(&mut self) -> Result<String, TransportError> {
        let mut line = String::new();

        match self.reader.read_line(&mut line) {
            Ok(0) => Err(TransportError::Disconnected),
            Ok(_) => Ok(line.trim_end_matches(&['\r', '\n'][..]).to_string()),
            Err(e) => Err(TransportError::ReadError(e)),
        }
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), TransportError> {
        self.writer
            .set_read_timeout(timeout)
            .map_err(TransportError::ConfigError)
    }
}
