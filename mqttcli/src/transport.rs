// Copyright (c) 2022 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

use crate::error::{Error, ErrorKind};

/// Byte stream capability consumed by the protocol engine.
///
/// The engine only sends and receives raw bytes; the concrete transport
/// decides how they travel. Receive errors are already classified by the
/// transport: a timed out read surfaces as `ReadTimeout`, everything else
/// as `TransportError`.
pub trait Transport {
    /// Write `buf` to the stream.
    ///
    /// Returns number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns error if the stream rejects the write.
    fn send(&mut self, buf: &[u8]) -> Result<usize, Error>;

    /// Read available bytes into `buf`.
    ///
    /// Returns number of bytes read, 0 on clean close.
    ///
    /// # Errors
    ///
    /// Returns `ReadTimeout` if the receive timeout expired, `TransportError`
    /// on any other stream error.
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Error>;

    /// Update the receive timeout, `None` blocks forever.
    ///
    /// # Errors
    ///
    /// Returns error if the timeout cannot be applied.
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), Error>;

    /// Shut down the stream.
    fn close(&mut self);
}

/// TCP realisation of the transport capability.
#[allow(clippy::module_name_repetitions)]
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    /// Connect to `host:port`.
    ///
    /// `connect_wait` controls retries on connection failure: 0 gives up
    /// after the first attempt, a positive value keeps retrying for that
    /// many seconds at a one second pace, a negative value retries forever.
    ///
    /// # Errors
    ///
    /// Returns error if the address does not resolve, the connection cannot
    /// be established within `connect_wait`, or socket options fail.
    pub fn connect(host: &str, port: u16, connect_wait: i32) -> Result<Self, Error> {
        let address = format!("{host}:{port}");
        let sock_addr = address
            .to_socket_addrs()
            .map_err(|err| {
                Error::from_string(
                    ErrorKind::SocketCreate,
                    format!("Failed to resolve address {address}, err: {err}"),
                )
            })?
            .next()
            .ok_or_else(|| {
                Error::from_string(
                    ErrorKind::SocketCreate,
                    format!("No socket address for {address}"),
                )
            })?;

        let mut waited = 0;
        let stream = loop {
            match TcpStream::connect(sock_addr) {
                Ok(stream) => {
                    log::info!("Connected with broker {address}");
                    break stream;
                }
                Err(err) => {
                    if connect_wait == 0 || (connect_wait > 0 && waited >= connect_wait) {
                        return Err(Error::from_string(
                            ErrorKind::ConnectFailed,
                            format!("Failed to connect to {address}, err: {err}"),
                        ));
                    }
                }
            }
            thread::sleep(Duration::from_secs(1));
            waited += 1;
            log::info!("Trying to connect to broker server {address}...");
        };

        stream.set_nodelay(true).map_err(|err| {
            Error::from_string(
                ErrorKind::SocketOptions,
                format!("Failed to set TCP_NODELAY, err: {err}"),
            )
        })?;

        Ok(Self { stream })
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, buf: &[u8]) -> Result<usize, Error> {
        match self.stream.write(buf) {
            Ok(n_sent) => Ok(n_sent),
            Err(err) => Err(Error::from_string(
                ErrorKind::TransportError,
                format!("Failed to write to socket, err: {err}"),
            )),
        }
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        match self.stream.read(buf) {
            Ok(n_recv) => Ok(n_recv),
            Err(err)
                if err.kind() == io::ErrorKind::WouldBlock
                    || err.kind() == io::ErrorKind::TimedOut =>
            {
                Err(Error::new(ErrorKind::ReadTimeout, "Reading message timeout"))
            }
            Err(err) => Err(Error::from_string(
                ErrorKind::TransportError,
                format!("Failed to read from socket, err: {err}"),
            )),
        }
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), Error> {
        self.stream.set_read_timeout(timeout).map_err(|err| {
            Error::from_string(
                ErrorKind::SocketOptions,
                format!("Failed to set receive timeout, err: {err}"),
            )
        })
    }

    fn close(&mut self) {
        if let Err(err) = self.stream.shutdown(std::net::Shutdown::Both) {
            log::debug!("Failed to shutdown socket, err: {err}");
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::{Duration, Error, Transport};

    /// Scripted in-memory transport.
    ///
    /// Hands out the prepared inbound bytes in chunks of at most
    /// `chunk_size`, records everything sent, and reports a clean close
    /// once the inbound bytes run out.
    #[derive(Debug, Default)]
    pub struct MockTransport {
        incoming: Vec<u8>,
        offset: usize,
        chunk_size: usize,
        pub sent: Vec<u8>,
        pub closed: bool,
    }

    impl MockTransport {
        pub fn new(incoming: &[u8]) -> Self {
            Self::with_chunk_size(incoming, usize::MAX)
        }

        pub fn with_chunk_size(incoming: &[u8], chunk_size: usize) -> Self {
            Self {
                incoming: incoming.to_vec(),
                offset: 0,
                chunk_size,
                sent: Vec::new(),
                closed: false,
            }
        }
    }

    impl Transport for MockTransport {
        fn send(&mut self, buf: &[u8]) -> Result<usize, Error> {
            self.sent.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
            if self.offset >= self.incoming.len() {
                return Ok(0);
            }
            let n_recv = buf
                .len()
                .min(self.chunk_size)
                .min(self.incoming.len() - self.offset);
            buf[..n_recv].copy_from_slice(&self.incoming[self.offset..self.offset + n_recv]);
            self.offset += n_recv;
            Ok(n_recv)
        }

        fn set_read_timeout(&mut self, _timeout: Option<Duration>) -> Result<(), Error> {
            Ok(())
        }

        fn close(&mut self) {
            self.closed = true;
        }
    }
}
