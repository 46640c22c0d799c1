//! Transport adapters
//!
//! The protocol engines are written against the [`LinkTransport`] trait and
//! perform their own frame reassembly, so the adapter makes no framing
//! promises. `recv` returning `Ok(0)` means "nothing available this tick";
//! a closed connection surfaces as an `UnexpectedEof` error.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};

/// Direction of a raw message passed to the debug hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
}

/// Raw frame bytes for the per-connection debug hook
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub direction: Direction,
    pub bytes: Vec<u8>,
}

/// Byte transport supplied by the host
#[async_trait]
pub trait LinkTransport: Send {
    /// Send the complete buffer
    async fn send(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Read available bytes into `buf`. `Ok(0)` means nothing is available
    /// right now (would-block); a closed peer is an error.
    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Drop the transport; errors on shutdown are ignored
    async fn close(&mut self);
}

/// [`LinkTransport`] over any async byte stream
///
/// `recv` polls the stream for at most `poll_timeout` so a connection tick
/// never blocks indefinitely.
pub struct StreamTransport<S> {
    stream: S,
    poll_timeout: Duration,
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            poll_timeout: Duration::from_millis(10),
        }
    }

    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }
}

#[async_trait]
impl<S> LinkTransport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await
    }

    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match timeout(self.poll_timeout, self.stream.read(buf)).await {
            Ok(Ok(0)) => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by peer",
            )),
            Ok(result) => result,
            Err(_) => Ok(0),
        }
    }

    async fn close(&mut self) {
        let _ = self.stream.shutdown().await;
    }
}

/// TCP transport for CS104 connections
pub struct TcpTransport {
    inner: StreamTransport<TcpStream>,
}

impl TcpTransport {
    /// Connect to `host:port` within the t0 establishment timeout
    pub async fn connect(host: &str, port: u16, t0: Duration) -> Result<Self> {
        let addr = format!("{host}:{port}");
        debug!("TCP connecting: {}", addr);

        match timeout(t0, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!("TCP_NODELAY: {}", e);
                }
                info!("TCP connected: {}", addr);
                Ok(Self {
                    inner: StreamTransport::new(stream),
                })
            }
            Ok(Err(e)) => {
                error!("TCP err: {} - {}", addr, e);
                Err(Error::Transport(e))
            }
            Err(_) => {
                warn!("TCP timeout: {}", addr);
                Err(Error::Transport(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connection to {addr} timed out"),
                )))
            }
        }
    }

    /// Wrap an already accepted stream (server side)
    pub fn from_stream(stream: TcpStream) -> Self {
        if let Err(e) = stream.set_nodelay(true) {
            debug!("TCP_NODELAY: {}", e);
        }
        Self {
            inner: StreamTransport::new(stream),
        }
    }
}

#[async_trait]
impl LinkTransport for TcpTransport {
    async fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.send(bytes).await
    }

    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.recv(buf).await
    }

    async fn close(&mut self) {
        self.inner.close().await;
    }
}

/// Serial transport for CS101 links
#[cfg(feature = "serial")]
pub struct SerialTransport {
    inner: StreamTransport<tokio_serial::SerialStream>,
}

#[cfg(feature = "serial")]
impl SerialTransport {
    /// Open a serial port with the given settings
    pub fn open(
        port: &str,
        baud_rate: u32,
        data_bits: u8,
        stop_bits: u8,
        parity: &str,
    ) -> Result<Self> {
        use tokio_serial::SerialPortBuilderExt;

        let parity = match parity {
            "Even" => tokio_serial::Parity::Even,
            "Odd" => tokio_serial::Parity::Odd,
            _ => tokio_serial::Parity::None,
        };
        let data_bits = match data_bits {
            5 => tokio_serial::DataBits::Five,
            6 => tokio_serial::DataBits::Six,
            7 => tokio_serial::DataBits::Seven,
            _ => tokio_serial::DataBits::Eight,
        };
        let stop_bits = match stop_bits {
            2 => tokio_serial::StopBits::Two,
            _ => tokio_serial::StopBits::One,
        };

        match tokio_serial::new(port, baud_rate)
            .data_bits(data_bits)
            .parity(parity)
            .stop_bits(stop_bits)
            .open_native_async()
        {
            Ok(stream) => {
                info!("serial opened: {}", port);
                Ok(Self {
                    inner: StreamTransport::new(stream),
                })
            }
            Err(e) => {
                error!("serial err: {} - {}", port, e);
                Err(Error::Transport(io::Error::other(e)))
            }
        }
    }
}

#[cfg(feature = "serial")]
#[async_trait]
impl LinkTransport for SerialTransport {
    async fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.send(bytes).await
    }

    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.recv(buf).await
    }

    async fn close(&mut self) {
        self.inner.close().await;
    }
}
