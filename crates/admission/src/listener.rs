//! Listener seams. The loop binds through a [`Binder`] so that lurk mode can
//! create the listener lazily and tests can observe every bind and accept.

use std::{future::Future, io, net::SocketAddr};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpListener, TcpStream},
};

/// Creates protocol listeners.
pub trait Binder: Send + Sync + 'static {
    type Acceptor: Acceptor;

    /// Human-readable listen target for logs and errors.
    fn target(&self) -> String;

    /// Create a fresh listener.
    fn bind(&self) -> impl Future<Output = io::Result<Self::Acceptor>> + Send;
}

/// A bound listener.
pub trait Acceptor: Send + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Wait for the next peer.
    fn accept(&mut self) -> impl Future<Output = io::Result<(Self::Stream, SocketAddr)>> + Send;

    /// The address peers connect to.
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

/// Binds TCP listeners on a fixed address.
#[derive(Debug, Clone)]
pub struct TcpBinder {
    addr: SocketAddr,
}

impl TcpBinder {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }
}

impl Binder for TcpBinder {
    type Acceptor = TcpListener;

    fn target(&self) -> String {
        self.addr.to_string()
    }

    fn bind(&self) -> impl Future<Output = io::Result<TcpListener>> + Send {
        TcpListener::bind(self.addr)
    }
}

impl Acceptor for TcpListener {
    type Stream = TcpStream;

    fn accept(&mut self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        TcpListener::accept(self)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        TcpListener::local_addr(self)
    }
}
