//! The HTTP layer boundary.
//!
//! The handshake core does not build requests or manage sockets itself; it
//! drives an implementation of [`Transport`] supplied by the surrounding
//! HTTP client. The contract mirrors what the retry state machine needs:
//! responses expose their status, repeated headers, the request that
//! produced them, the peer TLS certificate (when any) as a first-class
//! field, and a connection handle that can be returned to the pool once the
//! body has been drained.

use std::fmt;
use std::io::{Read, Seek, SeekFrom};
use std::mem;

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use url::Url;

use crate::{Error, Result};

/// Per-send options forwarded from the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct SendOptions {
    /// Whether the response body may be streamed instead of buffered.
    pub stream: bool,
}

/// One HTTP exchange, supplied by the surrounding client.
///
/// Any error returned from [`send`](Transport::send) aborts the handshake
/// and is propagated to the caller unchanged.
pub trait Transport {
    fn send(&mut self, request: Request, options: &SendOptions) -> Result<Response>;
}

/// A pooled connection handle attached to a [`Response`].
///
/// [`release`](Connection::release) hands the connection back to its pool so
/// the next handshake round can reuse it.
pub trait Connection: Send {
    fn release(self: Box<Self>);
}

/// A request body that can be rewound and resent.
pub trait ReplayableBody: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReplayableBody for T {}

/// An outgoing request body.
pub enum Body {
    Empty,
    /// A fully buffered body; inherently replayable.
    Bytes(Bytes),
    /// A seekable reader, repositioned before every resend.
    Seekable(Box<dyn ReplayableBody>),
}

impl Body {
    pub fn bytes(bytes: impl Into<Bytes>) -> Body {
        Body::Bytes(bytes.into())
    }

    pub fn seekable(reader: impl ReplayableBody + 'static) -> Body {
        Body::Seekable(Box::new(reader))
    }

    pub(crate) fn take(&mut self) -> Body {
        mem::replace(self, Body::Empty)
    }

    /// Repositions a seekable body for a resend: back by `content_length`
    /// bytes from the current read position when the length is known,
    /// otherwise to the start. Buffered bodies need no repositioning.
    pub(crate) fn rewind(&mut self, content_length: u64) -> Result<()> {
        if let Body::Seekable(reader) = self {
            if content_length > 0 {
                reader.seek(SeekFrom::Current(-(content_length as i64)))?;
            } else {
                reader.seek(SeekFrom::Start(0))?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => f.write_str("Body::Empty"),
            Body::Bytes(bytes) => write!(f, "Body::Bytes({} bytes)", bytes.len()),
            Body::Seekable(_) => f.write_str("Body::Seekable"),
        }
    }
}

/// An outgoing HTTP request.
#[derive(Debug)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Body,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Request {
        Request {
            method,
            url,
            headers: HeaderMap::new(),
            body: Body::Empty,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    pub fn set_body(&mut self, body: Body) {
        self.body = body;
    }

    /// Clones the request shell and moves the body into the clone. The
    /// original keeps an empty body; it only remains as a record on the
    /// response history.
    pub(crate) fn replay_clone(&mut self) -> Request {
        Request {
            method: self.method.clone(),
            url: self.url.clone(),
            headers: self.headers.clone(),
            body: self.body.take(),
        }
    }
}

/// A response body, possibly still streaming from the transport.
pub enum ResponseBody {
    Buffered(Bytes),
    Streaming(Box<dyn Read + Send>),
}

impl ResponseBody {
    pub fn empty() -> ResponseBody {
        ResponseBody::Buffered(Bytes::new())
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Buffered(bytes) => {
                write!(f, "ResponseBody::Buffered({} bytes)", bytes.len())
            }
            ResponseBody::Streaming(_) => f.write_str("ResponseBody::Streaming"),
        }
    }
}

/// An HTTP response as seen by the handshake core.
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: ResponseBody,
    peer_certificate: Option<Vec<u8>>,
    connection: Option<Box<dyn Connection>>,
    request: Request,
    history: Vec<Response>,
}

impl Response {
    pub fn new(status: StatusCode, headers: HeaderMap, body: ResponseBody, request: Request) -> Response {
        Response {
            status,
            headers,
            body,
            peer_certificate: None,
            connection: None,
            request,
            history: Vec::new(),
        }
    }

    /// Attaches the DER bytes of the peer TLS certificate. Transports must
    /// set this for TLS connections; channel binding is skipped otherwise.
    pub fn with_peer_certificate(mut self, certificate_der: Vec<u8>) -> Response {
        self.peer_certificate = Some(certificate_der);
        self
    }

    pub fn with_connection(mut self, connection: Box<dyn Connection>) -> Response {
        self.connection = Some(connection);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn peer_certificate(&self) -> Option<&[u8]> {
        self.peer_certificate.as_deref()
    }

    /// The request that produced this response.
    pub fn request(&self) -> &Request {
        &self.request
    }

    pub(crate) fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    /// Intermediate responses observed before this one, in chronological
    /// order.
    pub fn history(&self) -> &[Response] {
        &self.history
    }

    pub(crate) fn history_mut(&mut self) -> &mut Vec<Response> {
        &mut self.history
    }

    /// Reads any remaining streamed body into memory and returns the full
    /// body bytes.
    pub fn bytes(&mut self) -> Result<&Bytes> {
        if let ResponseBody::Streaming(reader) = &mut self.body {
            let mut buffered = Vec::new();
            reader
                .read_to_end(&mut buffered)
                .map_err(Error::transport)?;
            self.body = ResponseBody::Buffered(Bytes::from(buffered));
        }
        match &self.body {
            ResponseBody::Buffered(bytes) => Ok(bytes),
            ResponseBody::Streaming(_) => unreachable!("body was buffered above"),
        }
    }

    /// Drains the body and hands the connection back to its pool.
    ///
    /// The drain must come first: a connection with unread response bytes
    /// cannot be reused.
    pub fn release_connection(&mut self) -> Result<()> {
        self.bytes()?;
        if let Some(connection) = self.connection.take() {
            connection.release();
        }
        Ok(())
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("peer_certificate", &self.peer_certificate.as_ref().map(Vec::len))
            .field("connection", &self.connection.is_some())
            .field("request", &self.request)
            .field("history", &self.history.len())
            .finish()
    }
}
