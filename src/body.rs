//! Request bodies handed to the transport

use std::convert::Infallible;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Frame, SizeHint};
use tokio::io::{AsyncRead, ReadBuf};

use crate::error::Error;

/// Largest chunk read from an upload stream per frame
pub const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Body type of every request the client sends
pub type RequestBody = UnsyncBoxBody<Bytes, io::Error>;

/// A body sent in one piece
pub fn full(bytes: Bytes) -> RequestBody {
    Full::new(bytes)
        .map_err(|never: Infallible| match never {})
        .boxed_unsync()
}

/// Where an upload body leaves the local error that aborted it, so the
/// caller can report it instead of the transport's wrapper.
#[derive(Clone, Default)]
pub struct UploadFailure(Arc<Mutex<Option<Error>>>);

impl UploadFailure {
    fn set(&self, err: Error) {
        if let Ok(mut slot) = self.0.lock() {
            slot.get_or_insert(err);
        }
    }

    /// Take the recorded error, if the body failed
    pub fn take(&self) -> Option<Error> {
        self.0.lock().ok().and_then(|mut slot| slot.take())
    }
}

/// Streams exactly `length` bytes from an `AsyncRead`, one chunk per frame.
///
/// A stream that ends early or fails aborts the body with an I/O error and
/// records [`Error::ShortRead`] or [`Error::UploadRead`] in its
/// [`UploadFailure`].
pub struct UploadBody<S> {
    stream: S,
    length: u64,
    sent: u64,
    buf: BytesMut,
    failed: bool,
    failure: UploadFailure,
}

impl<S> UploadBody<S>
where
    S: AsyncRead + Unpin + Send + 'static,
{
    /// Wrap `stream`, announcing `length` bytes
    pub fn new(stream: S, length: u64) -> Self {
        Self {
            stream,
            length,
            sent: 0,
            buf: BytesMut::new(),
            failed: false,
            failure: UploadFailure::default(),
        }
    }

    /// Handle to the error that aborted this body, if any
    pub fn failure(&self) -> UploadFailure {
        self.failure.clone()
    }

    /// Box into the transport's body type
    pub fn boxed(self) -> RequestBody {
        BodyExt::boxed_unsync(self)
    }

    fn abort(
        &mut self,
        err: Error,
        kind: io::ErrorKind,
    ) -> Poll<Option<io::Result<Frame<Bytes>>>> {
        let message = err.to_string();
        self.failed = true;
        self.failure.set(err);
        Poll::Ready(Some(Err(io::Error::new(kind, message))))
    }
}

impl<S> Body for UploadBody<S>
where
    S: AsyncRead + Unpin + Send + 'static,
{
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<io::Result<Frame<Bytes>>>> {
        let this = self.get_mut();
        let remaining = this.length - this.sent;
        if this.failed || remaining == 0 {
            return Poll::Ready(None);
        }

        let want = usize::try_from(remaining.min(UPLOAD_CHUNK_SIZE as u64))
            .unwrap_or(UPLOAD_CHUNK_SIZE);
        this.buf.resize(want, 0);

        let mut read_buf = ReadBuf::new(&mut this.buf[..want]);
        match Pin::new(&mut this.stream).poll_read(cx, &mut read_buf) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Err(e)) => this.abort(Error::UploadRead(e.to_string()), e.kind()),
            Poll::Ready(Ok(())) => {
                let n = read_buf.filled().len();
                if n == 0 {
                    let err = Error::ShortRead {
                        expected: this.length,
                        actual: this.sent,
                    };
                    return this.abort(err, io::ErrorKind::UnexpectedEof);
                }
                this.sent += n as u64;
                let chunk = this.buf.split_to(n).freeze();
                Poll::Ready(Some(Ok(Frame::data(chunk))))
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.failed || self.sent == self.length
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.length - self.sent)
    }
}
