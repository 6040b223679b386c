use std::{io, mem};
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::response::{IntoResponse, Response};
use bytes::{Bytes, BytesMut};
use futures::Stream;
use http_body::{Body, Frame, SizeHint};
use pin_project::pin_project;
use tokio::io::{AsyncRead, ReadBuf};

const IO_BUFFER_SIZE: usize = 64 * 1024;

/// Response body stream over any [`AsyncRead`]. Implements [`Stream`],
/// [`Body`], and [`IntoResponse`].
///
/// With a known length the body stops after exactly that many bytes and a
/// source that ends early is reported as [`io::ErrorKind::UnexpectedEof`].
#[pin_project]
pub struct ResponseStream<R> {
    buffer: BytesMut,
    remaining: Option<u64>,
    done: bool,
    #[pin]
    body: R,
}

impl<R: AsyncRead + Send + 'static> ResponseStream<R> {
    pub fn new(body: R, length: Option<u64>) -> Self {
        ResponseStream {
            buffer: allocate_buffer(),
            remaining: length,
            done: false,
            body,
        }
    }
}

impl<R> std::fmt::Debug for ResponseStream<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseStream")
            .field("remaining", &self.remaining)
            .field("done", &self.done)
            .finish()
    }
}

impl<R: AsyncRead + Send + 'static> IntoResponse for ResponseStream<R> {
    fn into_response(self) -> Response {
        Response::new(axum::body::Body::new(self))
    }
}

impl<R: AsyncRead> Body for ResponseStream<R> {
    type Data = Bytes;
    type Error = io::Error;

    fn is_end_stream(&self) -> bool {
        self.done || self.remaining == Some(0)
    }

    fn size_hint(&self) -> SizeHint {
        match self.remaining {
            Some(remaining) => SizeHint::with_exact(remaining),
            None => SizeHint::default(),
        }
    }

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>)
        -> Poll<Option<io::Result<Frame<Bytes>>>>
    {
        self.poll_next(cx).map(|item| item.map(|result| result.map(Frame::data)))
    }
}

impl<R: AsyncRead> Stream for ResponseStream<R> {
    type Item = io::Result<Bytes>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>
    ) -> Poll<Option<io::Result<Bytes>>> {
        let this = self.project();

        if *this.done || *this.remaining == Some(0) {
            return Poll::Ready(None);
        }

        let uninit = this.buffer.spare_capacity_mut();

        // read at most the buffer size, or what is left of a known length
        let nbytes = match *this.remaining {
            Some(remaining) => std::cmp::min(
                uninit.len(),
                usize::try_from(remaining).unwrap_or(usize::MAX),
            ),
            None => uninit.len(),
        };

        let mut read_buf = ReadBuf::uninit(&mut uninit[0..nbytes]);

        match this.body.poll_read(cx, &mut read_buf) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Err(e)) => {
                *this.done = true;
                tracing::warn!(error = %e, "response body source failed");
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(Ok(())) => {
                match read_buf.filled().len() {
                    0 => {
                        *this.done = true;
                        match *this.remaining {
                            Some(missing) => {
                                tracing::warn!(missing, "response body source ended early");
                                Poll::Ready(Some(Err(io::Error::new(
                                    io::ErrorKind::UnexpectedEof,
                                    format!(
                                        "source ended {missing} bytes short of the declared length"
                                    ),
                                ))))
                            }
                            None => Poll::Ready(None),
                        }
                    }
                    n => {
                        // SAFETY: poll_read has filled the first `n` bytes of
                        // the spare capacity, and the buffer is always empty
                        // here since every filled chunk is split off below
                        unsafe { this.buffer.set_len(this.buffer.len() + n); }

                        // hand out this chunk, keep reading into a fresh buffer
                        let chunk = mem::replace(this.buffer, allocate_buffer());

                        // n is bounded by `remaining` through the cmp::min above
                        if let Some(remaining) = this.remaining.as_mut() {
                            *remaining -= n as u64;
                        }

                        Poll::Ready(Some(Ok(chunk.freeze())))
                    }
                }
            }
        }
    }
}

fn allocate_buffer() -> BytesMut {
    BytesMut::with_capacity(IO_BUFFER_SIZE)
}
