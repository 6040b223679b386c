use std::cmp;
use std::io::{self, SeekFrom};
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use pin_project::pin_project;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncSeek, AsyncWrite, ReadBuf};

use crate::range::RangeSpec;

const DISCARD_BUFFER_SIZE: usize = 8 * 1024;

/// A seek target fell outside the view. The transfer logic never seeks a
/// view it built, so this signals a caller bug rather than a client error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("seek to {target} is outside the view {start}..={end}")]
pub struct SeekOutOfBounds {
    /// Absolute target offset in the source's coordinates.
    pub target: i128,
    pub start: u64,
    pub end: u64,
}

impl From<SeekOutOfBounds> for io::Error {
    fn from(err: SeekOutOfBounds) -> Self {
        io::Error::new(io::ErrorKind::InvalidInput, err)
    }
}

/// Read-only view of the bytes `[start, end]` of an underlying source.
///
/// Offsets are absolute in the source's coordinate space; [`position`]
/// reports the cursor relative to `start`. The source must yield byte `0`
/// next. When it lags behind the cursor, the gap is read and dropped, so a
/// plain sequential HTTP body works without seeking.
///
/// [`AsyncSeek`] is only available when the source implements it.
///
/// [`position`]: BoundedStream::position
#[pin_project]
#[derive(Debug)]
pub struct BoundedStream<S> {
    start: u64,
    end: u64,
    position: u64,
    source_position: u64,
    pending_seek: Option<u64>,
    #[pin]
    source: S,
}

impl<S> BoundedStream<S> {
    pub fn new(source: S, range: &RangeSpec) -> Self {
        BoundedStream {
            start: range.from(),
            end: range.to(),
            position: range.from(),
            source_position: 0,
            pending_seek: None,
            source,
        }
    }

    /// Number of bytes the view covers, regardless of how many were read.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Cursor relative to the start of the view.
    pub fn position(&self) -> u64 {
        self.position - self.start
    }

    /// Bytes left before the view is exhausted.
    pub fn remaining(&self) -> u64 {
        (self.end + 1).saturating_sub(self.position)
    }

    /// Absolute target of a seek, checked against the view. The check is on
    /// the computed target, never the current cursor.
    pub fn seek_target(&self, pos: SeekFrom) -> Result<u64, SeekOutOfBounds> {
        let target = match pos {
            SeekFrom::Start(offset) => i128::from(self.start) + i128::from(offset),
            SeekFrom::Current(offset) => i128::from(self.position) + i128::from(offset),
            SeekFrom::End(offset) => i128::from(self.end) + i128::from(offset),
        };

        if target < i128::from(self.start) || target > i128::from(self.end) {
            return Err(SeekOutOfBounds { target, start: self.start, end: self.end });
        }

        // bounded by `end` above
        Ok(target as u64)
    }
}

impl<S: AsyncRead> AsyncRead for BoundedStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let mut this = self.project();

        if *this.position > *this.end || buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        // advance a sequential source up to the cursor, dropping what it yields
        while *this.source_position < *this.position {
            let gap = *this.position - *this.source_position;
            let mut scratch = [0u8; DISCARD_BUFFER_SIZE];
            let nbytes = cmp::min(
                scratch.len(),
                usize::try_from(gap).unwrap_or(usize::MAX),
            );
            let mut discard = ReadBuf::new(&mut scratch[..nbytes]);

            ready!(this.source.as_mut().poll_read(cx, &mut discard))?;
            match discard.filled().len() {
                0 => {
                    return Poll::Ready(Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!(
                            "source ended at byte {} before range start {}",
                            this.source_position, this.start,
                        ),
                    )));
                }
                n => *this.source_position += n as u64,
            }
        }

        let remaining = *this.end - *this.position + 1;
        let nbytes = cmp::min(buf.remaining(), usize::try_from(remaining).unwrap_or(usize::MAX));

        let mut limited = ReadBuf::new(buf.initialize_unfilled_to(nbytes));
        ready!(this.source.poll_read(cx, &mut limited))?;
        let n = limited.filled().len();

        buf.advance(n);
        *this.position += n as u64;
        *this.source_position += n as u64;

        Poll::Ready(Ok(()))
    }
}

impl<S: AsyncSeek> AsyncSeek for BoundedStream<S> {
    fn start_seek(self: Pin<&mut Self>, pos: SeekFrom) -> io::Result<()> {
        let target = self.seek_target(pos)?;
        let this = self.project();
        this.source.start_seek(SeekFrom::Start(target))?;
        *this.pending_seek = Some(target);
        Ok(())
    }

    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        let this = self.project();
        if let Some(target) = *this.pending_seek {
            ready!(this.source.poll_complete(cx))?;
            *this.pending_seek = None;
            *this.position = target;
            *this.source_position = target;
        }
        Poll::Ready(Ok(*this.position - *this.start))
    }
}

impl<S> AsyncWrite for BoundedStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "bounded stream is read-only",
        )))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
