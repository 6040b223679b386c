//! # range-relay
//!
//! Streaming HTTP download relay for [`axum`][1] with byte-range support.
//!
//! A client asks for an upstream URL, optionally with a `Range` header. The
//! upstream body is fetched with [`reqwest`] and streamed straight through,
//! never buffered whole. A single `bytes=X-Y` or `bytes=X-` range is
//! answered with `206 Partial Content` over a [`BoundedStream`], a read-only
//! view that cannot yield a byte outside the requested interval.
//!
//! The decision itself is a pure function, [`decide`], usable with any
//! [`AsyncRead`](tokio::io::AsyncRead) body:
//!
//! ```
//! use range_relay::{decide, TransferOutcome};
//!
//! let body: &[u8] = b"Hello world this is a file to test range requests on!\n";
//! match decide(Some("bytes=6-10"), body, Some(54)) {
//!     TransferOutcome::Partial { range, .. } => {
//!         assert_eq!((6, 10), (range.from(), range.to()));
//!     }
//!     _ => unreachable!(),
//! }
//! ```
//!
//! Wrapping the outcome in [`Relayed`] turns it into a response. The full
//! server is [`server::router`], served by [`server::serve`]:
//!
//! ```no_run
//! use range_relay::RelayConfig;
//!
//! #[tokio::main]
//! async fn main() -> range_relay::Result<()> {
//!     range_relay::server::serve(RelayConfig::default()).await
//! }
//! ```
//!
//! [1]: https://docs.rs/axum

mod bounded;
mod stream;

pub mod config;
pub mod error;
pub mod range;
pub mod server;
pub mod transfer;
pub mod upstream;

pub use bounded::{BoundedStream, SeekOutOfBounds};
pub use config::RelayConfig;
pub use error::{Error, Result};
pub use range::{parse_range_header, RangeSpec, RawRange};
pub use stream::ResponseStream;
pub use transfer::{decide, Relayed, TransferOutcome};
pub use upstream::{Fetch, HttpFetcher, UpstreamResource};
