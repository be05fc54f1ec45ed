//! Response body type shared by every route.
//!
//! JSON envelopes are buffered; object downloads are streamed straight from
//! the [`ObjectReader`] so large objects never sit in memory.

use std::convert::Infallible;
use std::io;

use bytes::Bytes;
use futures::TryStreamExt;
use http_body::Frame;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use ssostore_storage::ObjectReader;
use tokio_util::io::ReaderStream;

/// Type-erased response body.
pub type ResponseBody = UnsyncBoxBody<Bytes, io::Error>;

/// A fully buffered body.
#[must_use]
pub fn full(data: impl Into<Bytes>) -> ResponseBody {
    Full::new(data.into())
        .map_err(|never: Infallible| match never {})
        .boxed_unsync()
}

/// A body streamed from an object reader.
///
/// The stream fails mid-body if the reader's call context is cancelled.
#[must_use]
pub fn from_reader(reader: ObjectReader) -> ResponseBody {
    StreamBody::new(ReaderStream::new(reader).map_ok(Frame::data)).boxed_unsync()
}

#[cfg(test)]
mod tests {
    use http_body::Body;
    use ssostore_storage::{CallContext, GuardedStorage, MemoryBackend};

    use super::*;

    #[test]
    fn test_should_size_buffered_body() {
        let body = full("hello");
        assert_eq!(body.size_hint().exact(), Some(5));
    }

    #[tokio::test]
    async fn test_should_stream_object_body() {
        let storage = GuardedStorage::new(MemoryBackend::new().with_bucket("docs"));
        let ctx = CallContext::new();
        storage.put_object(&ctx, "docs", "a.txt", "hello").await.unwrap();
        let reader = storage.get_object(&ctx, "docs", "a.txt").await.unwrap();

        let bytes = from_reader(reader).collect().await.unwrap().to_bytes();
        assert_eq!(bytes, Bytes::from_static(b"hello"));
    }
}
