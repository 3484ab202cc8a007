//! Pass-through body stream for relayed responses.
//!
//! Owns the upstream body for the lifetime of the client response. When the
//! client goes away, hyper drops the response body, which drops this stream
//! and with it the upstream connection.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::Stream;
use pin_project_lite::pin_project;

use crate::observability::metrics;

/// Byte accounting for one relayed body, reported when it is dropped.
#[derive(Debug)]
struct RelayProgress {
    request_id: String,
    logical_path: String,
    bytes: u64,
    finished: bool,
}

impl Drop for RelayProgress {
    fn drop(&mut self) {
        metrics::record_relayed_bytes(self.bytes);

        if self.finished {
            tracing::debug!(
                request_id = %self.request_id,
                logical_path = %self.logical_path,
                bytes = self.bytes,
                "Relay finished"
            );
        } else {
            tracing::info!(
                request_id = %self.request_id,
                logical_path = %self.logical_path,
                bytes = self.bytes,
                "Relay ended before upstream body was exhausted; upstream connection released"
            );
        }
    }
}

pin_project! {
    /// Forwards chunks unchanged while counting them.
    pub struct RelayStream<S> {
        #[pin]
        inner: S,
        progress: RelayProgress,
    }
}

impl<S> RelayStream<S> {
    pub fn new(inner: S, request_id: impl Into<String>, logical_path: impl Into<String>) -> Self {
        Self {
            inner,
            progress: RelayProgress {
                request_id: request_id.into(),
                logical_path: logical_path.into(),
                bytes: 0,
                finished: false,
            },
        }
    }

    /// Bytes forwarded so far.
    pub fn bytes_relayed(&self) -> u64 {
        self.progress.bytes
    }
}

impl<S, E> Stream for RelayStream<S>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::fmt::Display,
{
    type Item = Result<Bytes, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();

        match this.inner.poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.progress.bytes += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                tracing::warn!(
                    request_id = %this.progress.request_id,
                    bytes = this.progress.bytes,
                    error = %e,
                    "Upstream body failed mid-relay"
                );
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.progress.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{stream, StreamExt};

    #[tokio::test]
    async fn test_forwards_chunks_unchanged() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"hello ")),
            Ok(Bytes::from_static(b"world")),
        ];
        let mut relay = RelayStream::new(stream::iter(chunks), "req-1", "movie.mp4");

        let mut collected = Vec::new();
        while let Some(chunk) = relay.next().await {
            collected.extend_from_slice(&chunk.unwrap());
        }

        assert_eq!(collected, b"hello world");
        assert_eq!(relay.bytes_relayed(), 11);
    }

    #[tokio::test]
    async fn test_errors_pass_through() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"abc")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ];
        let mut relay = RelayStream::new(stream::iter(chunks), "req-2", "movie.mp4");

        assert!(relay.next().await.unwrap().is_ok());
        assert!(relay.next().await.unwrap().is_err());
        assert_eq!(relay.bytes_relayed(), 3);
    }
}
