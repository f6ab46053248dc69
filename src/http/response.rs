//! Response passthrough with release-on-drop.
//!
//! The upstream body is streamed to the client untouched; the wrapper only
//! carries the request's `ConnectionGuard` so the in-flight counter is
//! released exactly once, whether the stream finished, the client aborted,
//! or the upstream died mid-response.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use hyper::body::Incoming;

use crate::pool::ConnectionGuard;

/// Upstream response body that owns the request's connection guard.
pub struct GuardedBody {
    inner: Incoming,
    guard: ConnectionGuard,
    failed: bool,
}

impl GuardedBody {
    pub fn new(inner: Incoming, guard: ConnectionGuard) -> Self {
        Self {
            inner,
            guard,
            failed: false,
        }
    }
}

impl Body for GuardedBody {
    type Data = Bytes;
    type Error = hyper::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_frame(cx);

        // Headers are already gone; the client sees a truncated stream, but
        // the backend still leaves the rotation.
        if let Poll::Ready(Some(Err(error))) = &poll {
            if !this.failed {
                this.failed = true;
                this.guard.pool().mark_unhealthy(
                    this.guard.backend_id(),
                    &format!("upstream failed mid-response: {}", error),
                );
            }
        }

        poll
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
