//! Real-time pacing of clip frames

use futures::{Stream, ready};
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Instant, Sleep, sleep};

use crate::types::{ClipFrame, Pacing};

/// Stand-in deadline for waits too long to represent (about 30 years)
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Extension trait to pace any stream of clip frames
pub trait PacedExt: Stream<Item = ClipFrame> {
    /// Yield each payload only after its (paced) delay has elapsed
    ///
    /// Delays are relative to the moment the previous payload was yielded, so
    /// time the consumer spends writing a payload is not made up afterwards.
    fn paced(self, pacing: Pacing) -> Paced<Self>
    where
        Self: Sized,
    {
        Paced::new(self, pacing)
    }
}

impl<T: Stream<Item = ClipFrame>> PacedExt for T {}

pin_project! {
    /// A stream combinator that reproduces recorded inter-frame delays
    pub struct Paced<S> {
        #[pin]
        frames: S,
        #[pin]
        sleep: Sleep,
        pending: Option<ClipFrame>,
        pacing: Pacing,
    }
}

impl<S: Stream<Item = ClipFrame>> Paced<S> {
    /// Create a new paced stream
    pub fn new(frames: S, pacing: Pacing) -> Self {
        Self { frames, sleep: sleep(Duration::ZERO), pending: None, pacing: pacing.normalize() }
    }
}

impl<S: Stream<Item = ClipFrame>> Stream for Paced<S> {
    type Item = Arc<[u8]>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        if this.pending.is_none() {
            let Some(frame) = ready!(this.frames.as_mut().poll_next(cx)) else {
                return Poll::Ready(None);
            };
            let wait = this.pacing.apply(frame.delay);
            if wait.is_zero() {
                return Poll::Ready(Some(frame.payload));
            }
            let now = Instant::now();
            let deadline = now.checked_add(wait).unwrap_or_else(|| now + FAR_FUTURE);
            this.sleep.as_mut().reset(deadline);
            *this.pending = Some(frame);
        }

        ready!(this.sleep.as_mut().poll(cx));
        Poll::Ready(this.pending.take().map(|frame| frame.payload))
    }
}
