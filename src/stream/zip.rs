use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::stream::Stream;
use pin_project::pin_project;

use crate::constants::ZIP_BUFFER_CAPACITY;

/// Index-aligned zip of a fallible left stream with an infallible right stream.
///
/// Both inputs are drained eagerly into FIFO queues and the Nth left value is
/// paired with the Nth right value, whichever arrives first. A queue stops
/// accepting items once it holds `capacity` values; the other side must catch
/// up before that input is polled again.
///
/// The zip ends as soon as one side has finished and its queue is empty, so no
/// partial pair is ever produced. An error from the left side is emitted
/// immediately, buffered values are discarded and the zip ends.
#[pin_project]
#[must_use = "streams do nothing unless polled"]
pub struct AlignedZip<L, R: Stream, T> {
    #[pin]
    left: L,
    #[pin]
    right: R,
    left_queue: VecDeque<T>,
    right_queue: VecDeque<R::Item>,
    left_done: bool,
    right_done: bool,
    terminated: bool,
    capacity: usize,
}

impl<L, R, T, E> AlignedZip<L, R, T>
where
    L: Stream<Item = Result<T, E>>,
    R: Stream,
{
    pub fn new(left: L, right: R) -> Self {
        Self::with_capacity(left, right, ZIP_BUFFER_CAPACITY)
    }

    pub fn with_capacity(left: L, right: R, capacity: usize) -> Self {
        Self {
            left,
            right,
            left_queue: VecDeque::new(),
            right_queue: VecDeque::new(),
            left_done: false,
            right_done: false,
            terminated: false,
            capacity: capacity.max(1),
        }
    }

    /// Values waiting for a partner, as `(left, right)`.
    pub fn buffered(&self) -> (usize, usize) {
        (self.left_queue.len(), self.right_queue.len())
    }
}

impl<L, R, T, E> Stream for AlignedZip<L, R, T>
where
    L: Stream<Item = Result<T, E>>,
    R: Stream,
{
    type Item = Result<(T, R::Item), E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        if *this.terminated {
            return Poll::Ready(None);
        }

        while !*this.left_done && this.left_queue.len() < *this.capacity {
            match this.left.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(item))) => this.left_queue.push_back(item),
                Poll::Ready(Some(Err(err))) => {
                    *this.terminated = true;
                    this.left_queue.clear();
                    this.right_queue.clear();
                    return Poll::Ready(Some(Err(err)));
                }
                Poll::Ready(None) => *this.left_done = true,
                Poll::Pending => break,
            }
        }

        while !*this.right_done && this.right_queue.len() < *this.capacity {
            match this.right.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) => this.right_queue.push_back(item),
                Poll::Ready(None) => *this.right_done = true,
                Poll::Pending => break,
            }
        }

        if !this.left_queue.is_empty() && !this.right_queue.is_empty() {
            if let (Some(left), Some(right)) =
                (this.left_queue.pop_front(), this.right_queue.pop_front())
            {
                return Poll::Ready(Some(Ok((left, right))));
            }
        }

        let left_exhausted = *this.left_done && this.left_queue.is_empty();
        let right_exhausted = *this.right_done && this.right_queue.is_empty();
        if left_exhausted || right_exhausted {
            *this.terminated = true;
            this.left_queue.clear();
            this.right_queue.clear();
            return Poll::Ready(None);
        }

        Poll::Pending
    }
}

/// Extension trait adding [`AlignedZip`] to fallible streams.
pub trait AlignedZipExt<T, E>: Stream<Item = Result<T, E>> + Sized {
    /// Pairs this stream with `other` by arrival index.
    fn zip_aligned<R: Stream>(self, other: R) -> AlignedZip<Self, R, T> {
        AlignedZip::new(self, other)
    }

    fn zip_aligned_with_capacity<R: Stream>(
        self,
        other: R,
        capacity: usize,
    ) -> AlignedZip<Self, R, T> {
        AlignedZip::with_capacity(self, other, capacity)
    }
}

impl<S, T, E> AlignedZipExt<T, E> for S where S: Stream<Item = Result<T, E>> {}
