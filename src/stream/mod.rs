//! Stream adapters used to compose the derived pipelines.

mod multicast;
mod zip;

use std::future;

use futures_util::stream::{Stream, StreamExt};

pub use multicast::{Multicast, MulticastStream};
pub use zip::{AlignedZip, AlignedZipExt};

/// Ends `stream` right after its first error, so a failure is observed once
/// and nothing follows it.
pub fn fail_fast<S, T, E>(stream: S) -> impl Stream<Item = Result<T, E>>
where
    S: Stream<Item = Result<T, E>>,
{
    stream.scan(false, |failed, item| {
        if *failed {
            return future::ready(None);
        }
        *failed = item.is_err();
        future::ready(Some(item))
    })
}
