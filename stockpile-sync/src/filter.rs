//! The bundle filter chain.
//!
//! Each stage consumes a lazy stream of bundles and yields a narrower one.
//! Stages never remove a bundle's descriptor or coordinate; they either drop
//! the bundle or return a transformed copy.

use stockpile_core::Bundle;

use crate::error::SyncError;

/// Lazy stream of bundles flowing from the scanner towards synchronization.
pub type BundleStream<'a> = Box<dyn Iterator<Item = Result<Bundle, SyncError>> + Send + 'a>;

/// One stage of the chain.
pub trait BundleFilter: Send + Sync {
    /// Short label for log messages.
    fn label(&self) -> String;

    fn apply<'a>(&'a self, bundles: BundleStream<'a>) -> BundleStream<'a>;
}

/// Thread `bundles` through every filter in order.
pub fn apply_chain<'a>(bundles: BundleStream<'a>, filters: &'a [Box<dyn BundleFilter>]) -> BundleStream<'a> {
    filters.iter().fold(bundles, |stream, filter| {
        tracing::debug!(filter = %filter.label(), "attaching filter");
        filter.apply(stream)
    })
}

/// Bundle completion as a chain stage: expands descriptor-only bundles into
/// the files on disk that belong to them.
///
/// A version directory that can no longer be listed is skipped with a
/// warning.
#[derive(Debug, Default, Clone, Copy)]
pub struct Completion;

impl BundleFilter for Completion {
    fn label(&self) -> String {
        "completion".to_string()
    }

    fn apply<'a>(&'a self, bundles: BundleStream<'a>) -> BundleStream<'a> {
        Box::new(bundles.filter_map(|bundle| {
            let bundle = match bundle {
                Ok(bundle) => bundle,
                Err(err) => return Some(Err(err)),
            };
            let coordinate = bundle.coordinate().clone();
            match bundle.find_deployables() {
                Ok(completed) => Some(Ok(completed)),
                Err(err) => {
                    tracing::warn!(%coordinate, error = %err, "skipping unreadable bundle directory");
                    None
                }
            }
        }))
    }
}
