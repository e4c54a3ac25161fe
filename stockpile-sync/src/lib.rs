//! # stockpile-sync
//!
//! Mirrors a local package cache to a remote artifact store, skipping
//! anything an index already records as present.
//!
//! The engine is a lazy pipeline: [`scanner::LocalCache`] emits one bundle per
//! version directory, a chain of [`filter::BundleFilter`]s narrows each bundle
//! to the files still to be sent, and [`builder::IndexBuilder`] synchronizes
//! the survivors on a bounded worker pool before repacking and publishing the
//! index. [`pipeline::run`] wires it together from [`stockpile_core::Settings`].

pub mod archive;
pub mod builder;
pub mod context;
pub mod error;
pub mod filter;
pub mod index;
pub mod pipeline;
pub mod reactor;
pub mod scanner;
pub mod store;

pub use builder::{BuildOptions, BuildOutcome, IndexBuilder};
pub use context::Context;
pub use error::{DeployError, IndexParseError, StoreError, SyncError, SyncFailure};
pub use filter::{BundleFilter, BundleStream, Completion};
pub use index::Index;
pub use pipeline::{PlannedBundle, RunSummary};
pub use reactor::ReactorFilter;
pub use scanner::LocalCache;
pub use store::{FileStore, HttpStore, RemoteStore, StoreTarget};
