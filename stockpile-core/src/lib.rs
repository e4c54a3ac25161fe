//! Stockpile core library: coordinate and bundle value types, run statistics,
//! settings, errors.
//!
//! - [`coordinate`]: [`Coordinate`], [`IndexCoordinate`], [`ArtifactKey`]
//! - [`bundle`]: [`Item`] and [`Bundle`], including bundle completion
//! - [`stats`]: the [`Stats`] monoid folded over a run
//! - [`settings`]: YAML-backed [`Settings`]
//! - [`error`]: [`CoreError`]

pub mod bundle;
pub mod coordinate;
pub mod error;
pub mod settings;
pub mod stats;

pub use bundle::{Bundle, Item, Metadata, PARTIAL_DOWNLOAD_SUFFIX};
pub use coordinate::{ArtifactKey, Coordinate, IndexCoordinate, DESCRIPTOR_TYPE};
pub use error::CoreError;
pub use settings::Settings;
pub use stats::Stats;
