//! Reactor filter: drops snapshots that the current build did not produce
//! and flags the build's own bundles as required.

use std::collections::HashSet;

use stockpile_core::{Bundle, Coordinate};

use crate::filter::{BundleFilter, BundleStream};

#[derive(Debug, Clone, Default)]
pub struct ReactorFilter {
    reactor: HashSet<Coordinate>,
    reactor_aware: bool,
    deploy_snapshots: bool,
}

impl ReactorFilter {
    pub fn new(
        reactor: impl IntoIterator<Item = Coordinate>,
        reactor_aware: bool,
        deploy_snapshots: bool,
    ) -> Self {
        Self {
            reactor: reactor.into_iter().collect(),
            reactor_aware,
            deploy_snapshots,
        }
    }

    /// Whether `coordinate` belongs to the current build and may be deployed.
    pub fn is_reactor_deployable(&self, coordinate: &Coordinate) -> bool {
        self.reactor_aware
            && self.reactor.contains(coordinate)
            && (!coordinate.is_snapshot() || self.deploy_snapshots)
    }

    /// Snapshot coordinates that would be deployed as part of the build.
    pub fn deployable_snapshots(&self) -> impl Iterator<Item = &Coordinate> {
        self.reactor
            .iter()
            .filter(move |c| c.is_snapshot() && self.is_reactor_deployable(c))
    }

    fn admit(&self, bundle: Bundle) -> Option<Bundle> {
        let deployable = self.is_reactor_deployable(bundle.coordinate());
        if bundle.is_snapshot() && !deployable {
            tracing::trace!(coordinate = %bundle.coordinate(), "dropping non-reactor snapshot");
            return None;
        }
        Some(if deployable {
            bundle.mark_fail_on_error(true)
        } else {
            bundle
        })
    }
}

impl BundleFilter for ReactorFilter {
    fn label(&self) -> String {
        format!("reactor ({} coordinates)", self.reactor.len())
    }

    fn apply<'a>(&'a self, bundles: BundleStream<'a>) -> BundleStream<'a> {
        Box::new(bundles.filter_map(move |bundle| match bundle {
            Ok(bundle) => self.admit(bundle).map(Ok),
            Err(err) => Some(Err(err)),
        }))
    }
}
