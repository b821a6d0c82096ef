//! Release state reconciler.
//!
//! Each poll tick rebuilds the rollout picture from the backend: the current
//! version comes from the release group's first routing constraint, the
//! version set and readiness come from the prod-stage instances of the
//! referenced cluster. Nothing carries over between ticks except the previous
//! readiness boolean, kept solely to edge-trigger the readiness-changed
//! signal.

use std::collections::BTreeSet;

use tracing::{debug, info};

use canarypress_api::{MetadataEntry, ReleaseApi, RoutingConstraint};

use crate::error::{ReleaseError, ReleaseResult};
use crate::planner::WeightPlan;

/// Stage tag marking an instance as production traffic.
pub const PROD_STAGE: &str = "prod";

const STAGE_KEY: &str = "stage";
const VERSION_KEY: &str = "version";

/// Rollout picture as of the last successful refresh.
///
/// `versions` is recomputed from scratch every refresh, never merged with the
/// previous tick's value. `release_ready` is true iff at least one prod
/// instance runs a version other than `current_version`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseState {
    pub current_version: Option<String>,
    pub versions: BTreeSet<String>,
    pub release_ready: bool,
}

/// What one refresh produced.
///
/// `readiness_changed` is edge-triggered: `Some(new_value)` only on the tick
/// where the boolean flipped, at most once per tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshDelta {
    pub versions: BTreeSet<String>,
    pub readiness_changed: Option<bool>,
}

/// Polls the backend and owns the [`ReleaseState`]. All mutation happens in
/// [`refresh`](Self::refresh) and [`push`](Self::push).
pub struct Reconciler<A: ReleaseApi> {
    api: A,
    release_group: String,
    state: ReleaseState,
    last_group: Option<canarypress_api::ReleaseGroup>,
}

impl<A: ReleaseApi> Reconciler<A> {
    pub fn new(api: A, release_group: impl Into<String>) -> Self {
        Self {
            api,
            release_group: release_group.into(),
            state: ReleaseState::default(),
            last_group: None,
        }
    }

    /// Rollout picture as of the last successful refresh.
    pub fn state(&self) -> &ReleaseState {
        &self.state
    }

    /// The version a press would roll out to.
    ///
    /// When several non-current versions are live at once the
    /// lexicographically last one wins; the set is ordered, so the pick is
    /// stable across ticks.
    pub fn candidate_version(&self) -> Option<&str> {
        self.state
            .versions
            .iter()
            .rev()
            .map(String::as_str)
            .find(|v| Some(*v) != self.state.current_version.as_deref())
    }

    /// Fetch the release group and its cluster, rebuild the state, and report
    /// what changed.
    ///
    /// On error the previous state is retained untouched; the caller skips
    /// the tick and waits for the next one.
    pub async fn refresh(&mut self) -> ReleaseResult<RefreshDelta> {
        let envelope = self.api.get_release_group(&self.release_group).await?;
        let first = envelope
            .result
            .default
            .light
            .first()
            .ok_or_else(|| ReleaseError::EmptyRuleSet(self.release_group.clone()))?;

        let current_version = first.metadata_value(VERSION_KEY).map(str::to_string);
        let cluster_key = first.cluster_key.clone();

        let cluster = self.api.get_cluster(&cluster_key).await?;

        let mut versions = BTreeSet::new();
        let mut ready = false;
        for instance in &cluster.result.instances {
            if instance.metadata_value(STAGE_KEY) != Some(PROD_STAGE) {
                continue;
            }
            let version = instance.metadata_value(VERSION_KEY);
            if let Some(v) = version {
                versions.insert(v.to_string());
            }
            if version != current_version.as_deref() {
                ready = true;
            }
        }

        let readiness_changed = (ready != self.state.release_ready).then_some(ready);
        if let Some(new) = readiness_changed {
            info!(
                release_group = %self.release_group,
                ready = new,
                "readiness changed"
            );
        }

        self.state = ReleaseState {
            current_version,
            versions: versions.clone(),
            release_ready: ready,
        };
        self.last_group = Some(envelope.result);

        debug!(
            release_group = %self.release_group,
            current = ?self.state.current_version,
            versions = self.state.versions.len(),
            ready,
            "refreshed"
        );

        Ok(RefreshDelta {
            versions,
            readiness_changed,
        })
    }

    /// Push a weight plan, overwriting the release group's entire constraint
    /// list.
    ///
    /// The cluster key of the previous first constraint is preserved and
    /// every new constraint is stamped `stage=prod`. Requires at least one
    /// successful refresh, since the push body starts from the last fetched
    /// group.
    pub async fn push(&mut self, plan: &WeightPlan) -> ReleaseResult<()> {
        let mut group = self
            .last_group
            .clone()
            .ok_or(ReleaseError::NotSynchronized)?;
        let cluster_key = group
            .default
            .light
            .first()
            .map(|c| c.cluster_key.clone())
            .ok_or_else(|| ReleaseError::EmptyRuleSet(self.release_group.clone()))?;

        group.default.light = plan
            .targets
            .iter()
            .map(|target| RoutingConstraint {
                cluster_key: cluster_key.clone(),
                metadata: vec![
                    MetadataEntry {
                        key: STAGE_KEY.to_string(),
                        value: PROD_STAGE.to_string(),
                    },
                    MetadataEntry {
                        key: VERSION_KEY.to_string(),
                        value: target.version.clone(),
                    },
                ],
                weight: target.weight,
                extra: Default::default(),
            })
            .collect();

        self.api
            .put_release_group(&self.release_group, &group)
            .await?;

        info!(
            release_group = %self.release_group,
            targets = plan.targets.len(),
            "release updated"
        );
        self.last_group = Some(group);
        Ok(())
    }
}
