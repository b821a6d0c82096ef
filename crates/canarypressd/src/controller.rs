//! Controller loop: glue between the reconciler, the codec, and the device
//! channel.
//!
//! One `select!` drives everything: the poll tick refreshes release state,
//! inbound desired-percentage frames become weight plans and pushes, and the
//! device log stream is unwrapped onto the tracing output. Backend errors are
//! per-tick recoverable; transport errors and link loss end the loop.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use canarypress_api::ReleaseApi;
use canarypress_codec::{decode, encode_percentage, encode_ready, Command};
use canarypress_release::{planner, Reconciler, WeightPlan};
use canarypress_transport::{strip_log_framing, Attribute, Transport, TransportError};

pub struct Controller<A: ReleaseApi, T: Transport> {
    reconciler: Reconciler<A>,
    transport: T,
    poll_interval: Duration,
}

impl<A: ReleaseApi, T: Transport> Controller<A, T> {
    pub fn new(
        api: A,
        transport: T,
        release_group: impl Into<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            reconciler: Reconciler::new(api, release_group),
            transport,
            poll_interval,
        }
    }

    /// Run until shutdown. Returns early on transport failure or link loss.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let mut desired = self.transport.subscribe(Attribute::DesiredPercentage)?;
        let mut device_log = self.transport.subscribe(Attribute::DeviceLog)?;
        let mut disconnected = self.transport.disconnected();

        let mut poll = interval(self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = poll.tick() => {
                    self.refresh_tick().await?;
                }
                frame = desired.recv() => {
                    let Some(frame) = frame else {
                        return Err(TransportError::Subscribe(Attribute::DesiredPercentage).into());
                    };
                    self.handle_desired(&frame).await?;
                }
                frame = device_log.recv() => {
                    let Some(frame) = frame else {
                        return Err(TransportError::Subscribe(Attribute::DeviceLog).into());
                    };
                    let line = String::from_utf8_lossy(&frame).into_owned();
                    info!(device_log = strip_log_framing(&line), "device");
                }
                _ = disconnected.changed() => {
                    if *disconnected.borrow() {
                        anyhow::bail!("peripheral link lost");
                    }
                }
                _ = shutdown.changed() => {
                    info!("controller shutting down");
                    return Ok(());
                }
            }
        }
    }

    /// One poll tick. Backend failures keep stale state; only the
    /// readiness-changed edge reaches the device.
    async fn refresh_tick(&mut self) -> anyhow::Result<()> {
        match self.reconciler.refresh().await {
            Ok(delta) => {
                if let Some(ready) = delta.readiness_changed {
                    self.transport
                        .write(Attribute::ReleaseReady, vec![encode_ready(ready)])
                        .await?;
                }
            }
            Err(err) => {
                warn!(error = %err, "refresh failed, keeping stale state");
            }
        }
        Ok(())
    }

    /// One inbound desired-percentage frame. Violations are logged and the
    /// frame dropped; well-formed commands become a plan and a push.
    async fn handle_desired(&mut self, frame: &[u8]) -> anyhow::Result<()> {
        let Some(&byte) = frame.first() else {
            error!("empty desired-percentage frame");
            return Ok(());
        };
        let desired_pct = match decode(byte) {
            Ok(Command::SetPercentage(pct)) => pct,
            Ok(Command::Complete) => 100,
            Err(err) => {
                error!(error = %err, "dropping inbound frame");
                return Ok(());
            }
        };

        let Some(plan) = self.plan_for(desired_pct) else {
            return Ok(());
        };
        match self.reconciler.push(&plan).await {
            Ok(()) => {
                let observed = planner::observed_percentage(&plan);
                self.transport
                    .write(Attribute::ReleasePercentage, vec![encode_percentage(observed)])
                    .await?;
            }
            Err(err) => {
                warn!(error = %err, desired_pct, "push failed");
            }
        }
        Ok(())
    }

    fn plan_for(&self, desired_pct: u8) -> Option<WeightPlan> {
        let state = self.reconciler.state();
        let Some(current) = state.current_version.as_deref() else {
            warn!("no current version known yet, ignoring press");
            return None;
        };
        let Some(candidate) = self.reconciler.candidate_version() else {
            warn!(current, "no candidate version, ignoring press");
            return None;
        };
        Some(planner::plan(current, candidate, desired_pct))
    }
}
