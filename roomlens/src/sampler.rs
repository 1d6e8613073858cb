//! Stats sampler
//!
//! One background task per room polls the vendor's aggregate statistics and
//! posts every report back to the supervisor loop. The task never touches a
//! record; rates are computed when the loop applies the report with
//! [`apply_reports`].

use crate::supervisor::SupervisorCommand;
use roomlens_core::{RoomLensError, StatsReport, StatsSource, TrackRegistry};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// Default polling period
pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(1);

/// Handle of a running sampler task. Dropping it cancels the task.
#[derive(Debug)]
pub struct SamplerHandle {
    room_sid: String,
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl SamplerHandle {
    /// Room the sampler polls
    pub fn room_sid(&self) -> &str {
        &self.room_sid
    }

    /// Generation the sampler tags its reports with
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Check if the task is still scheduled
    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop the task. No tick fires after this returns.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("Stopped stats sampler for room {}", self.room_sid);
        }
    }
}

impl Drop for SamplerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Spawns sampler tasks
#[derive(Clone)]
pub struct StatsSampler {
    period: Duration,
    commands: mpsc::UnboundedSender<SupervisorCommand>,
}

impl StatsSampler {
    /// Create a sampler posting to `commands` every `period` (at least 1 ms)
    pub fn new(period: Duration, commands: mpsc::UnboundedSender<SupervisorCommand>) -> Self {
        Self {
            period: period.max(Duration::from_millis(1)),
            commands,
        }
    }

    /// Polling period
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Start polling `source` for `room_sid`. The first fetch happens one
    /// period from now.
    pub fn start(&self, room_sid: &str, generation: u64, source: Arc<dyn StatsSource>) -> SamplerHandle {
        let period = self.period;
        let commands = self.commands.clone();
        let sid = room_sid.to_string();

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let reports = match source.get_stats().await {
                    Ok(reports) => reports,
                    Err(e) => {
                        let error = match e {
                            RoomLensError::StatsFetch { .. } => e,
                            other => RoomLensError::StatsFetch {
                                room_sid: sid.clone(),
                                reason: other.to_string(),
                            },
                        };
                        warn!(code = error.error_code(), "{}", error);
                        continue;
                    }
                };

                trace!("Sampled {} reports for room {}", reports.len(), sid);
                let command = SupervisorCommand::StatsSampled {
                    room_sid: sid.clone(),
                    generation,
                    reports,
                };
                if commands.send(command).is_err() {
                    debug!("Supervisor gone, stopping sampler for room {}", sid);
                    break;
                }
            }
        });

        info!("🔄 Started stats sampler for room {} every {:?}", room_sid, period);
        SamplerHandle {
            room_sid: room_sid.to_string(),
            generation,
            task: Some(task),
        }
    }
}

/// Feed a batch of reports into a room's registry.
///
/// Entries that do not resolve to a registered track, or that resolve to a
/// track of the other origin, are skipped. Stopped tracks keep their last
/// rate. Returns the number of records updated.
pub fn apply_reports(registry: &mut TrackRegistry, reports: &[StatsReport]) -> usize {
    let mut updated = 0;
    for report in reports {
        for (origin, sample) in report.samples() {
            let Some(id) = registry.resolve(sample.track_sid.as_deref(), sample.track_id.as_deref()) else {
                trace!("No track for stats entry {:?}", sample.track_sid);
                continue;
            };
            let accepts = registry
                .get(&id)
                .is_some_and(|record| record.origin() == origin && record.accepts_samples());
            if !accepts {
                continue;
            }
            let byte_sample = sample.byte_sample();
            if registry
                .update(&id, |record| {
                    record.record_sample(byte_sample);
                })
                .is_ok()
            {
                updated += 1;
            }
        }
    }
    updated
}
