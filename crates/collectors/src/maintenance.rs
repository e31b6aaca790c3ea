//! Maintenance collectors (spec §4.10): a frequent sweep that cancels
//! journeys that were registered but never actually spawned, and a daily
//! cron-scheduled sweep that deletes journeys nobody has touched in months.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cron::Schedule;

use model::server::Server;
use model::snapshot::SnapshotPayload;
use platform::{Collector, Continuation, SupervisionStrategy};

use crate::CollectorContext;

/// Spec §4.10: a registered journey that never reported a first realtime
/// position within this window is considered cancelled rather than delayed.
const NEVER_SPAWNED_CUTOFF_MINUTES: i64 = 20;

/// Spec §4.10: journeys untouched for this long are deleted outright.
const STALE_JOURNEY_RETENTION_DAYS: i64 = 90;

/// Spec §4.10: the cleanup sweep fires once a day at 05:00 UTC, the upstream
/// providers' quietest hour.
const CLEANUP_CRON_EXPRESSION: &str = "0 0 5 * * *";

/// Cancellation sweep (spec §4.10): per server, finds journeys that were
/// registered from the timetable but never picked up a realtime position,
/// and marks both the journey and every one of its events cancelled.
pub struct CancellationCollector;

#[async_trait]
impl Collector for CancellationCollector {
    type Error = ();
    type Context = CollectorContext;
    type State = ();

    fn unique_id() -> &'static str {
        "journey-cancellation-collector"
    }

    fn tick(&self) -> Option<Duration> {
        Some(Duration::from_secs(120))
    }

    async fn run(&mut self, context: &Self::Context, state: Self::State) -> Result<(Continuation, Self::State), Self::Error> {
        let servers: Vec<Server> = context
            .platform
            .servers
            .snapshot()
            .into_iter()
            .filter_map(|frame| match frame.payload {
                SnapshotPayload::Server(server) => Some(*server),
                _ => None,
            })
            .filter(|server| !server.deleted)
            .collect();

        let cutoff = Utc::now() - chrono::Duration::minutes(NEVER_SPAWNED_CUTOFF_MINUTES);

        for server in &servers {
            let journey_ids = match context.platform.db.journeys_never_spawned_before(server.id, cutoff).await {
                Ok(ids) => ids,
                Err(why) => {
                    tracing::error!(error = %why, server = %server.code, "failed listing never-spawned journeys");
                    continue;
                }
            };

            for journey_id in journey_ids {
                if let Err(why) = context.platform.db.mark_journey_cancelled(journey_id).await {
                    tracing::error!(error = %why, "failed marking journey cancelled");
                    continue;
                }

                let mut events = match context.platform.db.events_for_journey(journey_id).await {
                    Ok(events) => events,
                    Err(why) => {
                        tracing::error!(error = %why, "failed loading events for cancelled journey");
                        continue;
                    }
                };
                for event in &mut events {
                    event.cancelled = true;
                }
                if let Err(why) = context.platform.db.replace_events(journey_id, &events).await {
                    tracing::error!(error = %why, "failed persisting cancelled events");
                }
            }
        }

        Ok((Continuation::Continue, state))
    }

    fn on_error(&self, _error: Self::Error) -> SupervisionStrategy {
        SupervisionStrategy::Resume
    }
}

#[derive(Default, Clone)]
pub struct DatabaseCleanupState {
    last_fired: Option<DateTime<Utc>>,
}

/// Daily cleanup sweep (spec §4.10): deletes journeys (and their events and
/// vehicles) that have had no update in `STALE_JOURNEY_RETENTION_DAYS`.
pub struct DatabaseCleanupCollector {
    schedule: Schedule,
}

impl DatabaseCleanupCollector {
    pub fn new() -> Self {
        Self {
            schedule: Schedule::from_str(CLEANUP_CRON_EXPRESSION).expect("cleanup cron expression is valid"),
        }
    }
}

impl Default for DatabaseCleanupCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Collector for DatabaseCleanupCollector {
    type Error = ();
    type Context = CollectorContext;
    type State = DatabaseCleanupState;

    fn unique_id() -> &'static str {
        "database-cleanup-collector"
    }

    fn tick(&self) -> Option<Duration> {
        Some(Duration::from_secs(600))
    }

    async fn run(&mut self, context: &Self::Context, mut state: Self::State) -> Result<(Continuation, Self::State), Self::Error> {
        let now = Utc::now();
        let due = match state.last_fired {
            Some(last) => self.schedule.after(&last).next().is_some_and(|next| next <= now),
            None => true,
        };
        if !due {
            return Ok((Continuation::Continue, state));
        }
        state.last_fired = Some(now);

        let cutoff = now - chrono::Duration::days(STALE_JOURNEY_RETENTION_DAYS);
        let journey_ids = match context.platform.db.journeys_without_update_since(cutoff).await {
            Ok(ids) => ids,
            Err(why) => {
                tracing::error!(error = %why, "failed listing stale journeys");
                return Ok((Continuation::Continue, state));
            }
        };

        let mut deleted_count: u64 = 0;
        for journey_id in journey_ids {
            if let Err(why) = context.platform.db.delete_journey_cascade(journey_id).await {
                tracing::error!(error = %why, "failed deleting stale journey");
                continue;
            }
            deleted_count += 1;
        }
        tracing::info!(count = deleted_count, "stale journey cleanup sweep complete");

        Ok((Continuation::Continue, state))
    }

    fn on_error(&self, _error: Self::Error) -> SupervisionStrategy {
        SupervisionStrategy::Resume
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cron_expression_parses_and_fires_once_a_day() {
        let schedule = Schedule::from_str(CLEANUP_CRON_EXPRESSION).unwrap();
        let first = schedule.upcoming(Utc).next().unwrap();
        let second = schedule.after(&first).next().unwrap();
        assert_eq!((second - first).num_hours(), 24);
    }
}
