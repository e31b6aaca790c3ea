//! The periodic-task scheduler every collector in the `collectors` crate
//! runs on top of (spec §4.4-§4.10, §5, §9 "Scheduling"). Each collector
//! kind (server list, timetable, realtime trains, dispatch posts,
//! cancellation sweep, database cleanup) owns a tick interval and its own
//! `State`; the scheduler only owns the run loop, backoff and supervision.
//!
//! Unlike a multi-tenant collector fleet with per-instance enable/disable
//! rows in a database, SimRail's collector set is fixed at process start --
//! one of each kind, every server -- so collector state lives in memory for
//! the lifetime of the task rather than round-tripping through a store
//! between ticks.

use std::any::Any;
use std::fmt::Debug;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use futures::FutureExt;
use tokio::time::{self, sleep};

#[derive(Clone)]
pub enum Continuation {
    /// Sleep for a fixed duration before the next run.
    ContinueAfter(Duration),
    /// Sleep until a specific point in time before the next run.
    ContinueAt(DateTime<Local>),
    /// Run again on the collector's normal tick interval.
    Continue,
    /// Rebuild the collector from its initial state and run again.
    Restart,
    /// Stop the scheduler for this collector.
    Exit,
}

#[derive(Clone)]
pub enum SupervisionStrategy {
    Restart,
    Resume,
    Stop,
}

#[async_trait]
pub trait Collector: Send + 'static {
    type Error: Debug + Send;
    type Context: Send + Sync + 'static;
    type State: Clone + Send + 'static;

    fn unique_id() -> &'static str;

    async fn run(
        &mut self,
        context: &Self::Context,
        state: Self::State,
    ) -> Result<(Continuation, Self::State), Self::Error>;

    fn tick(&self) -> Option<Duration> {
        Some(Duration::from_secs(10))
    }

    fn backoff(&self, last_backoff: Duration) -> Duration {
        last_backoff + self.tick().unwrap_or(Duration::from_secs(10))
    }

    fn on_error(&self, _error: Self::Error) -> SupervisionStrategy {
        SupervisionStrategy::Resume
    }

    fn on_panic(&self, _error: Box<dyn Any + Send>) -> SupervisionStrategy {
        SupervisionStrategy::Restart
    }
}

pub struct CollectorHandle;

async fn run_once<C>(
    collector: &mut C,
    context: &C::Context,
    state: C::State,
) -> Result<(Continuation, C::State), C::Error>
where
    C: Collector,
{
    collector.run(context, state).await
}

/// Spawns `collector` and keeps it running until it returns
/// [`Continuation::Exit`] or its supervision strategy is
/// [`SupervisionStrategy::Stop`]. `factory` rebuilds the collector (from its
/// caller-chosen initial state) whenever the current run is restarted,
/// either because the collector asked to (`Continuation::Restart`) or
/// because it failed and the strategy called for a restart.
pub fn run<C, F>(
    factory: F,
    context: C::Context,
    initial_state: C::State,
) -> CollectorHandle
where
    C: Collector,
    F: 'static + Send + Fn() -> C,
{
    tokio::spawn(async move {
        let mut collector = factory();
        let mut state = initial_state.clone();
        let mut interval = collector.tick().map(time::interval);
        let mut backoff = collector.tick().unwrap_or(Duration::from_secs(10));

        loop {
            let attempt = AssertUnwindSafe(run_once(&mut collector, &context, state.clone()))
                .catch_unwind()
                .await;

            let mut outcome = match attempt {
                Ok(Ok((continuation, new_state))) => {
                    state = new_state;
                    Ok(continuation)
                }
                Ok(Err(why)) => {
                    tracing::error!(collector = C::unique_id(), ?why, "collector failed");
                    Err(collector.on_error(why))
                }
                Err(why) => {
                    tracing::error!(collector = C::unique_id(), ?why, "collector panicked");
                    Err(collector.on_panic(why))
                }
            };

            if let Ok(continuation) = outcome.clone() {
                match continuation {
                    Continuation::ContinueAfter(duration) => sleep(duration).await,
                    Continuation::ContinueAt(at) => {
                        let now = Local::now();
                        if at > now {
                            if let Ok(remaining) = (at - now).to_std() {
                                sleep(remaining).await;
                            }
                        }
                    }
                    Continuation::Continue => {
                        if let Some(tick) = &mut interval {
                            tick.tick().await;
                        }
                    }
                    Continuation::Restart => {
                        collector = factory();
                        state = initial_state.clone();
                        if let Some(tick) = &mut interval {
                            tick.tick().await;
                        }
                    }
                    Continuation::Exit => {
                        tracing::info!(collector = C::unique_id(), "collector exiting");
                        break;
                    }
                }
                backoff = collector.tick().unwrap_or(Duration::from_secs(10));
                continue;
            }

            while let Err(strategy) = outcome.clone() {
                match strategy {
                    SupervisionStrategy::Restart => {
                        collector = factory();
                        state = initial_state.clone();
                        outcome = Ok(Continuation::Continue);
                    }
                    SupervisionStrategy::Resume => break,
                    SupervisionStrategy::Stop => return,
                }
                backoff = collector.backoff(backoff);
                sleep(backoff).await;
            }
        }
    });
    CollectorHandle
}
