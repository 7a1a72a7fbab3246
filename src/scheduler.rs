//! Timer driving periodic ingestion runs.
//!
//! Ticks are aligned to multiples of the interval since the Unix epoch, so an hourly
//! schedule fires at the top of every hour. Runs never overlap: the next tick is computed
//! only after the previous run returned, and ticks missed while a run was in progress are
//! collapsed into the next future one.

use std::{fmt::Display, future::Future, time::Duration};

use time::OffsetDateTime;

use crate::config::ScheduleConfig;

/// Lateness tolerated before a tick is reported as past due.
pub const DEFAULT_PAST_DUE_GRACE: Duration = Duration::from_secs(30);

/// When runs fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    /// Distance between ticks; must be at least one second.
    pub interval: Duration,
    /// Fire once immediately before waiting for the first tick.
    pub run_on_startup: bool,
    /// Lateness tolerated before a tick counts as past due.
    pub past_due_grace: Duration,
}

impl From<&ScheduleConfig> for Schedule {
    fn from(config: &ScheduleConfig) -> Self {
        Self {
            interval: config.interval,
            run_on_startup: config.run_on_startup,
            past_due_grace: DEFAULT_PAST_DUE_GRACE,
        }
    }
}

/// Why a run fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Startup run.
    Startup,
    /// Regular tick.
    Tick,
}

/// Timing details handed to each run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerInfo {
    /// Instant the run was due.
    pub scheduled_at: OffsetDateTime,
    /// Instant the run actually started.
    pub fired_at: OffsetDateTime,
    /// Whether the run started later than the grace period allows.
    pub past_due: bool,
    /// What fired the run.
    pub trigger: Trigger,
}

impl Schedule {
    fn interval_secs(&self) -> i64 {
        i64::try_from(self.interval.as_secs())
            .unwrap_or(i64::MAX)
            .max(1)
    }

    /// First aligned tick strictly after `now`.
    pub fn next_tick_after(&self, now: OffsetDateTime) -> OffsetDateTime {
        let interval = self.interval_secs();
        let next = (now.unix_timestamp().div_euclid(interval) + 1).saturating_mul(interval);
        OffsetDateTime::from_unix_timestamp(next).unwrap_or(now)
    }

    /// Whether a run due at `scheduled_at` that started at `fired_at` is past due.
    pub fn is_past_due(&self, scheduled_at: OffsetDateTime, fired_at: OffsetDateTime) -> bool {
        fired_at - scheduled_at > self.past_due_grace
    }
}

/// Fire `job` on `schedule` until ctrl-c or until a run fails.
///
/// A run that returns an error stops the loop and the error is handed back to the caller.
pub async fn run_forever<F, Fut, E>(schedule: Schedule, mut job: F) -> Result<(), E>
where
    F: FnMut(TimerInfo) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    if schedule.run_on_startup {
        let now = OffsetDateTime::now_utc();
        tracing::info!("Running startup ingestion");
        job(TimerInfo {
            scheduled_at: now,
            fired_at: now,
            past_due: false,
            trigger: Trigger::Startup,
        })
        .await?;
    }

    loop {
        let now = OffsetDateTime::now_utc();
        let scheduled_at = schedule.next_tick_after(now);
        tracing::debug!(next = %scheduled_at, "Waiting for next tick");

        tokio::select! {
            _ = tokio::time::sleep((scheduled_at - now).unsigned_abs()) => {}
            signal = tokio::signal::ctrl_c() => {
                if let Err(error) = signal {
                    tracing::error!(error = %error, "Failed to listen for shutdown signal");
                }
                tracing::info!("Shutdown requested; stopping scheduler");
                return Ok(());
            }
        }

        let fired_at = OffsetDateTime::now_utc();
        let past_due = schedule.is_past_due(scheduled_at, fired_at);
        if past_due {
            tracing::warn!(scheduled = %scheduled_at, fired = %fired_at, "Timer is past due");
        }

        if let Err(error) = job(TimerInfo {
            scheduled_at,
            fired_at,
            past_due,
            trigger: Trigger::Tick,
        })
        .await
        {
            tracing::error!(error = %error, "Scheduled run aborted; stopping scheduler");
            return Err(error);
        }
    }
}
