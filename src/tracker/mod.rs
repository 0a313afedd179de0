pub mod ticker;

use crate::clock;
use crate::db::schema::{NOTIFIED_KEY, STATE_KEY, USAGE_DATE_KEY, USAGE_TODAY_KEY};
use crate::db::{self, Database};
use crate::domain;
use crate::error::AppError;
use crate::events::{Effect, IdleState, Signal};
use crate::models::{ActivationState, Limits, NotifiedToday, UsageToday};
use log::{debug, info, warn};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Point-in-time view of today's accrual, returned by [`Tracker::get_data`].
#[derive(Debug, Clone, Serialize)]
pub struct UsageSnapshot {
    #[serde(rename = "usageToday")]
    pub usage_today: BTreeMap<String, i64>,
    #[serde(rename = "usageDate")]
    pub usage_date: String,
    pub limits: BTreeMap<String, i64>,
}

/// The accrual and limit-notification engine. Every operation locks the
/// store once, does its read-modify-write while holding the lock, and
/// returns the effects the boundary should dispatch. The mutex is what
/// keeps two handlers from interleaving their reads and writes.
pub struct Tracker {
    db: Arc<Mutex<Database>>,
}

impl Tracker {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    fn lock_db(&self) -> MutexGuard<'_, Database> {
        match self.db.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Tracker: database mutex was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Re-establish a clean initial state at process start: per-day records
    /// validated, no period open. A period left behind by a previous run is
    /// discarded rather than finalized, so time spent while the host was not
    /// running is never accrued to the last tracked domain.
    pub fn startup(&self) -> Result<(), AppError> {
        let db = self.lock_db();
        let conn = db.connection();

        ensure_day(conn, &clock::today_str())?;

        let state = ActivationState::load(conn)?;
        if state.is_tracking() {
            info!(
                "Discarding stale tracked period for {}",
                state.domain.as_deref().unwrap_or("?")
            );
        }
        ActivationState::idle().save(conn)?;
        Ok(())
    }

    /// Reset the per-day records if the stored day no longer matches.
    pub fn ensure_today(&self) -> Result<(), AppError> {
        self.ensure_day(&clock::today_str())
    }

    pub fn ensure_day(&self, today: &str) -> Result<(), AppError> {
        let db = self.lock_db();
        ensure_day(db.connection(), today)
    }

    /// Close out the currently tracked period, if any, accruing its elapsed
    /// seconds and re-checkpointing the period start.
    pub fn finalize(&self) -> Result<Vec<Effect>, AppError> {
        self.finalize_at(clock::now_ms(), &clock::today_str())
    }

    pub fn finalize_at(&self, now_ms: i64, today: &str) -> Result<Vec<Effect>, AppError> {
        let db = self.lock_db();
        finalize_period(db.connection(), now_ms, today)
    }

    /// Close the previous period and start tracking under the given domain,
    /// or stop tracking entirely when `domain` is `None`.
    pub fn activate(&self, domain: Option<&str>) -> Result<Vec<Effect>, AppError> {
        self.activate_at(domain, clock::now_ms(), &clock::today_str())
    }

    pub fn activate_at(
        &self,
        domain: Option<&str>,
        now_ms: i64,
        today: &str,
    ) -> Result<Vec<Effect>, AppError> {
        let db = self.lock_db();
        let conn = db.connection();

        // Finalize-then-restart under one lock so no other handler can
        // slip a write between the two steps.
        let mut effects = finalize_period(conn, now_ms, today)?;

        let state = match domain {
            Some(domain) => {
                debug!("Now tracking {}", domain);
                ActivationState::tracking(domain, now_ms)
            }
            None => {
                debug!("Tracking deactivated");
                effects.push(Effect::ClearBadge);
                ActivationState::idle()
            }
        };
        state.save(conn)?;

        Ok(effects)
    }

    /// Map an environment signal onto the activation state machine.
    pub fn handle_signal(&self, signal: &Signal) -> Result<Vec<Effect>, AppError> {
        self.handle_signal_at(signal, clock::now_ms(), &clock::today_str())
    }

    pub fn handle_signal_at(
        &self,
        signal: &Signal,
        now_ms: i64,
        today: &str,
    ) -> Result<Vec<Effect>, AppError> {
        match signal {
            Signal::TabActivated { url } | Signal::WindowFocusChanged { url } => {
                let domain = url.as_deref().and_then(domain::clean_host);
                self.activate_at(domain.as_deref(), now_ms, today)
            }
            Signal::NavigationCompleted { url } => {
                let domain = domain::clean_host(url);
                self.activate_at(domain.as_deref(), now_ms, today)
            }
            Signal::IdleStateChanged { state, url } => match state {
                IdleState::Active => {
                    let domain = url.as_deref().and_then(domain::clean_host);
                    self.activate_at(domain.as_deref(), now_ms, today)
                }
                IdleState::Idle | IdleState::Locked => self.activate_at(None, now_ms, today),
            },
            Signal::Tick => self.finalize_at(now_ms, today),
        }
    }

    /// Fresh snapshot of today's accrual for the reporting surface. The
    /// current period is finalized first, which may itself cross a limit,
    /// hence the returned effects.
    pub fn get_data(&self) -> Result<(UsageSnapshot, Vec<Effect>), AppError> {
        self.get_data_at(clock::now_ms(), &clock::today_str())
    }

    pub fn get_data_at(
        &self,
        now_ms: i64,
        today: &str,
    ) -> Result<(UsageSnapshot, Vec<Effect>), AppError> {
        let db = self.lock_db();
        let conn = db.connection();

        let effects = finalize_period(conn, now_ms, today)?;

        let usage = UsageToday::load(conn)?;
        let limits = Limits::load(conn)?;
        let usage_date: String =
            db::get_value(conn, USAGE_DATE_KEY)?.unwrap_or_else(|| today.to_string());

        let snapshot = UsageSnapshot {
            usage_today: usage.seconds_by_domain,
            usage_date,
            limits: limits.minutes_by_domain,
        };
        Ok((snapshot, effects))
    }

    /// Configure a domain's daily limit; `minutes <= 0` removes it.
    pub fn set_limit(&self, domain: &str, minutes: i64) -> Result<(), AppError> {
        let domain = domain.trim().to_lowercase();
        if domain.is_empty() {
            return Err(AppError::InvalidInput {
                field: "domain",
                reason: "must not be empty".into(),
            });
        }

        let db = self.lock_db();
        let conn = db.connection();

        let mut limits = Limits::load(conn)?;
        limits.set(&domain, minutes);
        limits.save(conn)?;

        if minutes > 0 {
            info!("Limit for {} set to {} minutes", domain, minutes);
        } else {
            info!("Limit for {} removed", domain);
        }
        Ok(())
    }

    /// Wipe today's accrual and notification flags without waiting for the
    /// day to roll over. Configured limits are untouched.
    pub fn clear_today(&self) -> Result<(), AppError> {
        let db = self.lock_db();
        let conn = db.connection();

        db::set_many(
            conn,
            &[
                (USAGE_DATE_KEY, serde_json::to_string(&clock::today_str())?),
                (USAGE_TODAY_KEY, UsageToday::default().to_json()?),
                (NOTIFIED_KEY, NotifiedToday::default().to_json()?),
            ],
        )?;
        info!("Cleared today's usage");
        Ok(())
    }
}

/// Day-rollover guard: compare the stored day identifier with `today` and
/// reset the per-day records on mismatch. Idempotent within a day. Limits
/// and the activation state are untouched.
fn ensure_day(conn: &Connection, today: &str) -> Result<(), AppError> {
    let stored: Option<String> = db::get_value(conn, USAGE_DATE_KEY)?;
    if stored.as_deref() == Some(today) {
        return Ok(());
    }

    info!(
        "Day rollover: {} -> {}",
        stored.as_deref().unwrap_or("(unset)"),
        today
    );
    db::set_many(
        conn,
        &[
            (USAGE_DATE_KEY, serde_json::to_string(today)?),
            (USAGE_TODAY_KEY, UsageToday::default().to_json()?),
            (NOTIFIED_KEY, NotifiedToday::default().to_json()?),
        ],
    )
}

/// The central accrual step, and the only writer of the usage record.
/// Safe to call redundantly: when nothing is tracked it is a no-op, and
/// the re-checkpoint after every call keeps elapsed time from ever being
/// counted twice.
fn finalize_period(conn: &Connection, now_ms: i64, today: &str) -> Result<Vec<Effect>, AppError> {
    ensure_day(conn, today)?;

    let mut state = ActivationState::load(conn)?;
    let (domain, started_ms) = match (&state.domain, state.period_start_ms) {
        (Some(domain), Some(started_ms)) if state.active => (domain.clone(), started_ms),
        _ => return Ok(Vec::new()),
    };

    let delta_secs = (now_ms - started_ms) / 1000;
    if delta_secs <= 0 {
        // Clock anomaly or same-second re-entry: advance the checkpoint so
        // the interval is not counted again, accrue nothing.
        debug!("Non-positive delta for {}, re-checkpointing", domain);
        state.period_start_ms = Some(now_ms);
        state.save(conn)?;
        return Ok(Vec::new());
    }

    let mut usage = UsageToday::load(conn)?;
    let mut notified = NotifiedToday::load(conn)?;
    let limits = Limits::load(conn)?;

    let total_secs = usage.add_seconds(&domain, delta_secs);
    let effects = evaluate_limit(&domain, total_secs, &limits, &mut notified);

    state.period_start_ms = Some(now_ms);

    db::set_many(
        conn,
        &[
            (USAGE_TODAY_KEY, usage.to_json()?),
            (NOTIFIED_KEY, notified.to_json()?),
            (STATE_KEY, state.to_json()?),
        ],
    )?;

    Ok(effects)
}

/// At most one notification per domain per day: the first time a domain's
/// total reaches its configured limit, emit the notification and alert
/// effects and remember the domain for the rest of the day.
fn evaluate_limit(
    domain: &str,
    total_secs: i64,
    limits: &Limits,
    notified: &mut NotifiedToday,
) -> Vec<Effect> {
    let limit_minutes = match limits.minutes_for(domain) {
        Some(minutes) => minutes,
        None => return Vec::new(),
    };
    if notified.contains(domain) || total_secs < limit_minutes.saturating_mul(60) {
        return Vec::new();
    }

    info!(
        "{} exceeded its {}-minute limit ({}s accrued today)",
        domain, limit_minutes, total_secs
    );
    notified.mark(domain);
    vec![
        Effect::Notify {
            domain: domain.to_string(),
            limit_minutes,
        },
        Effect::SetAlertBadge,
    ]
}
