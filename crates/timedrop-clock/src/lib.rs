#![warn(missing_docs)]
//! # timedrop-clock
//!
//! ## Purpose
//! Keeps the expiry field of the upload form consistent with wall-clock time.
//!
//! ## Responsibilities
//! - Convert absolute instants to the local `YYYY-MM-DD HH:MM` form format and
//!   back to RFC 3339 at submit time, using the zone offset in effect at each
//!   instant ([`ViewerZone`]).
//! - Capture min/max expiry bounds as offsets from "now" and re-project them on
//!   a one second tick, so an expiry that was valid when the form opened stays
//!   valid while it is open.
//! - Model the native validity check of a `datetime-local` control.
//!
//! ## Data flow
//! [`ExpiryBound`] (ISO strings from the server) -> [`DeadlineAdapter::capture`]
//! -> [`DeadlineAdapter::initialize`] writes the [`ExpiryField`] ->
//! [`ProjectionTask`] calls [`DeadlineAdapter::project`] every tick.
//!
//! ## Ownership and lifetimes
//! The field is shared between the projection task and the upload coordinator
//! through [`SharedExpiryField`]. The periodic task is owned by the
//! [`ProjectionTask`] returned from [`DeadlineAdapter::spawn_projection`] and
//! stops when that value is cancelled or dropped.
//!
//! ## Error model
//! Unparsable instants and local values surface as [`ClockError`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local, MappedLocalTime, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use thiserror::Error;
use time::format_description::BorrowedFormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Duration, OffsetDateTime, PrimitiveDateTime, UtcOffset};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Interval between two bound projections.
pub const PROJECTION_PERIOD: std::time::Duration = std::time::Duration::from_secs(1);

const FORM_FORMAT: &[BorrowedFormatItem<'_>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]");
const FORM_FORMAT_SECONDS: &[BorrowedFormatItem<'_>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Source of the current instant.
pub trait Clock: Send + Sync {
    /// Returns "now".
    fn now(&self) -> OffsetDateTime;
}

/// Clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Manually driven clock for tests and deterministic runs.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<OffsetDateTime>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    pub fn new(start: OffsetDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Moves the clock forward (or backward for negative durations).
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Time-zone rules used to render and read the expiry field.
///
/// The offset is looked up per instant, so values on the other side of a
/// daylight-saving change render with the offset in effect at that time.
pub trait ViewerZone: Send + Sync {
    /// Offset in effect at `instant`.
    fn offset_at(&self, instant: OffsetDateTime) -> UtcOffset;

    /// Offsets a wall-clock reading can carry in this zone.
    fn offsets_for(&self, wall: PrimitiveDateTime) -> WallClockOffsets;
}

/// Candidate offsets for one wall-clock reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WallClockOffsets {
    /// The reading names exactly one instant.
    Unique(UtcOffset),
    /// The reading occurs twice because clocks were turned back.
    Repeated(UtcOffset, UtcOffset),
    /// The reading never occurs because clocks were turned forward.
    Skipped,
}

impl ViewerZone for UtcOffset {
    fn offset_at(&self, _instant: OffsetDateTime) -> UtcOffset {
        *self
    }

    fn offsets_for(&self, _wall: PrimitiveDateTime) -> WallClockOffsets {
        WallClockOffsets::Unique(*self)
    }
}

/// Zone rules of the operating system (`TZ` or the system database).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemZone;

impl ViewerZone for SystemZone {
    fn offset_at(&self, instant: OffsetDateTime) -> UtcOffset {
        match DateTime::<Utc>::from_timestamp(instant.unix_timestamp(), 0) {
            Some(utc) => to_utc_offset(Local.offset_from_utc_datetime(&utc.naive_utc())),
            None => UtcOffset::UTC,
        }
    }

    fn offsets_for(&self, wall: PrimitiveDateTime) -> WallClockOffsets {
        let Some(naive) = to_naive(wall) else {
            return WallClockOffsets::Unique(self.offset_at(wall.assume_utc()));
        };
        match Local.offset_from_local_datetime(&naive) {
            MappedLocalTime::Single(offset) => WallClockOffsets::Unique(to_utc_offset(offset)),
            MappedLocalTime::Ambiguous(first, second) => {
                WallClockOffsets::Repeated(to_utc_offset(first), to_utc_offset(second))
            }
            MappedLocalTime::None => WallClockOffsets::Skipped,
        }
    }
}

fn to_utc_offset(offset: impl Offset) -> UtcOffset {
    UtcOffset::from_whole_seconds(offset.fix().local_minus_utc()).unwrap_or(UtcOffset::UTC)
}

fn to_naive(wall: PrimitiveDateTime) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(
        wall.year(),
        u32::from(u8::from(wall.month())),
        u32::from(wall.day()),
    )?
    .and_hms_opt(
        u32::from(wall.hour()),
        u32::from(wall.minute()),
        u32::from(wall.second()),
    )
}

/// Pins a wall-clock reading to one instant in `zone`.
///
/// A repeated reading resolves to the earlier instant. A skipped reading is
/// read with the offset in effect before the jump, which moves it forward by
/// the size of the gap.
pub fn resolve_wall_clock(wall: PrimitiveDateTime, zone: &dyn ViewerZone) -> OffsetDateTime {
    match zone.offsets_for(wall) {
        WallClockOffsets::Unique(offset) => wall.assume_offset(offset),
        WallClockOffsets::Repeated(first, second) => wall.assume_offset(first.max(second)),
        WallClockOffsets::Skipped => {
            let as_utc = wall.assume_utc();
            let before = as_utc.checked_sub(Duration::days(1)).unwrap_or(as_utc);
            wall.assume_offset(zone.offset_at(before))
        }
    }
}

/// Renders `instant` as local wall clock in form format, truncated to the
/// minute.
pub fn format_local(instant: OffsetDateTime, zone: &dyn ViewerZone) -> String {
    let local = instant
        .checked_to_offset(zone.offset_at(instant))
        .unwrap_or(instant);
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}",
        local.year(),
        u8::from(local.month()),
        local.day(),
        local.hour(),
        local.minute()
    )
}

/// Parses a form value into a wall-clock time without zone.
///
/// Accepts a space or `T` separator and optional seconds.
///
/// # Errors
/// Returns [`ClockError::InvalidLocalValue`] when the value is not a date/time.
pub fn parse_wall_clock(value: &str) -> Result<PrimitiveDateTime, ClockError> {
    let normalized = value.trim().replacen('T', " ", 1);
    PrimitiveDateTime::parse(&normalized, FORM_FORMAT)
        .or_else(|_| PrimitiveDateTime::parse(&normalized, FORM_FORMAT_SECONDS))
        .map_err(|_| ClockError::InvalidLocalValue(value.to_string()))
}

/// Parses a form value as an instant in `zone`.
///
/// # Errors
/// Returns [`ClockError::InvalidLocalValue`] when the value is not a date/time.
pub fn parse_local(value: &str, zone: &dyn ViewerZone) -> Result<OffsetDateTime, ClockError> {
    parse_wall_clock(value).map(|wall| resolve_wall_clock(wall, zone))
}

/// Parses an RFC 3339 instant.
///
/// # Errors
/// Returns [`ClockError::InvalidInstant`] for malformed input.
pub fn parse_iso(raw: &str) -> Result<OffsetDateTime, ClockError> {
    OffsetDateTime::parse(raw.trim(), &Rfc3339)
        .map_err(|error| ClockError::InvalidInstant(format!("{raw}: {error}")))
}

/// Absolute expiry limits delivered with the form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpiryBound {
    /// Pre-filled expiry.
    pub initial: Option<OffsetDateTime>,
    /// Earliest accepted expiry.
    pub min: Option<OffsetDateTime>,
    /// Latest accepted expiry.
    pub max: Option<OffsetDateTime>,
}

impl ExpiryBound {
    /// Builds bounds from optional ISO strings; blank strings count as absent.
    ///
    /// # Errors
    /// Returns [`ClockError::InvalidInstant`] when a present value is malformed.
    pub fn from_iso(
        initial: Option<&str>,
        min: Option<&str>,
        max: Option<&str>,
    ) -> Result<Self, ClockError> {
        let parse = |raw: Option<&str>| -> Result<Option<OffsetDateTime>, ClockError> {
            match raw {
                Some(value) if !value.trim().is_empty() => parse_iso(value).map(Some),
                _ => Ok(None),
            }
        };

        Ok(Self {
            initial: parse(initial)?,
            min: parse(min)?,
            max: parse(max)?,
        })
    }
}

/// State of a `datetime-local` input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpiryField {
    /// Current value in form format.
    pub value: String,
    /// Lower bound in form format.
    pub min: Option<String>,
    /// Upper bound in form format.
    pub max: Option<String>,
}

impl ExpiryField {
    /// Mirrors the native validity check: the value must be a date/time and
    /// lie within the present bounds.
    pub fn check_validity(&self) -> bool {
        let Ok(value) = parse_wall_clock(&self.value) else {
            return false;
        };

        bound_holds(self.min.as_deref(), |min| value >= min)
            && bound_holds(self.max.as_deref(), |max| value <= max)
    }
}

fn bound_holds(bound: Option<&str>, check: impl Fn(PrimitiveDateTime) -> bool) -> bool {
    match bound.map(parse_wall_clock) {
        Some(Ok(limit)) => check(limit),
        Some(Err(_)) | None => true,
    }
}

/// Expiry field shared by the projection task and the coordinator.
pub type SharedExpiryField = Arc<Mutex<ExpiryField>>;

/// Locks a shared field, recovering the data from a poisoned lock.
pub fn lock_field(field: &SharedExpiryField) -> MutexGuard<'_, ExpiryField> {
    field.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Converts between absolute and local form time and keeps bounds relative.
pub struct DeadlineAdapter {
    clock: Arc<dyn Clock>,
    zone: Arc<dyn ViewerZone>,
    initial: Option<OffsetDateTime>,
    min_offset: Option<Duration>,
    max_offset: Option<Duration>,
}

impl DeadlineAdapter {
    /// Reads "now" once and stores the bounds as offsets from it.
    pub fn capture(clock: Arc<dyn Clock>, zone: Arc<dyn ViewerZone>, bound: &ExpiryBound) -> Self {
        let loaded_at = clock.now();
        let adapter = Self {
            initial: bound.initial,
            min_offset: bound.min.map(|min| min - loaded_at),
            max_offset: bound.max.map(|max| max - loaded_at),
            clock,
            zone,
        };
        debug!(
            min_offset = ?adapter.min_offset,
            max_offset = ?adapter.max_offset,
            "expiry bounds captured"
        );
        adapter
    }

    /// Viewer zone used for every rendering.
    pub fn zone(&self) -> &dyn ViewerZone {
        self.zone.as_ref()
    }

    /// Offset of the lower bound relative to "now".
    pub fn min_offset(&self) -> Option<Duration> {
        self.min_offset
    }

    /// Offset of the upper bound relative to "now".
    pub fn max_offset(&self) -> Option<Duration> {
        self.max_offset
    }

    /// Bounds re-anchored to the current instant.
    pub fn current_bounds(&self) -> (Option<OffsetDateTime>, Option<OffsetDateTime>) {
        let now = self.clock.now();
        (
            self.min_offset.and_then(|offset| now.checked_add(offset)),
            self.max_offset.and_then(|offset| now.checked_add(offset)),
        )
    }

    /// Writes the initial value (when one was provided) and projects bounds.
    pub fn initialize(&self, field: &mut ExpiryField) {
        if let Some(initial) = self.initial {
            field.value = self.format_absolute(initial);
        }
        self.project(field);
    }

    /// Recomputes the field's min/max from the current instant.
    pub fn project(&self, field: &mut ExpiryField) {
        let (min, max) = self.current_bounds();
        if let Some(min) = min {
            field.min = Some(self.format_absolute(min));
        }
        if let Some(max) = max {
            field.max = Some(self.format_absolute(max));
        }
    }

    /// Renders any instant in the viewer's wall clock.
    pub fn format_absolute(&self, instant: OffsetDateTime) -> String {
        format_local(instant, self.zone.as_ref())
    }

    /// Converts a local form value into an RFC 3339 UTC instant.
    ///
    /// # Errors
    /// Returns [`ClockError::InvalidLocalValue`] for unparsable or
    /// unrepresentable values and [`ClockError::Format`] when the instant
    /// cannot be rendered.
    pub fn to_iso(&self, value: &str) -> Result<String, ClockError> {
        parse_local(value, self.zone.as_ref())?
            .checked_to_offset(UtcOffset::UTC)
            .ok_or_else(|| ClockError::InvalidLocalValue(value.to_string()))?
            .format(&Rfc3339)
            .map_err(ClockError::Format)
    }

    /// Starts the periodic projection of `field`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_projection(self: &Arc<Self>, field: SharedExpiryField) -> ProjectionTask {
        let adapter = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(PROJECTION_PERIOD);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                {
                    let mut guard = lock_field(&field);
                    adapter.project(&mut guard);
                }
            }
        });

        ProjectionTask {
            handle: Some(handle),
        }
    }
}

/// Owner of the periodic projection; stops it once, on cancel or drop.
#[derive(Debug)]
pub struct ProjectionTask {
    handle: Option<JoinHandle<()>>,
}

impl ProjectionTask {
    /// Stops the projection.
    pub fn cancel(mut self) {
        self.stop();
    }

    /// Returns `true` until the task has been stopped.
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("expiry projection stopped");
        }
    }
}

impl Drop for ProjectionTask {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Clock adapter errors.
#[derive(Debug, Error)]
pub enum ClockError {
    /// An ISO instant could not be parsed.
    #[error("invalid instant: {0}")]
    InvalidInstant(String),
    /// A local form value could not be parsed.
    #[error("Enter a valid expiry date and time.")]
    InvalidLocalValue(String),
    /// An instant could not be rendered.
    #[error("instant formatting failed: {0}")]
    Format(#[from] time::error::Format),
}
