//! # Moon Tracker Core Library
//!
//! This library provides the moonrise/moonset search engine and its
//! supporting data structures. It's designed for watch-class hardware:
//! one search is a bounded compute burst with no I/O, no allocation beyond
//! the sample buffer, and no state retained between calls.
//!
//! ## Design Philosophy
//!
//! ### Stateless searches
//! - **Fresh results per call**: every search builds its own
//!   [`RiseSetResult`]; nothing is cached or mutated in place, so
//!   concurrent searches for different observers need no coordination
//! - **Bounded work**: the cost of a search is the number of ephemeris
//!   evaluations, `window_hours * 60 / step_minutes` plus one for the
//!   visibility check; callers on battery-constrained hosts should treat
//!   it as a short burst and keep it out of interrupt context
//!
//! ### Search shape
//! The engine samples topocentric lunar altitude at a fixed cadence across
//! a window centered on the query instant (default 48 hours, 5-minute
//! step), detects horizon crossings as sign changes, and refines each
//! crossing by linear interpolation between the bracketing samples:
//! - **Preceding half**: events before the query instant
//! - **Succeeding half**: events at or after the query instant
//! - **Degenerate windows**: a moon that stays up (or down) the whole
//!   window yields no events at all, and [`RiseSetResult::is_visible`]
//!   still reports the current state from a direct evaluation
//!
//! ## Core Types
//!
//! The library exports three primary types:
//! - [`Observer`]: a fixed geographic location
//! - [`MoonEvent`]: one rise or set instant with its azimuth
//! - [`RiseSetResult`]: the complete outcome of one search

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Module declarations
pub mod config;
pub mod lunar;
pub mod riseset;

/// A fixed observer location on Earth's surface.
///
/// Latitude and longitude are signed degrees, north and east positive.
/// The location is immutable for the duration of one search call.
///
/// # Example
/// ```
/// use moon_clock_lib::Observer;
///
/// // Greenwich observatory, roughly
/// let obs = Observer::new(51.48, 0.0);
/// assert!((obs.latitude_rad() - 51.48_f64.to_radians()).abs() < 1e-12);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Observer {
    /// Geographic latitude in degrees, north positive. Range: [-90, 90].
    pub latitude_deg: f64,
    /// Geographic longitude in degrees, east positive. Range: [-180, 180].
    pub longitude_deg: f64,
}

impl Observer {
    /// Create a new observer location.
    pub fn new(latitude_deg: f64, longitude_deg: f64) -> Self {
        Self {
            latitude_deg,
            longitude_deg,
        }
    }

    /// Latitude in radians.
    pub fn latitude_rad(&self) -> f64 {
        self.latitude_deg.to_radians()
    }

    /// Longitude in radians (east positive).
    pub fn longitude_rad(&self) -> f64 {
        self.longitude_deg.to_radians()
    }
}

/// A single moonrise or moonset event.
///
/// The azimuth is the compass bearing of the moon at the crossing,
/// measured clockwise from true north in degrees [0, 360).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MoonEvent {
    /// Instant of the horizon crossing (UTC, whole-second resolution).
    pub time: DateTime<Utc>,
    /// Azimuth at the crossing, degrees clockwise from true north.
    pub azimuth_deg: f64,
}

/// Complete outcome of one rise/set search.
///
/// Each half of the window carries at most one rise and one set; when the
/// moon crosses the horizon more than once on the same side of the query
/// instant, only the crossing nearest the query is retained. Absent events
/// are `None` — never a sentinel time — so "no event in window" is always
/// distinguishable from an event at any particular instant.
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use moon_clock_lib::{MoonEvent, RiseSetResult};
///
/// let query = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
/// let rise = MoonEvent {
///     time: query + chrono::Duration::hours(3),
///     azimuth_deg: 92.5,
/// };
/// let result = RiseSetResult {
///     query_time: query,
///     preceding_rise: None,
///     succeeding_rise: Some(rise),
///     preceding_set: None,
///     succeeding_set: None,
///     is_visible: false,
/// };
///
/// assert_eq!(result.next_rise(), Some(&rise));
/// assert_eq!(result.nearest_set(), None);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiseSetResult {
    /// The instant the caller asked about.
    pub query_time: DateTime<Utc>,
    /// Nearest rise before the query instant, if any.
    pub preceding_rise: Option<MoonEvent>,
    /// Nearest rise at or after the query instant, if any.
    pub succeeding_rise: Option<MoonEvent>,
    /// Nearest set before the query instant, if any.
    pub preceding_set: Option<MoonEvent>,
    /// Nearest set at or after the query instant, if any.
    pub succeeding_set: Option<MoonEvent>,
    /// Whether the moon is above the horizon threshold at `query_time`,
    /// evaluated directly and independent of any crossing found.
    pub is_visible: bool,
}

impl RiseSetResult {
    /// The upcoming moonrise, if one falls inside the succeeding half-window.
    pub fn next_rise(&self) -> Option<&MoonEvent> {
        self.succeeding_rise.as_ref()
    }

    /// The upcoming moonset, if one falls inside the succeeding half-window.
    pub fn next_set(&self) -> Option<&MoonEvent> {
        self.succeeding_set.as_ref()
    }

    /// The most recent moonrise, if one falls inside the preceding half-window.
    pub fn last_rise(&self) -> Option<&MoonEvent> {
        self.preceding_rise.as_ref()
    }

    /// The most recent moonset, if one falls inside the preceding half-window.
    pub fn last_set(&self) -> Option<&MoonEvent> {
        self.preceding_set.as_ref()
    }

    /// The rise closest to the query instant, from either half-window.
    pub fn nearest_rise(&self) -> Option<&MoonEvent> {
        self.nearer(self.preceding_rise.as_ref(), self.succeeding_rise.as_ref())
    }

    /// The set closest to the query instant, from either half-window.
    pub fn nearest_set(&self) -> Option<&MoonEvent> {
        self.nearer(self.preceding_set.as_ref(), self.succeeding_set.as_ref())
    }

    fn nearer<'a>(
        &self,
        a: Option<&'a MoonEvent>,
        b: Option<&'a MoonEvent>,
    ) -> Option<&'a MoonEvent> {
        match (a, b) {
            (Some(x), Some(y)) => {
                let dx = (x.time - self.query_time).num_seconds().abs();
                let dy = (y.time - self.query_time).num_seconds().abs();
                if dx <= dy {
                    Some(x)
                } else {
                    Some(y)
                }
            }
            (Some(x), None) => Some(x),
            (None, y) => y,
        }
    }
}
