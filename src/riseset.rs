//! # Moonrise/Moonset Event Search
//!
//! This module is the core of the crate: given an observer and a query
//! instant, it finds the nearest preceding and succeeding moonrise and
//! moonset events inside a bounded window centered on that instant.
//!
//! ## Algorithm
//!
//! 1. **Sample**: topocentric lunar altitude is evaluated at a fixed step
//!    across the window; the final grid point always lands exactly on the
//!    window end.
//! 2. **Scan**: consecutive sample pairs are checked for a sign change of
//!    `altitude - threshold`; negative to non-negative is a rise
//!    candidate, non-negative to negative a set candidate.
//! 3. **Refine**: each candidate is pinned down by linear interpolation
//!    between the bracketing samples. Azimuth is interpolated along the
//!    shorter angular arc so the 0°/360° wrap cannot produce a bearing on
//!    the wrong side of the compass.
//! 4. **Classify**: refined crossings before the query instant are
//!    "preceding", those at or after it "succeeding"; within each class
//!    only the crossing nearest the query survives.
//!
//! The current-visibility flag comes from a direct altitude evaluation at
//! the query instant, so it is correct even when the moon stays above (or
//! below) the horizon for the entire window and no crossing exists.
//!
//! ## Failure modes
//!
//! A search either completes or fails outright: a bad window or step is
//! [`SearchError::InvalidWindow`], a position-provider failure at any
//! sampled instant is [`SearchError::PositionUnavailable`]. There is no
//! partial-result contract and no internal retry.

use chrono::{DateTime, Utc};
use log::debug;
use thiserror::Error;

use crate::lunar::{julian_date_from_unix, HorizontalCoords, LunarError, SchlyterMoon};
use crate::{MoonEvent, Observer, RiseSetResult};

/// Default search window width in hours.
///
/// Events further from the query instant than half the window will not be
/// found. At higher latitudes the intervals between lunar rise/set events
/// grow, so finding the nearest events needs a wider window; wider windows
/// also accumulate more interpolation error. Useful values run from 12 to
/// 48 depending on the application. Must be even so the window splits
/// symmetrically around the query instant.
pub const DEFAULT_WINDOW_HOURS: i64 = 48;

/// Default sampling step in minutes.
///
/// The moon's altitude changes at no more than ~15°/hour (diurnal
/// rotation), about 1.25° between 5-minute samples, so a single sampling
/// interval cannot straddle two horizon crossings of the slowly varying
/// altitude curve.
pub const DEFAULT_STEP_MINUTES: i64 = 5;

/// Upper bound on the window, far beyond any astronomical use. Keeps the
/// second arithmetic and the timestamp conversion representable.
const MAX_WINDOW_HOURS: i64 = 400 * 8766; // ~400 years

/// Errors from the rise/set search.
#[derive(Error, Debug)]
pub enum SearchError {
    /// The window/step configuration is unusable.
    #[error("invalid search window: {reason}")]
    InvalidWindow { reason: &'static str },

    /// The position provider failed at a sampled instant. The whole search
    /// fails; no partial result is produced.
    #[error("lunar position unavailable at JD {jd}")]
    PositionUnavailable {
        jd: f64,
        #[source]
        source: LunarError,
    },
}

/// Contract for the lunar position collaborator consumed by the engine.
///
/// Implementations must be continuous and smooth in time — no
/// discontinuities within one sampling step — so that a sign change of the
/// altitude between two consecutive samples reliably brackets exactly one
/// horizon crossing. They must be defined for every instant inside the
/// search window; an instant they cannot handle is reported as an error,
/// never guessed at.
pub trait LunarPositionProvider {
    /// Topocentric altitude and azimuth of the moon at a Julian Date.
    fn altitude_azimuth(
        &self,
        observer: &Observer,
        jd: f64,
    ) -> Result<HorizontalCoords, LunarError>;
}

/// Configurable parameters for one search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchParams {
    /// Window width in hours, centered on the query instant. Must be a
    /// positive even integer. Default: [`DEFAULT_WINDOW_HOURS`].
    pub window_hours: i64,
    /// Sampling cadence in minutes. Must be positive.
    /// Default: [`DEFAULT_STEP_MINUTES`].
    pub step_minutes: i64,
    /// Atmospheric refraction at the horizon in arcminutes. Default: 34.0.
    pub refraction_arcmin: f64,
    /// Mean lunar angular semidiameter in arcminutes. Default: 16.0.
    pub semidiameter_arcmin: f64,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            window_hours: DEFAULT_WINDOW_HOURS,
            step_minutes: DEFAULT_STEP_MINUTES,
            refraction_arcmin: 34.0,
            semidiameter_arcmin: 16.0,
        }
    }
}

impl SearchParams {
    /// Altitude threshold in degrees separating "risen" from "set".
    ///
    /// Upper-limb convention: the moon counts as risen while its center
    /// sits less than refraction + semidiameter below the geometric
    /// horizon. `-(34' + 16') / 60 = -0.8333°` with the defaults.
    pub fn horizon_threshold_deg(&self) -> f64 {
        -(self.refraction_arcmin + self.semidiameter_arcmin) / 60.0
    }

    fn validate(&self) -> Result<(), SearchError> {
        if self.window_hours <= 0 {
            return Err(SearchError::InvalidWindow {
                reason: "window hours must be positive",
            });
        }
        if self.window_hours % 2 != 0 {
            return Err(SearchError::InvalidWindow {
                reason: "window hours must be even",
            });
        }
        if self.window_hours > MAX_WINDOW_HOURS {
            return Err(SearchError::InvalidWindow {
                reason: "window hours too large to represent",
            });
        }
        if self.step_minutes <= 0 {
            return Err(SearchError::InvalidWindow {
                reason: "sampling step must be positive",
            });
        }
        Ok(())
    }
}

/// One altitude evaluation on the sampling grid.
///
/// The azimuth rides along with every sample but is only consumed near a
/// crossing, where it gets interpolated into the reported event.
#[derive(Debug, Clone, Copy)]
struct AltitudeSample {
    unix_s: i64,
    altitude_deg: f64,
    azimuth_deg: f64,
}

/// Find the moonrise/moonset events nearest to `query_time`.
///
/// Searches a window of `window_hours` (a positive even integer) centered
/// on the query instant using the default position provider and sampling
/// parameters. See [`find_events_with`] for the full-form operation.
///
/// # Errors
/// [`SearchError::InvalidWindow`] for a bad window,
/// [`SearchError::PositionUnavailable`] if the ephemeris cannot cover the
/// window.
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use moon_clock_lib::riseset::find_events;
/// use moon_clock_lib::Observer;
///
/// let observer = Observer::new(42.36, -71.06); // Boston
/// let query = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
/// let result = find_events(&observer, query, 48).unwrap();
/// if let Some(rise) = result.next_rise() {
///     println!("moonrise {} az {:.1}", rise.time, rise.azimuth_deg);
/// }
/// ```
pub fn find_events(
    observer: &Observer,
    query_time: DateTime<Utc>,
    window_hours: i64,
) -> Result<RiseSetResult, SearchError> {
    let params = SearchParams {
        window_hours,
        ..SearchParams::default()
    };
    find_events_with(&SchlyterMoon, observer, query_time, &params)
}

/// Full-form search: explicit position provider and parameters.
///
/// The engine holds no state across calls; concurrent searches with
/// different observers or instants need no coordination.
pub fn find_events_with<P: LunarPositionProvider>(
    provider: &P,
    observer: &Observer,
    query_time: DateTime<Utc>,
    params: &SearchParams,
) -> Result<RiseSetResult, SearchError> {
    params.validate()?;

    let threshold = params.horizon_threshold_deg();
    let query_s = query_time.timestamp();
    let half_s = params.window_hours * 3600 / 2;
    let start_s = query_s - half_s;
    let end_s = query_s + half_s;
    let step_s = params.step_minutes * 60;

    // Sample the altitude across the window. The grid is clamped so its
    // last point is exactly the window end even when the step does not
    // divide the window; a crossing at either boundary sample is found.
    let expected = (params.window_hours * 60 / params.step_minutes) as usize + 2;
    let mut samples = Vec::with_capacity(expected);
    let mut t = start_s;
    loop {
        samples.push(sample_at(provider, observer, t)?);
        if t == end_s {
            break;
        }
        t = (t + step_s).min(end_s);
    }

    let mut result = RiseSetResult {
        query_time,
        preceding_rise: None,
        succeeding_rise: None,
        preceding_set: None,
        succeeding_set: None,
        is_visible: false,
    };

    for pair in samples.windows(2) {
        let d0 = pair[0].altitude_deg - threshold;
        let d1 = pair[1].altitude_deg - threshold;
        let rising = d0 < 0.0 && d1 >= 0.0;
        let setting = d0 >= 0.0 && d1 < 0.0;
        if !rising && !setting {
            continue;
        }
        let event = refine_crossing(&pair[0], &pair[1], threshold);
        record_nearest(&mut result, event, rising, query_s);
    }

    // Visibility comes from a direct evaluation at the query instant, not
    // from the crossings: a moon that never crosses the horizon in the
    // window still has a well-defined current state.
    let at_query = sample_at(provider, observer, query_s)?;
    result.is_visible = at_query.altitude_deg >= threshold;

    debug!(
        "searched {} samples over {} h: rise {}/{}, set {}/{}, visible {}",
        samples.len(),
        params.window_hours,
        result.preceding_rise.is_some(),
        result.succeeding_rise.is_some(),
        result.preceding_set.is_some(),
        result.succeeding_set.is_some(),
        result.is_visible
    );

    Ok(result)
}

/// Evaluate the provider at a unix instant, wrapping failures.
fn sample_at<P: LunarPositionProvider>(
    provider: &P,
    observer: &Observer,
    unix_s: i64,
) -> Result<AltitudeSample, SearchError> {
    let jd = julian_date_from_unix(unix_s as f64);
    let pos = provider
        .altitude_azimuth(observer, jd)
        .map_err(|source| SearchError::PositionUnavailable { jd, source })?;
    Ok(AltitudeSample {
        unix_s,
        altitude_deg: pos.altitude_deg,
        azimuth_deg: pos.azimuth_deg,
    })
}

/// Pin a bracketed crossing down to sub-sample resolution.
///
/// Linear interpolation of `altitude - threshold` between the bracketing
/// samples; at the sampling densities in use the altitude curve is locally
/// linear to well under the reporting resolution of one second.
fn refine_crossing(
    before: &AltitudeSample,
    after: &AltitudeSample,
    threshold: f64,
) -> MoonEvent {
    let d0 = before.altitude_deg - threshold;
    let d1 = after.altitude_deg - threshold;
    // The pair straddles the threshold, so the denominator cannot vanish
    let frac = d0 / (d0 - d1);
    let unix = before.unix_s as f64 + frac * (after.unix_s - before.unix_s) as f64;
    let time = DateTime::<Utc>::from_timestamp(unix.round() as i64, 0)
        .expect("refined instant lies between validated window bounds");
    MoonEvent {
        time,
        azimuth_deg: lerp_azimuth_deg(before.azimuth_deg, after.azimuth_deg, frac),
    }
}

/// Interpolate between two azimuths along the shorter angular arc.
///
/// Raw linear interpolation is wrong near the 0°/360° wrap (350° and 10°
/// would average to 180°); walking the shorter signed arc gives 0°.
fn lerp_azimuth_deg(a0: f64, a1: f64, frac: f64) -> f64 {
    let mut delta = (a1 - a0).rem_euclid(360.0);
    if delta > 180.0 {
        delta -= 360.0;
    }
    (a0 + frac * delta).rem_euclid(360.0)
}

/// Store an event in its class slot, keeping the crossing nearest the
/// query when a half-window sees two of the same kind (possible once the
/// window exceeds one lunar day).
fn record_nearest(result: &mut RiseSetResult, event: MoonEvent, rising: bool, query_s: i64) {
    let t = event.time.timestamp();
    let slot = match (rising, t < query_s) {
        (true, true) => &mut result.preceding_rise,
        (true, false) => &mut result.succeeding_rise,
        (false, true) => &mut result.preceding_set,
        (false, false) => &mut result.succeeding_set,
    };
    let nearer = match slot {
        Some(existing) => {
            (t - query_s).abs() < (existing.time.timestamp() - query_s).abs()
        }
        None => true,
    };
    if nearer {
        *slot = Some(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lunar::unix_from_julian_date;
    use chrono::TimeZone;
    use std::f64::consts::TAU;

    /// Synthetic provider: maps unix seconds to (altitude, azimuth).
    struct FnMoon<F: Fn(f64) -> (f64, f64)>(F);

    impl<F: Fn(f64) -> (f64, f64)> LunarPositionProvider for FnMoon<F> {
        fn altitude_azimuth(
            &self,
            _observer: &Observer,
            jd: f64,
        ) -> Result<HorizontalCoords, LunarError> {
            let (altitude_deg, azimuth_deg) = (self.0)(unix_from_julian_date(jd));
            Ok(HorizontalCoords {
                altitude_deg,
                azimuth_deg,
            })
        }
    }

    /// Provider that fails for every instant past a cutoff.
    struct FailingMoon {
        fail_after_unix: f64,
    }

    impl LunarPositionProvider for FailingMoon {
        fn altitude_azimuth(
            &self,
            _observer: &Observer,
            jd: f64,
        ) -> Result<HorizontalCoords, LunarError> {
            let unix = unix_from_julian_date(jd);
            if unix > self.fail_after_unix {
                Err(LunarError::InvalidDate(jd))
            } else {
                Ok(HorizontalCoords {
                    altitude_deg: 10.0,
                    azimuth_deg: 180.0,
                })
            }
        }
    }

    fn observer() -> Observer {
        Observer::new(0.0, 0.0)
    }

    /// Parameters with a zero threshold so synthetic crossings are exactly
    /// where the altitude function says they are.
    fn zero_threshold(window_hours: i64, step_minutes: i64) -> SearchParams {
        SearchParams {
            window_hours,
            step_minutes,
            refraction_arcmin: 0.0,
            semidiameter_arcmin: 0.0,
        }
    }

    fn query() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    /// Sine altitude with a rise (negative-to-positive crossing) at
    /// `rise_unix` and period `period_s`.
    fn sine_moon(rise_unix: f64, period_s: f64) -> impl Fn(f64) -> (f64, f64) {
        move |unix| {
            let alt = 40.0 * (TAU * (unix - rise_unix) / period_s).sin();
            (alt, 90.0)
        }
    }

    #[test]
    fn window_must_be_positive() {
        let err = find_events(&observer(), query(), 0).unwrap_err();
        assert!(matches!(err, SearchError::InvalidWindow { .. }), "{err}");
    }

    #[test]
    fn window_must_be_even() {
        let err = find_events(&observer(), query(), 47).unwrap_err();
        assert!(matches!(err, SearchError::InvalidWindow { .. }), "{err}");
    }

    #[test]
    fn step_must_be_positive() {
        let params = SearchParams {
            step_minutes: 0,
            ..SearchParams::default()
        };
        let moon = FnMoon(|_| (10.0, 180.0));
        let err =
            find_events_with(&moon, &observer(), query(), &params).unwrap_err();
        assert!(matches!(err, SearchError::InvalidWindow { .. }), "{err}");
    }

    #[test]
    fn default_threshold_is_upper_limb() {
        let t = SearchParams::default().horizon_threshold_deg();
        assert!((t - (-50.0 / 60.0)).abs() < 1e-12, "threshold {t}");
    }

    #[test]
    fn finds_all_four_events_of_a_sine_moon() {
        // Rise at query + 3.2 h with a 24.6 h period puts the preceding
        // set at query - 9.1 h, the preceding rise at query - 21.4 h, and
        // the succeeding set at query + 15.5 h — the reference scenario.
        let q = query().timestamp() as f64;
        let period = 24.6 * 3600.0;
        let moon = FnMoon(sine_moon(q + 3.2 * 3600.0, period));
        let result = find_events_with(
            &moon,
            &observer(),
            query(),
            &zero_threshold(48, 5),
        )
        .unwrap();

        let expect = [
            (result.succeeding_rise, 3.2),
            (result.preceding_set, -9.1),
            (result.preceding_rise, -21.4),
            (result.succeeding_set, 15.5),
        ];
        for (event, offset_hours) in expect {
            let event = event
                .unwrap_or_else(|| panic!("event missing at {offset_hours:+.1} h"));
            let got = (event.time.timestamp() as f64 - q) / 3600.0;
            assert!(
                (got - offset_hours).abs() < 0.02,
                "event at {got:+.3} h, expected {offset_hours:+.1} h"
            );
        }
        // alt(query) = sin(-3.2h / 24.6h * tau) < 0
        assert!(!result.is_visible);
    }

    #[test]
    fn keeps_nearest_crossing_per_half_window() {
        // A 10 h period packs several rises into each half of a 48 h
        // window; only the nearest on each side may survive.
        let q = query().timestamp() as f64;
        let moon = FnMoon(sine_moon(q + 3600.0, 10.0 * 3600.0));
        let result = find_events_with(
            &moon,
            &observer(),
            query(),
            &zero_threshold(48, 5),
        )
        .unwrap();

        let next = result.next_rise().unwrap().time.timestamp() as f64 - q;
        let last = result.last_rise().unwrap().time.timestamp() as f64 - q;
        assert!(
            (next - 3600.0).abs() < 120.0,
            "next rise at {next:+.0} s, expected +3600"
        );
        assert!(
            (last + 9.0 * 3600.0).abs() < 120.0,
            "last rise at {last:+.0} s, expected -32400"
        );
    }

    #[test]
    fn moon_up_all_window_has_no_events() {
        let moon = FnMoon(|_| (10.0, 180.0));
        let result = find_events_with(
            &moon,
            &observer(),
            query(),
            &zero_threshold(48, 5),
        )
        .unwrap();
        assert_eq!(result.next_rise(), None);
        assert_eq!(result.next_set(), None);
        assert_eq!(result.last_rise(), None);
        assert_eq!(result.last_set(), None);
        assert!(result.is_visible);
    }

    #[test]
    fn moon_down_all_window_has_no_events() {
        let moon = FnMoon(|_| (-10.0, 180.0));
        let result = find_events_with(
            &moon,
            &observer(),
            query(),
            &zero_threshold(48, 5),
        )
        .unwrap();
        assert_eq!(result.nearest_rise(), None);
        assert_eq!(result.nearest_set(), None);
        assert!(!result.is_visible);
    }

    #[test]
    fn azimuth_interpolation_handles_wraparound() {
        // Altitude crosses zero midway between two samples whose azimuths
        // bracket true north: 350 deg then 10 deg. The interpolated
        // bearing must be 0 deg, not 180.
        let q = query().timestamp() as f64;
        // Rise 150 s before the query: halfway through the sample pair
        // [q - 300, q] on a 5-minute grid.
        let t_cross = q - 150.0;
        let moon = FnMoon(move |unix| {
            let alt = (unix - t_cross) / 60.0; // 1 deg per minute
            let az = if unix < t_cross { 350.0 } else { 10.0 };
            (alt, az)
        });
        let result = find_events_with(
            &moon,
            &observer(),
            query(),
            &zero_threshold(2, 5),
        )
        .unwrap();
        let rise = result.last_rise().expect("rise in preceding half");
        let az = rise.azimuth_deg;
        assert!(
            az < 1.0 || az > 359.0,
            "azimuth {az} should sit at true north, not the antipode"
        );
    }

    #[test]
    fn crossing_at_window_boundary_is_reported() {
        // Altitude reaches exactly zero on the final grid sample.
        let q = query().timestamp() as f64;
        let end = q + 24.0 * 3600.0;
        let moon = FnMoon(move |unix| ((unix - end) / 600.0, 270.0));
        let result = find_events_with(
            &moon,
            &observer(),
            query(),
            &zero_threshold(48, 5),
        )
        .unwrap();
        let rise = result.next_rise().expect("boundary rise");
        assert_eq!(rise.time.timestamp() as f64, end);
    }

    #[test]
    fn nothing_is_extrapolated_beyond_the_window() {
        // The only crossing sits one hour past the window end.
        let q = query().timestamp() as f64;
        let t_cross = q + 25.0 * 3600.0;
        let moon = FnMoon(move |unix| ((unix - t_cross) / 600.0, 90.0));
        let result = find_events_with(
            &moon,
            &observer(),
            query(),
            &zero_threshold(48, 5),
        )
        .unwrap();
        assert_eq!(result.nearest_rise(), None);
    }

    #[test]
    fn events_stay_inside_the_window() {
        let q = query().timestamp();
        let moon = FnMoon(sine_moon(q as f64 + 3.2 * 3600.0, 24.6 * 3600.0));
        for window in [12, 24, 48] {
            let result = find_events_with(
                &moon,
                &observer(),
                query(),
                &zero_threshold(window, 5),
            )
            .unwrap();
            let half = window * 3600 / 2;
            for event in [
                result.preceding_rise,
                result.succeeding_rise,
                result.preceding_set,
                result.succeeding_set,
            ]
            .into_iter()
            .flatten()
            {
                let offset = event.time.timestamp() - q;
                assert!(
                    offset.abs() <= half,
                    "event {offset:+} s outside the {window} h window"
                );
            }
        }
    }

    #[test]
    fn identical_inputs_give_identical_results() {
        let q = query().timestamp() as f64;
        let moon = FnMoon(sine_moon(q + 3.2 * 3600.0, 24.6 * 3600.0));
        let params = zero_threshold(48, 5);
        let a = find_events_with(&moon, &observer(), query(), &params).unwrap();
        let b = find_events_with(&moon, &observer(), query(), &params).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn denser_sampling_refines_within_one_step() {
        let q = query().timestamp() as f64;
        let moon = FnMoon(sine_moon(q + 3.2 * 3600.0, 24.6 * 3600.0));
        let coarse = find_events_with(
            &moon,
            &observer(),
            query(),
            &zero_threshold(48, 5),
        )
        .unwrap();
        let fine = find_events_with(
            &moon,
            &observer(),
            query(),
            &zero_threshold(48, 1),
        )
        .unwrap();
        let drift = (coarse.next_rise().unwrap().time.timestamp()
            - fine.next_rise().unwrap().time.timestamp())
        .abs();
        assert!(
            drift < 5 * 60,
            "rise drifted {drift} s between sampling densities"
        );
    }

    #[test]
    fn provider_failure_fails_the_whole_search() {
        // The provider dies three hours into the succeeding half; the
        // search must surface the error rather than a partial result.
        let q = query().timestamp() as f64;
        let moon = FailingMoon {
            fail_after_unix: q + 3.0 * 3600.0,
        };
        let err = find_events_with(
            &moon,
            &observer(),
            query(),
            &zero_threshold(48, 5),
        )
        .unwrap_err();
        assert!(matches!(err, SearchError::PositionUnavailable { .. }), "{err}");
    }

    #[test]
    fn lerp_azimuth_midpoint_across_north() {
        let az = lerp_azimuth_deg(350.0, 10.0, 0.5);
        assert!((az - 0.0).abs() < 1e-9, "midpoint {az}");
    }

    #[test]
    fn lerp_azimuth_plain_arc() {
        let az = lerp_azimuth_deg(80.0, 100.0, 0.25);
        assert!((az - 85.0).abs() < 1e-9, "quarter point {az}");
    }
}
