//! Low-precision topocentric lunar ephemeris (Schlyter)
//!
//! Ported to Rust for the Moon-Tracker project.
//! Accuracy: ~2 arcminutes in ecliptic longitude, ~1 arcminute in latitude;
//! rise/set instants derived from these altitudes land within a couple of
//! minutes of a full-theory ephemeris.
//! References: Paul Schlyter, "How to compute planetary positions"
//! (Stockholm, 1998 revision) for the lunar elements and perturbation
//! terms; the GMST polynomial is the IAU 1982 expression.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::Observer;
use crate::riseset::LunarPositionProvider;

/// Julian Date of the unix epoch, 1970-01-01 00:00 UTC.
const UNIX_EPOCH_JD: f64 = 2_440_587.5;

/// Julian Date of J2000.0, 2000-01-01 12:00 TT (treated as UTC here; the
/// ~minute of ΔT is far below the accuracy of the theory).
const J2000_JD: f64 = 2_451_545.0;

/// Validity span of the truncated theory around J2000, in days (~200 years).
const MAX_DAYS_FROM_EPOCH: f64 = 73_050.0;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Errors from the lunar position routines.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum LunarError {
    /// The instant is not a finite Julian Date, or lies outside the range
    /// in which the truncated perturbation series stays meaningful.
    #[error("cannot compute lunar position for JD {0}")]
    InvalidDate(f64),
}

/// Topocentric horizontal coordinates of the moon at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HorizontalCoords {
    /// Altitude above the observer's horizon in degrees, parallax-corrected.
    pub altitude_deg: f64,
    /// Azimuth in degrees, clockwise from true north, [0, 360).
    pub azimuth_deg: f64,
}

/// Convert a UTC instant to a Julian Date.
pub fn julian_date(t: DateTime<Utc>) -> f64 {
    julian_date_from_unix(t.timestamp() as f64)
}

/// Convert seconds since the unix epoch to a Julian Date.
pub fn julian_date_from_unix(unix_seconds: f64) -> f64 {
    unix_seconds / SECONDS_PER_DAY + UNIX_EPOCH_JD
}

/// Convert a Julian Date back to seconds since the unix epoch.
pub fn unix_from_julian_date(jd: f64) -> f64 {
    (jd - UNIX_EPOCH_JD) * SECONDS_PER_DAY
}

/// Normalize an angle in degrees to [0, 360).
fn rev(deg: f64) -> f64 {
    deg.rem_euclid(360.0)
}

/// Greenwich mean sidereal time in degrees (IAU 1982 polynomial).
fn gmst_deg(jd: f64) -> f64 {
    let d = jd - J2000_JD;
    let t = d / 36_525.0;
    rev(280.460_618_37 + 360.985_647_366_29 * d + 0.000_387_933 * t * t
        - t * t * t / 38_710_000.0)
}

/// Geocentric ecliptic position of the moon: (longitude deg, latitude deg,
/// distance in Earth radii).
///
/// Mean orbital elements at the Schlyter day number, a Kepler solve for the
/// eccentric anomaly, and the dominant perturbation terms (evection,
/// variation, yearly equation, and friends).
fn ecliptic_moon(d: f64) -> (f64, f64, f64) {
    // Sun mean elements, needed for the perturbation arguments
    let ws = 282.9404 + 4.70935e-5 * d; // argument of perihelion
    let ms = 356.0470 + 0.985_600_258_5 * d; // mean anomaly
    let ls = rev(ws + ms); // mean longitude

    // Moon mean elements
    let n = 125.1228 - 0.052_953_808_3 * d; // long. of ascending node
    let i: f64 = 5.1454; // inclination
    let w = 318.0634 + 0.164_357_322_3 * d; // argument of perigee
    let a = 60.2666; // mean distance, Earth radii
    let e: f64 = 0.054900; // eccentricity
    let m = 115.3654 + 13.064_992_950_9 * d; // mean anomaly

    // Eccentric anomaly by Newton iteration
    let m_rad = rev(m).to_radians();
    let mut ecc = m_rad + e * m_rad.sin() * (1.0 + e * m_rad.cos());
    loop {
        let delta = (ecc - e * ecc.sin() - m_rad) / (1.0 - e * ecc.cos());
        ecc -= delta;
        if delta.abs() < 1.0e-9 {
            break;
        }
    }

    // True anomaly and radius from the in-plane position
    let xv = a * (ecc.cos() - e);
    let yv = a * (1.0 - e * e).sqrt() * ecc.sin();
    let v = yv.atan2(xv);
    let r = (xv * xv + yv * yv).sqrt();

    // Rotate into ecliptic coordinates
    let n_rad = rev(n).to_radians();
    let i_rad = i.to_radians();
    let vw = v + w.to_radians();
    let xe = r * (n_rad.cos() * vw.cos() - n_rad.sin() * vw.sin() * i_rad.cos());
    let ye = r * (n_rad.sin() * vw.cos() + n_rad.cos() * vw.sin() * i_rad.cos());
    let ze = r * vw.sin() * i_rad.sin();

    let lon = rev(ye.atan2(xe).to_degrees());
    let lat = ze.atan2((xe * xe + ye * ye).sqrt()).to_degrees();

    // Perturbation arguments (radians)
    let lm = rev(n + w + m); // moon mean longitude
    let dd = rev(lm - ls).to_radians(); // mean elongation
    let ff = rev(lm - n).to_radians(); // argument of latitude
    let mr = rev(m).to_radians();
    let msr = rev(ms).to_radians();

    // Longitude terms, degrees: evection, variation, yearly equation, ...
    let dlon = -1.274 * (mr - 2.0 * dd).sin()
        + 0.658 * (2.0 * dd).sin()
        - 0.186 * msr.sin()
        - 0.059 * (2.0 * mr - 2.0 * dd).sin()
        - 0.057 * (mr - 2.0 * dd + msr).sin()
        + 0.053 * (mr + 2.0 * dd).sin()
        + 0.046 * (2.0 * dd - msr).sin()
        + 0.041 * (mr - msr).sin()
        - 0.035 * dd.sin()
        - 0.031 * (mr + msr).sin()
        - 0.015 * (2.0 * ff - 2.0 * dd).sin()
        + 0.011 * (mr - 4.0 * dd).sin();

    // Latitude terms, degrees
    let dlat = -0.173 * (ff - 2.0 * dd).sin()
        - 0.055 * (mr - ff - 2.0 * dd).sin()
        - 0.046 * (mr + ff - 2.0 * dd).sin()
        + 0.033 * (ff + 2.0 * dd).sin()
        + 0.017 * (2.0 * mr + ff).sin();

    // Distance terms, Earth radii
    let dr = -0.58 * (mr - 2.0 * dd).cos() - 0.46 * (2.0 * dd).cos();

    (rev(lon + dlon), lat + dlat, r + dr)
}

/// Topocentric altitude and azimuth of the moon for an observer at `jd`.
///
/// The geocentric ecliptic position is converted through equatorial
/// coordinates and the local hour angle to the horizontal frame, then the
/// altitude is parallax-corrected for the observer sitting on Earth's
/// surface rather than at its center (`alt -= asin(1/r) * cos(alt)`, with
/// `r` in Earth radii). Azimuth parallax is below the accuracy of the
/// theory and is not applied.
pub fn topocentric_moon(
    observer: &Observer,
    jd: f64,
) -> Result<HorizontalCoords, LunarError> {
    if !jd.is_finite() || (jd - J2000_JD).abs() > MAX_DAYS_FROM_EPOCH {
        return Err(LunarError::InvalidDate(jd));
    }

    // Schlyter day number (epoch 1999-12-31 00:00 UT)
    let d = jd - 2_451_543.5;
    let (lon_deg, lat_deg, dist_er) = ecliptic_moon(d);

    // Ecliptic -> equatorial via the mean obliquity
    let ecl = (23.4393 - 3.563e-7 * d).to_radians();
    let lon = lon_deg.to_radians();
    let lat = lat_deg.to_radians();
    let xh = lon.cos() * lat.cos();
    let yh = lon.sin() * lat.cos();
    let zh = lat.sin();
    let xeq = xh;
    let yeq = yh * ecl.cos() - zh * ecl.sin();
    let zeq = yh * ecl.sin() + zh * ecl.cos();
    let ra_deg = rev(yeq.atan2(xeq).to_degrees());
    let dec = zeq.asin();

    // Local hour angle from sidereal time
    let lst = rev(gmst_deg(jd) + observer.longitude_deg);
    let ha = rev(lst - ra_deg).to_radians();

    // Horizontal coordinates
    let phi = observer.latitude_rad();
    let alt_geoc =
        (phi.sin() * dec.sin() + phi.cos() * dec.cos() * ha.cos()).asin();
    let az = ha
        .sin()
        .atan2(ha.cos() * phi.sin() - dec.tan() * phi.cos());
    let azimuth_deg = rev(az.to_degrees() + 180.0);

    // Topocentric correction: lunar parallax is ~1 degree and matters here
    let parallax = (1.0 / dist_er).asin();
    let alt_topo = alt_geoc - parallax * alt_geoc.cos();

    Ok(HorizontalCoords {
        altitude_deg: alt_topo.to_degrees(),
        azimuth_deg,
    })
}

/// The default position provider: Schlyter's low-precision lunar theory.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchlyterMoon;

impl LunarPositionProvider for SchlyterMoon {
    fn altitude_azimuth(
        &self,
        observer: &Observer,
        jd: f64,
    ) -> Result<HorizontalCoords, LunarError> {
        topocentric_moon(observer, jd)
    }
}
