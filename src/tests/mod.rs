//! Binary-level test suite: end-to-end searches against the real
//! ephemeris provider.
