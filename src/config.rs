//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the
//! moon-config.toml file. It provides a centralized way to configure the
//! observer location and the rise/set search parameters.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::riseset::{SearchParams, DEFAULT_STEP_MINUTES, DEFAULT_WINDOW_HOURS};
use crate::Observer;

/// Application configuration loaded from moon-config.toml
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Observer location configuration
    pub observer: ObserverConfig,
    /// Rise/set search configuration
    pub search: SearchConfig,
}

/// Observer location configuration
#[derive(Debug, Deserialize, Serialize)]
pub struct ObserverConfig {
    /// Latitude in degrees, north positive
    pub latitude: f64,
    /// Longitude in degrees, east positive
    pub longitude: f64,
    /// Human-readable place name for reference
    pub name: String,
}

/// Rise/set search configuration
#[derive(Debug, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Search window in hours, centered on "now" (positive even integer)
    pub window_hours: i64,
    /// Altitude sampling step in minutes
    pub step_minutes: i64,
    /// Atmospheric refraction at the horizon in arcminutes
    pub refraction_arcmin: f64,
    /// Mean lunar semidiameter in arcminutes
    pub semidiameter_arcmin: f64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            observer: ObserverConfig {
                latitude: 43.66,
                longitude: -70.25,
                name: "Portland, ME".to_string(),
            },
            search: SearchConfig {
                window_hours: DEFAULT_WINDOW_HOURS,
                step_minutes: DEFAULT_STEP_MINUTES,
                refraction_arcmin: 34.0,
                semidiameter_arcmin: 16.0,
            },
        }
    }
}

impl Config {
    /// Load configuration from moon-config.toml file
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load() -> Self {
        Self::load_from_path("moon-config.toml")
    }

    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    info!("loaded configuration for {}", config.observer.name);
                    config
                }
                Err(e) => {
                    warn!("invalid config file format: {e}");
                    warn!("using default configuration (Portland, ME)");
                    Self::default()
                }
            },
            Err(_) => {
                info!("no config file found, using default configuration (Portland, ME)");
                Self::default()
            }
        }
    }

    /// Save current configuration to moon-config.toml
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)?;
        fs::write("moon-config.toml", contents)?;
        info!("configuration saved to moon-config.toml");
        Ok(())
    }

    /// The configured observer location.
    pub fn observer(&self) -> Observer {
        Observer::new(self.observer.latitude, self.observer.longitude)
    }

    /// The configured search parameters.
    pub fn search_params(&self) -> SearchParams {
        SearchParams {
            window_hours: self.search.window_hours,
            step_minutes: self.search.step_minutes,
            refraction_arcmin: self.search.refraction_arcmin,
            semidiameter_arcmin: self.search.semidiameter_arcmin,
        }
    }
}
