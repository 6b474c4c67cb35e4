//! # Moon Tracker Application Entry Point
//!
//! Thin binary over the core library: loads the observer location and
//! search settings, runs one rise/set search for the current instant, and
//! prints the nearest preceding and succeeding moonrise/moonset events.
//! Formatting instants into local wall-clock time happens here, in the
//! caller — the search engine itself only deals in UTC instants.

// Test modules
#[cfg(test)]
mod tests;

use std::env;

use anyhow::Context;
use chrono::{Local, Utc};
use moon_clock_lib::config::Config;
use moon_clock_lib::lunar::SchlyterMoon;
use moon_clock_lib::riseset::find_events_with;
use moon_clock_lib::{MoonEvent, RiseSetResult};

/// Main application entry point.
fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = Config::load();
    let observer = config.observer();
    let mut params = config.search_params();

    // Optional window override: --window <hours>
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--window" {
            let hours = args.next().context("--window needs a value in hours")?;
            params.window_hours = hours
                .parse()
                .context("--window value must be an integer number of hours")?;
        }
    }

    let now = Utc::now();
    let result = find_events_with(&SchlyterMoon, &observer, now, &params)?;
    print_report(&config, params.window_hours, &result);

    Ok(())
}

/// Print the preceding/succeeding event report for one search.
fn print_report(config: &Config, window_hours: i64, result: &RiseSetResult) {
    let half = window_hours / 2;
    println!(
        "Moon rise/set nearest {} for {} (lat {:.2}, lon {:.2}):",
        result
            .query_time
            .with_timezone(&Local)
            .format("%a %b %e %H:%M:%S %Y"),
        config.observer.name,
        config.observer.latitude,
        config.observer.longitude
    );

    println!("Preceding events:");
    if result.last_rise().is_none() && result.last_set().is_none() {
        println!("\tNo moon rise or set during preceding {half} hours");
    }
    if let Some(rise) = result.last_rise() {
        print_event("Moon rise", rise);
    }
    if let Some(set) = result.last_set() {
        print_event("Moon set ", set);
    }

    println!("Succeeding events:");
    if result.next_rise().is_none() && result.next_set().is_none() {
        println!("\tNo moon rise or set during succeeding {half} hours");
    }
    if let Some(rise) = result.next_rise() {
        print_event("Moon rise", rise);
    }
    if let Some(set) = result.next_set() {
        print_event("Moon set ", set);
    }

    println!(
        "The moon is currently {}.",
        if result.is_visible { "up" } else { "down" }
    );
}

fn print_event(label: &str, event: &MoonEvent) {
    println!(
        "\t{} at {}, azimuth {:.2}",
        label,
        event.time.with_timezone(&Local).format("%a %b %e %H:%M:%S %Y"),
        event.azimuth_deg
    );
}
