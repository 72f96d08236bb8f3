//! Scan command - one dry-run scan cycle.

use crate::config::Settings;
use crate::watcher::ChangeDetector;

/// Scan every feed once and print the events; nothing is parsed or submitted.
pub fn run(settings: &Settings) -> anyhow::Result<()> {
    let mut detector =
        ChangeDetector::new(&settings.feeds)?.with_extensions(&settings.watch.extensions);

    let (events, report) = detector.scan_once();
    for event in &events {
        println!("{event}");
    }

    for location in &report.failed_locations {
        eprintln!("unreadable: {}", location.display());
    }
    eprintln!(
        "{} new, {} unreadable location(s)",
        report.created,
        report.failed_locations.len()
    );
    Ok(())
}
