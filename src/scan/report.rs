//! CSV dependency report

use std::fs::{self, File};
use std::io;
use std::path::Path;

use chrono::NaiveDate;
use tracing::info;

use crate::parser::{Package, PackageContainer};
use crate::scan::ScanError;

pub const REPORT_COLUMNS: [&str; 15] = [
    "Repo Name",
    "Container Path",
    "Name",
    "Referenced Version",
    "Date",
    "Latest Release",
    "Latest Release Date",
    "Latest Package",
    "Latest Package Date",
    "Major Release Behind",
    "Minor Release Behind",
    "Patch Release Behind",
    "Available Version Count",
    "Link",
    "Source",
];

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn date(value: &Option<NaiveDate>) -> String {
    value
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn row(container: &PackageContainer, package: &Package) -> [String; 15] {
    let details = &package.details;
    [
        container.repo.clone(),
        container.path.clone(),
        package.name.clone(),
        text(&package.version),
        date(&details.version_date),
        text(&details.latest_release),
        date(&details.latest_release_date),
        text(&details.latest_version),
        date(&details.latest_version_date),
        details.major_releases_behind.to_string(),
        details.minor_releases_behind.to_string(),
        details.patch_releases_behind.to_string(),
        details.available_version_count.to_string(),
        text(&details.details_url),
        text(&details.source),
    ]
}

/// Write one row per package, containers sorted by repository then path
pub fn write_report<W: io::Write>(
    containers: &[PackageContainer],
    writer: W,
) -> Result<(), csv::Error> {
    let mut sorted: Vec<&PackageContainer> = containers.iter().collect();
    sorted.sort_by(|a, b| (&a.repo, &a.path).cmp(&(&b.repo, &b.path)));

    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(REPORT_COLUMNS)?;
    for container in sorted {
        for package in &container.packages {
            writer.write_record(row(container, package))?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Write the report to `path`, creating missing parent directories and
/// replacing any existing file
pub fn write_csv(containers: &[PackageContainer], path: &Path) -> Result<(), ScanError> {
    let failed = |reason: String| ScanError::Report {
        path: path.display().to_string(),
        reason,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| failed(e.to_string()))?;
    }
    info!("Writing report to {}", path.display());
    let file = File::create(path).map_err(|e| failed(e.to_string()))?;
    write_report(containers, file).map_err(|e| failed(e.to_string()))
}
