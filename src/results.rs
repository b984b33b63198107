// Official result loading from CSV files.
//
// Expected columns: driver, position, status, points, fastest_lap. Status
// values are finished/dnf/dns/dsq. Bad rows are skipped with a warning so a
// single typo never blocks the rest of an import.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{CoreError, Result};
use crate::model::{DriverId, EventId, EventResult, ResultStatus};
use crate::ports::Repository;

/// Raw CSV row. `fastest_lap` defaults to false when the column is absent.
#[derive(Debug, Deserialize)]
struct RawResultRow {
    driver: i64,
    position: u32,
    status: String,
    points: i64,
    #[serde(default)]
    fastest_lap: bool,
}

/// Outcome of one import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

/// Import results for one event from any reader. Re-importing the same file
/// overwrites previous rows (the store replaces on conflict).
pub fn import_event_results<R: Read>(
    repo: &dyn Repository,
    event: EventId,
    reader: R,
) -> Result<ImportSummary> {
    repo.event(event)?
        .ok_or_else(|| CoreError::not_found("event", event))?;

    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut summary = ImportSummary {
        imported: 0,
        skipped: 0,
    };

    for row in csv_reader.deserialize::<RawResultRow>() {
        let raw = match row {
            Ok(raw) => raw,
            Err(err) => {
                warn!("skipping unreadable result row: {err}");
                summary.skipped += 1;
                continue;
            }
        };
        let status = match ResultStatus::parse(&raw.status) {
            Some(status) => status,
            None => {
                warn!(
                    driver = raw.driver,
                    "skipping result row with unknown status `{}`", raw.status
                );
                summary.skipped += 1;
                continue;
            }
        };
        repo.insert_result(&EventResult {
            event,
            driver: DriverId(raw.driver),
            position: raw.position,
            status,
            points: raw.points,
            fastest_lap: raw.fastest_lap,
        })?;
        summary.imported += 1;
    }

    info!(
        event = %event,
        imported = summary.imported,
        skipped = summary.skipped,
        "event results imported"
    );
    Ok(summary)
}

/// Import results for one event from a CSV file on disk.
pub fn import_event_results_file(
    repo: &dyn Repository,
    event: EventId,
    path: &Path,
) -> Result<ImportSummary> {
    let file = std::fs::File::open(path).map_err(|err| {
        CoreError::Validation(format!("cannot open results file {}: {err}", path.display()))
    })?;
    import_event_results(repo, event, file)
}
