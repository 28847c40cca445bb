use crate::error::FetchError;
use crate::logger::log_info;
use crate::pip::PackageManager;
use crate::probe::{ImportProber, ImportStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecord {
    pub name: String,
    pub version: String,
    pub import_status: ImportStatus,
}

impl PackageRecord {
    pub fn status_label(&self) -> &'static str {
        self.import_status.label()
    }
}

/// One full fetch cycle: list installed packages, then probe every one of them.
pub fn fetch_inventory(
    manager: &dyn PackageManager,
    prober: &dyn ImportProber,
) -> Result<Vec<PackageRecord>, FetchError> {
    let listed = manager.list_installed()?;

    let names: Vec<String> = listed.iter().map(|p| p.name.clone()).collect();
    let statuses = prober.probe_all(&names);

    let records: Vec<PackageRecord> = listed
        .into_iter()
        .map(|pkg| {
            let import_status = statuses
                .get(&pkg.name)
                .copied()
                .unwrap_or(ImportStatus::ProbeSkipped);
            PackageRecord {
                name: pkg.name,
                version: pkg.version,
                import_status,
            }
        })
        .collect();

    let broken = records
        .iter()
        .filter(|r| r.import_status == ImportStatus::NotLoadable)
        .count();
    log_info(&format!(
        "Fetched {} packages ({} not importable)",
        records.len(),
        broken
    ));
    Ok(records)
}
