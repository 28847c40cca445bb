use crate::browser;
use crate::error::{FetchError, UninstallError};
use crate::fetch_task::{FetchTask, StartOutcome, TaskPoll};
use crate::inventory::{fetch_inventory, PackageRecord};
use crate::logger::{log_error, log_info, log_warning};
use crate::pip::PackageManager;
use crate::probe::ImportProber;
use std::sync::Arc;

pub const DETAILS_FALLBACK: &str = "No additional details available.";

/// One rendered table row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub name: String,
    pub version: String,
    pub status: &'static str,
    pub odd: bool,
}

impl Row {
    fn from_record(index: usize, record: &PackageRecord) -> Self {
        Self {
            name: record.name.clone(),
            version: record.version.clone(),
            status: record.status_label(),
            odd: index % 2 == 1,
        }
    }
}

#[derive(Debug)]
pub enum FetchOutcome {
    Loaded,
    Failed,
}

#[derive(Debug)]
pub enum UninstallOutcome {
    Removed,
    Declined,
    UnknownPackage,
    Failed(UninstallError),
}

/// Everything the window shows, owned by the UI event loop.
pub struct AppState<M, P> {
    manager: Arc<M>,
    prober: Arc<P>,
    records: Vec<PackageRecord>,
    query: String,
    status: String,
    pending_error: Option<String>,
    fetch: FetchTask<Result<Vec<PackageRecord>, FetchError>>,
    search_url_template: String,
}

impl<M, P> AppState<M, P>
where
    M: PackageManager + 'static,
    P: ImportProber + 'static,
{
    pub fn new(manager: Arc<M>, prober: Arc<P>, search_url_template: impl Into<String>) -> Self {
        Self {
            manager,
            prober,
            records: Vec::new(),
            query: String::new(),
            status: "Status: Ready".to_string(),
            pending_error: None,
            fetch: FetchTask::new(),
            search_url_template: search_url_template.into(),
        }
    }

    pub fn records(&self) -> &[PackageRecord] {
        &self.records
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn is_fetching(&self) -> bool {
        self.fetch.is_running()
    }

    #[cfg(test)]
    pub fn fetches_started(&self) -> u64 {
        self.fetch.started_count()
    }

    /// Error waiting to be shown in a dialog, if any.
    pub fn take_error(&mut self) -> Option<String> {
        self.pending_error.take()
    }

    /// Starts a fetch cycle unless one is already running.
    pub fn refresh(&mut self) -> bool {
        let manager = Arc::clone(&self.manager);
        let prober = Arc::clone(&self.prober);

        match self
            .fetch
            .start(move || fetch_inventory(manager.as_ref(), prober.as_ref()))
        {
            StartOutcome::Started => {
                log_info(&format!(
                    "Fetching installed packages (fetch #{})",
                    self.fetch.started_count()
                ));
                self.status = "Fetching installed packages...".to_string();
                true
            }
            StartOutcome::AlreadyRunning => false,
            StartOutcome::SpawnFailed => {
                self.fail_fetch("Could not start the package fetch.".to_string());
                false
            }
        }
    }

    /// Drops the in-flight fetch, if any. The current records stay.
    pub fn cancel_fetch(&mut self) -> bool {
        let cancelled = self.fetch.cancel();
        if cancelled {
            self.status = "Fetch cancelled.".to_string();
        }
        cancelled
    }

    /// Applies a finished fetch without blocking.
    pub fn poll_fetch(&mut self) -> Option<FetchOutcome> {
        let polled = self.fetch.poll();
        self.apply(polled)
    }

    /// Blocks until the running fetch finishes and applies it.
    pub fn wait_fetch(&mut self) -> Option<FetchOutcome> {
        let polled = self.fetch.wait();
        self.apply(polled)
    }

    fn apply(
        &mut self,
        polled: TaskPoll<Result<Vec<PackageRecord>, FetchError>>,
    ) -> Option<FetchOutcome> {
        match polled {
            TaskPoll::Idle | TaskPoll::Pending => None,
            TaskPoll::Finished(Ok(records)) => {
                let count = records.len();
                self.records = records;
                self.status = format!("Loaded {} installed packages.", count);
                Some(FetchOutcome::Loaded)
            }
            TaskPoll::Finished(Err(e)) => {
                let message = format!("Failed to fetch installed packages.\n\n{}", e);
                Some(self.fail_fetch(message))
            }
            TaskPoll::Lost => Some(self.fail_fetch(
                "Failed to fetch installed packages: the fetch stopped unexpectedly.".to_string(),
            )),
        }
    }

    fn fail_fetch(&mut self, message: String) -> FetchOutcome {
        log_error(&message);
        self.status = "Failed to fetch installed packages.".to_string();
        self.pending_error = Some(message);
        FetchOutcome::Failed
    }

    pub fn rows(&self) -> Vec<Row> {
        self.records
            .iter()
            .enumerate()
            .map(|(i, r)| Row::from_record(i, r))
            .collect()
    }

    /// Case-insensitive substring filter on the package name. The query is
    /// remembered so later refreshes keep it applied.
    pub fn filter(&mut self, query: &str) -> Vec<Row> {
        self.query = query.trim().to_string();
        self.visible_rows()
    }

    pub fn visible_rows(&self) -> Vec<Row> {
        let needle = self.query.to_lowercase();
        self.records
            .iter()
            .filter(|r| needle.is_empty() || r.name.to_lowercase().contains(&needle))
            .enumerate()
            .map(|(i, r)| Row::from_record(i, r))
            .collect()
    }

    /// Asks `confirm` first; only a confirmed removal touches pip. A
    /// successful removal starts one refetch.
    pub fn uninstall<F>(&mut self, name: &str, confirm: F) -> UninstallOutcome
    where
        F: FnOnce(&str) -> bool,
    {
        if !self.records.iter().any(|r| r.name == name) {
            log_warning(&format!("Uninstall requested for unknown package: {}", name));
            return UninstallOutcome::UnknownPackage;
        }

        if !confirm(name) {
            return UninstallOutcome::Declined;
        }

        match self.manager.uninstall(name) {
            Ok(()) => {
                self.status = format!("{} has been uninstalled.", name);
                // A fetch already running listed packages before the removal.
                if self.fetch.cancel() {
                    log_info("Restarting fetch started before the uninstall");
                }
                self.refresh();
                UninstallOutcome::Removed
            }
            Err(e) => {
                self.status = format!("Failed to uninstall {}.", name);
                UninstallOutcome::Failed(e)
            }
        }
    }

    pub fn details(&self, name: &str) -> String {
        match self.manager.show(name) {
            Ok(text) => text,
            Err(e) => {
                log_warning(&e.to_string());
                DETAILS_FALLBACK.to_string()
            }
        }
    }

    pub fn search_url(&self, name: &str) -> String {
        browser::search_url(&self.search_url_template, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::testing::{FakeManager, FakeProber};
    use crate::probe::ImportStatus;
    use crate::error::DetailsUnavailable;
    use crate::pip::ListedPackage;
    use std::collections::HashMap;
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::sync::Mutex;

    const SEARCH: &str = "https://www.google.com/search?q={query}";

    /// Listing that can be held open after taking its snapshot, so a test can
    /// act while a fetch is mid-flight.
    #[derive(Default)]
    struct GatedManager {
        inner: FakeManager,
        gate: Mutex<Option<(Sender<()>, Receiver<()>)>>,
    }

    impl GatedManager {
        /// Holds the next listing until `release` is signalled. Returns
        /// (listed, release).
        fn hold_next_listing(&self) -> (Receiver<()>, Sender<()>) {
            let (listed_tx, listed_rx) = mpsc::channel();
            let (release_tx, release_rx) = mpsc::channel();
            *self.gate.lock().unwrap() = Some((listed_tx, release_rx));
            (listed_rx, release_tx)
        }
    }

    impl PackageManager for GatedManager {
        fn list_installed(&self) -> Result<Vec<ListedPackage>, FetchError> {
            let snapshot = self.inner.list_installed();
            let gate = self.gate.lock().unwrap().take();
            if let Some((listed, release)) = gate {
                let _ = listed.send(());
                let _ = release.recv();
            }
            snapshot
        }

        fn show(&self, name: &str) -> Result<String, DetailsUnavailable> {
            self.inner.show(name)
        }

        fn uninstall(&self, name: &str) -> Result<(), UninstallError> {
            self.inner.uninstall(name)
        }
    }

    fn loaded(pairs: &[(&str, &str)]) -> (Arc<FakeManager>, AppState<FakeManager, FakeProber>) {
        let manager = Arc::new(FakeManager::with_packages(pairs));
        let mut app = AppState::new(Arc::clone(&manager), Arc::new(FakeProber::default()), SEARCH);
        assert!(app.refresh());
        assert!(matches!(app.wait_fetch(), Some(FetchOutcome::Loaded)));
        (manager, app)
    }

    #[test]
    fn starts_empty_and_ready() {
        let app = AppState::new(
            Arc::new(FakeManager::default()),
            Arc::new(FakeProber::default()),
            SEARCH,
        );
        assert!(app.rows().is_empty());
        assert_eq!(app.status(), "Status: Ready");
        assert!(!app.is_fetching());
    }

    #[test]
    fn requests_scenario_renders_ok_row() {
        let (_, app) = loaded(&[("requests", "2.31.0")]);
        assert_eq!(
            app.rows(),
            vec![Row {
                name: "requests".to_string(),
                version: "2.31.0".to_string(),
                status: "OK",
                odd: false,
            }]
        );
        assert_eq!(app.status(), "Loaded 1 installed packages.");
    }

    #[test]
    fn row_count_matches_listing() {
        let (_, app) = loaded(&[("a", "1"), ("b", "2"), ("c", "3"), ("d", "4")]);
        assert_eq!(app.rows().len(), app.records().len());
        assert_eq!(app.rows().len(), 4);
        let parity: Vec<bool> = app.rows().iter().map(|r| r.odd).collect();
        assert_eq!(parity, vec![false, true, false, true]);
    }

    #[test]
    fn not_loadable_package_is_not_functional() {
        let manager = Arc::new(FakeManager::with_packages(&[
            ("requests", "2.31.0"),
            ("black", "24.1.0"),
        ]));
        let prober = Arc::new(FakeProber::with_broken(&["black"]));
        let mut app = AppState::new(manager, prober, SEARCH);
        app.refresh();
        app.wait_fetch();
        let statuses: Vec<_> = app.rows().iter().map(|r| r.status).collect();
        assert_eq!(statuses, vec!["OK", "Not Functional"]);
        assert_eq!(app.records()[1].import_status, ImportStatus::NotLoadable);
    }

    #[test]
    fn listing_failure_keeps_previous_rows() {
        let (manager, mut app) = loaded(&[("requests", "2.31.0")]);
        let before = app.rows();

        manager.set_fail_listing(true);
        app.refresh();
        let outcome = app.wait_fetch();
        assert!(matches!(outcome, Some(FetchOutcome::Failed)));
        assert_eq!(app.rows(), before);
        assert!(app.take_error().is_some());
        assert!(app.take_error().is_none());
    }

    #[test]
    fn first_fetch_failure_leaves_empty_list() {
        let manager = Arc::new(FakeManager::with_packages(&[("requests", "2.31.0")]));
        manager.set_fail_listing(true);
        let mut app = AppState::new(manager, Arc::new(FakeProber::default()), SEARCH);
        app.refresh();
        app.wait_fetch();
        assert!(app.rows().is_empty());
        assert_eq!(app.status(), "Failed to fetch installed packages.");
    }

    #[test]
    fn filter_is_case_insensitive_substring() {
        let (_, mut app) = loaded(&[
            ("requests", "2.31.0"),
            ("Pygments", "2.17"),
            ("urllib3", "2.2"),
        ]);
        let names: Vec<_> = app.filter("req").into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["requests"]);
        let names: Vec<_> = app.filter("  PYG ").into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["Pygments"]);
        assert!(app.filter("nothing-matches").is_empty());
    }

    #[test]
    fn filter_is_idempotent_and_non_destructive() {
        let (_, mut app) = loaded(&[("requests", "2.31.0"), ("rich", "13.7"), ("six", "1.16")]);
        let all = app.rows();
        let records_before = app.records().to_vec();

        let once = app.filter("r");
        let twice = app.filter("r");
        assert_eq!(once, twice);
        assert_eq!(app.records(), records_before.as_slice());

        assert_eq!(app.filter(""), all);
    }

    #[test]
    fn filtered_rows_alternate_by_visible_index() {
        let (_, mut app) = loaded(&[("a-one", "1"), ("skip", "1"), ("a-two", "1")]);
        let rows = app.filter("a-");
        assert_eq!(rows.len(), 2);
        assert!(!rows[0].odd);
        assert!(rows[1].odd);
    }

    #[test]
    fn declined_uninstall_changes_nothing() {
        let (manager, mut app) = loaded(&[("requests", "2.31.0")]);
        let rows_before = app.rows();
        let fetches_before = app.fetches_started();

        let mut asked = None;
        let outcome = app.uninstall("requests", |name| {
            asked = Some(name.to_string());
            false
        });

        assert!(matches!(outcome, UninstallOutcome::Declined));
        assert_eq!(asked.as_deref(), Some("requests"));
        assert_eq!(app.rows(), rows_before);
        assert_eq!(app.fetches_started(), fetches_before);
        assert_eq!(manager.uninstall_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn successful_uninstall_refetches_once() {
        let (manager, mut app) = loaded(&[("requests", "2.31.0"), ("six", "1.16")]);
        let lists_before = manager.list_calls();

        let outcome = app.uninstall("requests", |_| true);
        assert!(matches!(outcome, UninstallOutcome::Removed));
        assert!(app.is_fetching());
        app.wait_fetch();

        assert_eq!(manager.list_calls(), lists_before + 1);
        let names: Vec<_> = app.rows().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["six"]);
    }

    #[test]
    fn uninstall_during_fetch_replaces_stale_listing() {
        let manager = Arc::new(GatedManager {
            inner: FakeManager::with_packages(&[("requests", "2.31.0"), ("six", "1.16")]),
            ..GatedManager::default()
        });
        let mut app = AppState::new(Arc::clone(&manager), Arc::new(FakeProber::default()), SEARCH);
        app.refresh();
        app.wait_fetch();
        let fetches_before = app.fetches_started();

        let (listed, release) = manager.hold_next_listing();
        assert!(app.refresh());
        listed.recv().expect("listing started");

        let outcome = app.uninstall("requests", |_| true);
        assert!(matches!(outcome, UninstallOutcome::Removed));
        assert!(app.is_fetching());
        release.send(()).expect("release listing");

        assert!(matches!(app.wait_fetch(), Some(FetchOutcome::Loaded)));
        assert!(app.wait_fetch().is_none());
        assert_eq!(app.fetches_started(), fetches_before + 2);
        let names: Vec<_> = app.rows().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["six"]);
    }

    #[test]
    fn failed_uninstall_does_not_refetch() {
        let manager = Arc::new(FakeManager {
            fail_uninstall: true,
            ..FakeManager::with_packages(&[("requests", "2.31.0")])
        });
        let mut app = AppState::new(Arc::clone(&manager), Arc::new(FakeProber::default()), SEARCH);
        app.refresh();
        app.wait_fetch();
        let lists_before = manager.list_calls();
        let rows_before = app.rows();

        let outcome = app.uninstall("requests", |_| true);
        assert!(matches!(outcome, UninstallOutcome::Failed(_)));
        assert!(!app.is_fetching());
        assert_eq!(manager.list_calls(), lists_before);
        assert_eq!(app.rows(), rows_before);
    }

    #[test]
    fn unknown_package_is_rejected_without_prompt() {
        let (_, mut app) = loaded(&[("requests", "2.31.0")]);
        let outcome = app.uninstall("flask", |_| panic!("must not ask"));
        assert!(matches!(outcome, UninstallOutcome::UnknownPackage));
    }

    #[test]
    fn refresh_is_single_flight() {
        let (_, mut app) = loaded(&[("requests", "2.31.0")]);
        let started = app.fetches_started();
        assert!(app.refresh());
        assert!(!app.refresh());
        app.wait_fetch();
        assert_eq!(app.fetches_started(), started + 1);
    }

    #[test]
    fn cancelled_fetch_keeps_records() {
        let (manager, mut app) = loaded(&[("requests", "2.31.0")]);
        manager.packages.lock().unwrap().clear();
        app.refresh();
        assert!(app.cancel_fetch());
        assert!(app.wait_fetch().is_none());
        assert_eq!(app.rows().len(), 1);
    }

    #[test]
    fn details_returns_output_or_fallback() {
        let mut details = HashMap::new();
        details.insert("requests".to_string(), "Name: requests\nVersion: 2.31.0\n".to_string());
        let manager = Arc::new(FakeManager {
            details,
            ..FakeManager::with_packages(&[("requests", "2.31.0")])
        });
        let app = AppState::new(manager, Arc::new(FakeProber::default()), SEARCH);
        assert_eq!(app.details("requests"), "Name: requests\nVersion: 2.31.0\n");
        assert_eq!(app.details("missing"), DETAILS_FALLBACK);
    }

    #[test]
    fn search_url_uses_configured_template() {
        let (_, app) = loaded(&[("requests", "2.31.0")]);
        assert_eq!(
            app.search_url("requests"),
            "https://www.google.com/search?q=What+is+requests+for%3F"
        );
    }
}
