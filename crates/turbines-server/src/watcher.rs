//! Filesystem change detection.
//!
//! Watches the project root recursively and turns raw notify events into
//! [`ChangeEvent`]s. All accepted events share one debounce scope: a burst
//! touching several files emits a single event once the burst goes quiet.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::debouncer::Debouncer;
use crate::error::ServerError;

/// Ignore patterns applied in addition to configured ones.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &["**/.git/**", "**/*.swp", "**/*~", "**/.DS_Store"];

/// Project-local state directory, never watched.
const STATE_DIR: &str = ".turbines";

/// The single coalescing scope of a watch session.
const PROJECT_SCOPE: &str = "project";

/// A debounced change in the project tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Absolute path of the most recent change in the burst.
    pub path: PathBuf,
    /// When that change was observed.
    pub timestamp: SystemTime,
    /// Whether the path lies under the static asset directory.
    pub is_static: bool,
    /// Whether every change in the burst was static.
    pub all_static: bool,
}

impl ChangeEvent {
    /// Build an event for a single change to `path` observed now.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, is_static: bool) -> Self {
        Self {
            path: path.into(),
            timestamp: SystemTime::now(),
            is_static,
            all_static: is_static,
        }
    }
}

/// What to watch and how.
#[derive(Clone, Debug)]
pub struct WatchOptions {
    /// Project root, watched recursively.
    pub root: PathBuf,
    /// Build output, excluded from watching.
    pub output_dir: PathBuf,
    /// Static asset sources.
    pub static_dir: PathBuf,
    /// Quiet period before a burst is emitted.
    pub debounce: Duration,
    /// Extra glob patterns, matched against paths relative to the root.
    pub ignore_patterns: Vec<String>,
}

/// Decides which raw events matter and how they are classified.
#[derive(Debug)]
struct ChangeFilter {
    root: PathBuf,
    output_dir: PathBuf,
    static_dir: PathBuf,
    ignore: Vec<glob::Pattern>,
}

impl ChangeFilter {
    fn new(options: &WatchOptions) -> Result<Self, ServerError> {
        let ignore = DEFAULT_IGNORE_PATTERNS
            .iter()
            .copied()
            .chain(options.ignore_patterns.iter().map(String::as_str))
            .map(|pattern| {
                glob::Pattern::new(pattern).map_err(|source| ServerError::IgnorePattern {
                    pattern: pattern.to_owned(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            root: canonical(&options.root),
            output_dir: canonical(&options.output_dir),
            static_dir: canonical(&options.static_dir),
            ignore,
        })
    }

    /// Changes carried by one raw event, in path order.
    fn classify(&self, event: &Event) -> Vec<ChangeEvent> {
        match event.kind {
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {}
            _ => return Vec::new(),
        }

        event
            .paths
            .iter()
            .filter(|path| self.accepts(path))
            .map(|path| ChangeEvent::new(path.clone(), path.starts_with(&self.static_dir)))
            .collect()
    }

    fn accepts(&self, path: &Path) -> bool {
        if path.starts_with(&self.output_dir) || path.is_dir() {
            return false;
        }
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        if relative.starts_with(STATE_DIR) {
            return false;
        }
        !self.ignore.iter().any(|p| p.matches_path(relative))
    }
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Running watch session.
///
/// Dropping the handle without [`stop`](Self::stop) also stops watching.
pub struct FileChangeWatcher {
    watcher: RecommendedWatcher,
    debouncer: Arc<Debouncer<&'static str>>,
    task: JoinHandle<()>,
}

impl FileChangeWatcher {
    /// Start watching. Debounced events are sent to `sink`.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if an ignore pattern is invalid or the OS watcher
    /// cannot be created.
    pub fn start(
        options: &WatchOptions,
        sink: mpsc::UnboundedSender<ChangeEvent>,
    ) -> Result<Self, ServerError> {
        let filter = ChangeFilter::new(options)?;
        let watch_error = |source| ServerError::Watch {
            path: filter.root.display().to_string(),
            source,
        };

        let (tx, mut rx) = mpsc::channel::<notify::Result<Event>>(256);
        let mut watcher = notify::recommended_watcher(move |res| {
            // Runs on the notify thread
            let _ = tx.blocking_send(res);
        })
        .map_err(watch_error)?;
        watcher
            .watch(&filter.root, RecursiveMode::Recursive)
            .map_err(watch_error)?;

        let debouncer = Arc::new(Debouncer::new(options.debounce));
        let task = tokio::spawn(forward_events(rx, filter, Arc::clone(&debouncer), sink));

        tracing::info!(
            root = %options.root.display(),
            debounce_ms = options.debounce.as_millis(),
            "Watching for changes"
        );

        Ok(Self {
            watcher,
            debouncer,
            task,
        })
    }

    /// Stop watching. A pending debounced change is discarded.
    pub fn stop(self) {
        if self.debouncer.cancel(&PROJECT_SCOPE) {
            tracing::debug!("Discarded pending change");
        }
        self.task.abort();
        drop(self.watcher);
    }
}

/// Classify raw events and feed them through the shared debounce scope.
///
/// The emitted event names the most recent change; `all_static` covers the
/// whole burst.
async fn forward_events(
    mut rx: mpsc::Receiver<notify::Result<Event>>,
    filter: ChangeFilter,
    debouncer: Arc<Debouncer<&'static str>>,
    sink: mpsc::UnboundedSender<ChangeEvent>,
) {
    let burst_has_content = Arc::new(AtomicBool::new(false));

    while let Some(res) = rx.recv().await {
        let event = match res {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "File watcher error");
                continue;
            }
        };

        for change in filter.classify(&event) {
            tracing::debug!(
                path = %change.path.display(),
                is_static = change.is_static,
                "Recorded filesystem event"
            );
            if !change.is_static {
                burst_has_content.store(true, Ordering::SeqCst);
            }

            let sink = sink.clone();
            let burst_has_content = Arc::clone(&burst_has_content);
            debouncer.schedule(PROJECT_SCOPE, async move {
                let had_content = burst_has_content.swap(false, Ordering::SeqCst);
                let _ = sink.send(ChangeEvent {
                    all_static: change.is_static && !had_content,
                    ..change
                });
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, ModifyKind, RemoveKind};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn options(root: &Path) -> WatchOptions {
        WatchOptions {
            root: root.to_path_buf(),
            output_dir: root.join(".site"),
            static_dir: root.join("static"),
            debounce: Duration::from_millis(300),
            ignore_patterns: vec!["drafts/**".to_owned()],
        }
    }

    fn filter(tmp: &TempDir) -> ChangeFilter {
        let root = tmp.path();
        std::fs::create_dir_all(root.join(".site")).unwrap();
        std::fs::create_dir_all(root.join("static")).unwrap();
        std::fs::create_dir_all(root.join("pages")).unwrap();
        ChangeFilter::new(&options(root)).unwrap()
    }

    fn modify(path: PathBuf) -> Event {
        Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content))).add_path(path)
    }

    #[test]
    fn test_content_change_is_accepted() {
        let tmp = TempDir::new().unwrap();
        let filter = filter(&tmp);
        let page = filter.root.join("pages/a.md");

        let changes = filter.classify(&modify(page.clone()));

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, page);
        assert!(!changes[0].is_static);
    }

    #[test]
    fn test_static_change_is_classified() {
        let tmp = TempDir::new().unwrap();
        let filter = filter(&tmp);
        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path(filter.root.join("static/css/site.css"));

        let changes = filter.classify(&event);

        assert_eq!(changes.len(), 1);
        assert!(changes[0].is_static);
    }

    #[test]
    fn test_output_dir_is_ignored() {
        let tmp = TempDir::new().unwrap();
        let filter = filter(&tmp);

        let changes = filter.classify(&modify(filter.root.join(".site/index.html")));

        assert!(changes.is_empty());
    }

    #[test]
    fn test_directories_are_ignored() {
        let tmp = TempDir::new().unwrap();
        let filter = filter(&tmp);
        let event =
            Event::new(EventKind::Create(CreateKind::Folder)).add_path(filter.root.join("pages"));

        assert!(filter.classify(&event).is_empty());
    }

    #[test]
    fn test_default_and_configured_ignores() {
        let tmp = TempDir::new().unwrap();
        let filter = filter(&tmp);

        for rel in [
            ".git/HEAD",
            "pages/.a.md.swp",
            "pages/a.md~",
            ".DS_Store",
            ".turbines/state",
            "drafts/wip.md",
        ] {
            let changes = filter.classify(&modify(filter.root.join(rel)));
            assert!(changes.is_empty(), "{rel} should be ignored");
        }
    }

    #[test]
    fn test_access_events_are_ignored() {
        let tmp = TempDir::new().unwrap();
        let filter = filter(&tmp);
        let event = Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path(filter.root.join("pages/a.md"));

        assert!(filter.classify(&event).is_empty());
    }

    #[test]
    fn test_removed_file_is_accepted() {
        let tmp = TempDir::new().unwrap();
        let filter = filter(&tmp);
        let event = Event::new(EventKind::Remove(RemoveKind::File))
            .add_path(filter.root.join("pages/gone.md"));

        assert_eq!(filter.classify(&event).len(), 1);
    }

    #[test]
    fn test_invalid_ignore_pattern() {
        let tmp = TempDir::new().unwrap();
        let mut opts = options(tmp.path());
        opts.ignore_patterns = vec!["[".to_owned()];

        let err = ChangeFilter::new(&opts).unwrap_err();

        assert!(matches!(err, ServerError::IgnorePattern { .. }));
    }

    fn spawn_forwarder(
        filter: ChangeFilter,
    ) -> (
        mpsc::Sender<notify::Result<Event>>,
        mpsc::UnboundedReceiver<ChangeEvent>,
    ) {
        let (raw_tx, raw_rx) = mpsc::channel(16);
        let (tx, rx) = mpsc::unbounded_channel();
        let debouncer = Arc::new(Debouncer::new(Duration::from_millis(300)));
        tokio::spawn(forward_events(raw_rx, filter, debouncer, tx));
        (raw_tx, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_mixed_burst_is_not_static() {
        let tmp = TempDir::new().unwrap();
        let filter = filter(&tmp);
        let page = filter.root.join("pages/a.md");
        let css = filter.root.join("static/site.css");
        let (raw_tx, mut rx) = spawn_forwarder(filter);

        raw_tx.send(Ok(modify(page))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        raw_tx.send(Ok(modify(css.clone()))).await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.path, css);
        assert!(event.is_static);
        assert!(!event.all_static);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_content_flag_resets_between_bursts() {
        let tmp = TempDir::new().unwrap();
        let filter = filter(&tmp);
        let page = filter.root.join("pages/a.md");
        let css = filter.root.join("static/site.css");
        let (raw_tx, mut rx) = spawn_forwarder(filter);

        raw_tx.send(Ok(modify(page))).await.unwrap();
        assert!(!rx.recv().await.unwrap().all_static);

        raw_tx.send(Ok(modify(css))).await.unwrap();
        assert!(rx.recv().await.unwrap().all_static);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_error_does_not_stop_forwarding() {
        let tmp = TempDir::new().unwrap();
        let filter = filter(&tmp);
        let page = filter.root.join("pages/a.md");
        let (raw_tx, mut rx) = spawn_forwarder(filter);

        raw_tx
            .send(Err(notify::Error::generic("watch limit reached")))
            .await
            .unwrap();
        raw_tx.send(Ok(modify(page.clone()))).await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.path, page);
        assert!(!event.is_static);
    }

    #[tokio::test]
    async fn test_burst_emits_one_event() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        std::fs::create_dir_all(root.join("pages")).unwrap();
        let mut opts = options(root);
        opts.debounce = Duration::from_millis(200);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let watcher = FileChangeWatcher::start(&opts, tx).unwrap();

        for i in 0..3 {
            std::fs::write(root.join("pages/a.md"), format!("v{i}")).unwrap();
            tokio::time::sleep(Duration::from_millis(30)).await;
        }

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(event.path.ends_with("pages/a.md"));
        assert!(!event.is_static);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(rx.try_recv().is_err());

        watcher.stop();
    }
}
