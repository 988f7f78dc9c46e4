//! Mock site builder for testing.
//!
//! Provides [`MockSiteBuilder`] for exercising the dev server without
//! rendering a real site, and [`MockControl`] to steer and observe it from the
//! test while the builder itself is owned by the server.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use crate::fs::write_atomic;
use crate::{BuildError, BuildReport, SiteBuilder};

#[derive(Debug, Default)]
struct State {
    started: usize,
    builds: Vec<bool>,
    succeeded: usize,
    failing: bool,
    held: bool,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<State>,
    released: Condvar,
}

/// Handle for steering a [`MockSiteBuilder`] from a test.
#[derive(Clone, Debug, Default)]
pub struct MockControl {
    shared: Arc<Shared>,
}

impl MockControl {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Number of builds that have started, finished or not.
    #[must_use]
    pub fn started(&self) -> usize {
        self.lock().started
    }

    /// `incremental` flag of every finished build, in order.
    #[must_use]
    pub fn builds(&self) -> Vec<bool> {
        self.lock().builds.clone()
    }

    /// Make subsequent builds fail without touching the output.
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    /// Block builds after they start until [`release`](Self::release).
    pub fn hold(&self) {
        self.lock().held = true;
    }

    /// Let held builds finish.
    pub fn release(&self) {
        self.lock().held = false;
        self.shared.released.notify_all();
    }
}

/// Site builder that writes a single `index.html` naming the build number.
///
/// # Example
///
/// ```ignore
/// use turbines_site::{MockSiteBuilder, SiteBuilder};
///
/// let mut builder = MockSiteBuilder::new("/tmp/project");
/// let control = builder.control();
/// builder.load()?;
/// builder.build_site(false)?;
/// assert_eq!(control.builds(), vec![false]);
/// ```
#[derive(Debug)]
pub struct MockSiteBuilder {
    project_dir: PathBuf,
    output_dir: PathBuf,
    static_dir: PathBuf,
    control: MockControl,
}

impl MockSiteBuilder {
    /// Create a mock rooted at `project_dir`, writing to `project_dir/.site`.
    #[must_use]
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        let project_dir = project_dir.into();
        Self {
            output_dir: project_dir.join(".site"),
            static_dir: project_dir.join("static"),
            project_dir,
            control: MockControl::default(),
        }
    }

    /// Control handle shared with this builder.
    #[must_use]
    pub fn control(&self) -> MockControl {
        self.control.clone()
    }
}

impl SiteBuilder for MockSiteBuilder {
    fn load(&mut self) -> Result<(), BuildError> {
        std::fs::create_dir_all(&self.output_dir).map_err(|e| BuildError::io(&self.output_dir, e))
    }

    fn build_site(&mut self, incremental: bool) -> Result<BuildReport, BuildError> {
        let mut state = self.control.lock();
        state.started += 1;
        while state.held {
            state = self
                .control
                .shared
                .released
                .wait(state)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }

        state.builds.push(incremental);
        if state.failing {
            return Err(BuildError::Hook {
                hook: "mock",
                message: "forced failure".to_owned(),
            });
        }

        state.succeeded += 1;
        let body = format!("<html><body>build {}</body></html>", state.succeeded);
        drop(state);
        write_atomic(&self.output_dir.join("index.html"), body.as_bytes())?;

        Ok(BuildReport {
            incremental,
            pages_rendered: usize::from(!incremental),
            assets_copied: 0,
            elapsed: Duration::ZERO,
        })
    }

    fn build_path(&self) -> &Path {
        &self.project_dir
    }

    fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn static_dir(&self) -> &Path {
        &self.static_dir
    }
}
