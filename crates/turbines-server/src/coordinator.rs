//! Rebuild coordination.
//!
//! A single task owns the site builder. Change events queue up on a channel
//! while a build runs; when it finishes, everything queued is folded into one
//! more build. Builds therefore never overlap and a burst arriving mid-build
//! costs exactly one extra build.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use turbines_site::SiteBuilder;

use crate::hub::ReloadBroadcastHub;
use crate::watcher::ChangeEvent;

/// Generation of the built site. Increases by one per successful build.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BuildEpoch(u64);

impl BuildEpoch {
    /// Epoch before any successful build.
    pub const ZERO: Self = Self(0);

    /// Raw counter value.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for BuildEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Serializes rebuilds and publishes their results.
pub struct RebuildCoordinator {
    triggers: mpsc::UnboundedSender<ChangeEvent>,
    epoch: watch::Receiver<BuildEpoch>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<Option<Box<dyn SiteBuilder>>>,
}

impl RebuildCoordinator {
    /// Spawn the coordinator task, taking ownership of `builder`.
    ///
    /// `initial` is the epoch already reached, e.g. by a build run before the
    /// coordinator existed. Must be called from within a tokio runtime.
    pub fn spawn(
        builder: Box<dyn SiteBuilder>,
        hub: Arc<ReloadBroadcastHub>,
        initial: BuildEpoch,
    ) -> Self {
        let (triggers, rx) = mpsc::unbounded_channel();
        let (epoch_tx, epoch) = watch::channel(initial);
        let (shutdown, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(run(builder, rx, hub, epoch_tx, shutdown_rx));

        Self {
            triggers,
            epoch,
            shutdown,
            task,
        }
    }

    /// Request a rebuild for `event`.
    ///
    /// Returns `false` once the coordinator has stopped.
    pub fn trigger(&self, event: ChangeEvent) -> bool {
        self.triggers.send(event).is_ok()
    }

    /// Sender feeding [`trigger`](Self::trigger), for the file watcher.
    pub(crate) fn trigger_sender(&self) -> mpsc::UnboundedSender<ChangeEvent> {
        self.triggers.clone()
    }

    /// Current build epoch.
    #[must_use]
    pub fn epoch(&self) -> BuildEpoch {
        *self.epoch.borrow()
    }

    /// Receiver that observes every epoch change.
    #[must_use]
    pub fn subscribe_epoch(&self) -> watch::Receiver<BuildEpoch> {
        self.epoch.clone()
    }

    /// Stop accepting triggers, wait for an in-flight build and return the
    /// builder.
    ///
    /// Triggers still queued are dropped. Returns `None` if a build panicked.
    pub async fn shutdown(self) -> Option<Box<dyn SiteBuilder>> {
        let _ = self.shutdown.send(true);
        drop(self.triggers);

        match self.task.await {
            Ok(builder) => builder,
            Err(e) => {
                tracing::error!(error = %e, "Rebuild coordinator failed");
                None
            }
        }
    }
}

async fn run(
    mut builder: Box<dyn SiteBuilder>,
    mut rx: mpsc::UnboundedReceiver<ChangeEvent>,
    hub: Arc<ReloadBroadcastHub>,
    epoch: watch::Sender<BuildEpoch>,
    mut shutdown: watch::Receiver<bool>,
) -> Option<Box<dyn SiteBuilder>> {
    loop {
        let first = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        // Fold everything already queued into this build
        let mut incremental = first.all_static;
        let mut coalesced = 0usize;
        while let Ok(event) = rx.try_recv() {
            incremental &= event.all_static;
            coalesced += 1;
        }
        tracing::debug!(
            path = %first.path.display(),
            incremental,
            coalesced,
            "Rebuild triggered"
        );

        builder = build(builder, incremental, &hub, &epoch).await?;

        if *shutdown.borrow() {
            break;
        }
    }

    tracing::debug!("Rebuild coordinator stopped");
    Some(builder)
}

async fn build(
    mut builder: Box<dyn SiteBuilder>,
    incremental: bool,
    hub: &ReloadBroadcastHub,
    epoch: &watch::Sender<BuildEpoch>,
) -> Option<Box<dyn SiteBuilder>> {
    let started = Instant::now();
    let joined = tokio::task::spawn_blocking(move || {
        let result = builder.build_site(incremental);
        (builder, result)
    })
    .await;

    let (builder, result) = match joined {
        Ok(pair) => pair,
        Err(e) => {
            tracing::error!(error = %e, "Rebuild panicked, stopping live reload");
            return None;
        }
    };

    match result {
        Ok(report) => {
            epoch.send_modify(|e| *e = e.next());
            let current = *epoch.borrow();
            let clients = hub.broadcast();
            tracing::info!(
                epoch = %current,
                incremental,
                pages = report.pages_rendered,
                assets = report.assets_copied,
                elapsed_ms = started.elapsed().as_millis(),
                clients,
                "Rebuilt site"
            );
        }
        Err(e) => {
            let current = *epoch.borrow();
            tracing::error!(
                error = %e,
                epoch = %current,
                "Rebuild failed, keeping previous output"
            );
        }
    }

    Some(builder)
}
