//! Filesystem watcher feeding the coalescer and the update orchestrator

use crate::coalescer::ChangeCoalescer;
use crate::orchestrator::UpdateOrchestrator;
use anyhow::{Context, Result};
use arbor_core::{ArborConfig, FileChange, ProjectRoot};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const BATCH_CHANNEL_CAPACITY: usize = 16;

/// Decides which paths under the root are worth analyzing.
#[derive(Debug)]
pub struct PathFilter {
    root: ProjectRoot,
    extensions: Vec<String>,
    cache_dir: PathBuf,
    ignored: GlobSet,
    gitignore: Option<Gitignore>,
}

impl PathFilter {
    pub fn new(root: &ProjectRoot, config: &ArborConfig) -> Result<Self> {
        let mut globs = GlobSetBuilder::new();
        for pattern in &config.ignore {
            let glob = Glob::new(pattern)
                .with_context(|| format!("invalid ignore pattern '{pattern}'"))?;
            globs.add(glob);
        }

        let gitignore = if config.respect_gitignore {
            let mut builder = GitignoreBuilder::new(root.path());
            let file = root.path().join(".gitignore");
            if file.exists() {
                if let Some(e) = builder.add(&file) {
                    warn!("Ignoring unreadable {}: {}", file.display(), e);
                }
            }
            Some(builder.build().context("failed to build .gitignore matcher")?)
        } else {
            None
        };

        Ok(PathFilter {
            root: root.clone(),
            extensions: config.extensions.clone(),
            cache_dir: PathBuf::from(&config.cache_dir),
            ignored: globs.build().context("failed to build ignore set")?,
            gitignore,
        })
    }

    /// Root-relative form of a notified path.
    pub fn relative(&self, path: &Path) -> PathBuf {
        self.root.relative(path)
    }

    /// Whether changes to `path` (absolute or root-relative) should reach
    /// the analyzer.
    pub fn is_relevant(&self, path: &Path) -> bool {
        let relative = self.relative(path);
        if relative.is_absolute() || relative.starts_with("..") {
            return false;
        }

        let has_extension = relative
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)));
        if !has_extension || relative.starts_with(&self.cache_dir) {
            return false;
        }
        if self.ignored.is_match(&relative) {
            return false;
        }
        match &self.gitignore {
            Some(gitignore) => !gitignore
                .matched_path_or_any_parents(&relative, false)
                .is_ignore(),
            None => true,
        }
    }
}

/// Translate one notify event into coalescer input.
pub fn route_event(event: &notify::Event, filter: &PathFilter, coalescer: &ChangeCoalescer) {
    match event.kind {
        EventKind::Create(_) => {
            for path in event.paths.iter().filter(|p| filter.is_relevant(p)) {
                coalescer.push(FileChange::created(filter.relative(path)));
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => {
            let from = filter.relative(&event.paths[0]);
            let to = filter.relative(&event.paths[1]);
            coalescer.push_rename(&from, &to, |p| filter.is_relevant(p));
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            for path in event.paths.iter().filter(|p| filter.is_relevant(p)) {
                coalescer.push(FileChange::deleted(filter.relative(path)));
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            for path in event.paths.iter().filter(|p| filter.is_relevant(p)) {
                coalescer.push(FileChange::created(filter.relative(path)));
            }
        }
        EventKind::Modify(_) => {
            for path in event.paths.iter().filter(|p| filter.is_relevant(p)) {
                coalescer.push(FileChange::modified(filter.relative(path)));
            }
        }
        EventKind::Remove(_) => {
            for path in event.paths.iter().filter(|p| filter.is_relevant(p)) {
                coalescer.push(FileChange::deleted(filter.relative(path)));
            }
        }
        _ => {}
    }
}

struct Running {
    watcher: RecommendedWatcher,
    shutdown: Arc<Notify>,
    tasks: Vec<JoinHandle<()>>,
}

/// Owns the OS watcher and the two background tasks: the debounce tick and
/// the batch loop that hands settled batches to the orchestrator.
pub struct WatchService {
    orchestrator: Arc<UpdateOrchestrator>,
    coalescer: Arc<ChangeCoalescer>,
    filter: Arc<PathFilter>,
    running: Mutex<Option<Running>>,
}

impl WatchService {
    pub fn new(orchestrator: Arc<UpdateOrchestrator>) -> Result<Self> {
        let coalescer = Arc::new(ChangeCoalescer::new(orchestrator.config().debounce()));
        Self::with_coalescer(orchestrator, coalescer)
    }

    pub fn with_coalescer(
        orchestrator: Arc<UpdateOrchestrator>,
        coalescer: Arc<ChangeCoalescer>,
    ) -> Result<Self> {
        let filter = Arc::new(PathFilter::new(orchestrator.root(), orchestrator.config())?);
        Ok(WatchService {
            orchestrator,
            coalescer,
            filter,
            running: Mutex::new(None),
        })
    }

    pub fn coalescer(&self) -> &Arc<ChangeCoalescer> {
        &self.coalescer
    }

    pub fn filter(&self) -> &Arc<PathFilter> {
        &self.filter
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Start watching the project root recursively.
    pub fn start(&self) -> Result<()> {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.is_some() {
            return Ok(());
        }

        let filter = self.filter.clone();
        let coalescer = self.coalescer.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    debug!("File system event: {:?}", event);
                    route_event(&event, &filter, &coalescer);
                }
                Err(e) => {
                    error!("File system watch error: {}", e);
                }
            }
        })?;
        let root = self.orchestrator.root().path().to_path_buf();
        watcher
            .watch(&root, RecursiveMode::Recursive)
            .with_context(|| format!("failed to watch {}", root.display()))?;

        let (tx, mut rx) = mpsc::channel::<Vec<FileChange>>(BATCH_CHANNEL_CAPACITY);
        let tick = tokio::spawn(self.coalescer.clone().run(tx));

        let orchestrator = self.orchestrator.clone();
        let coalescer = self.coalescer.clone();
        let shutdown = Arc::new(Notify::new());
        let stopping = shutdown.clone();
        let cascade = orchestrator.config().cascade;
        let batches = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = stopping.notified() => break,
                    batch = rx.recv() => match batch {
                        Some(batch) => {
                            orchestrator.process_changes(batch, cascade).await;
                        }
                        None => break,
                    },
                }
            }
            // Batches the tick task already handed over go back to the coalescer.
            rx.close();
            while let Ok(batch) = rx.try_recv() {
                coalescer.requeue(batch);
            }
        });

        *running = Some(Running {
            watcher,
            shutdown,
            tasks: vec![tick, batches],
        });
        self.orchestrator.set_watching(true);
        info!("Started watching project directory: {}", root.display());
        Ok(())
    }

    /// Stop watching. A batch already being applied runs to completion
    /// (call [`UpdateOrchestrator::cancel`] first to cut it short after the
    /// current file). Changes still pending in the coalescer are kept and go
    /// out with the next batch after a restart, or through [`flush`].
    ///
    /// [`flush`]: WatchService::flush
    pub async fn stop(&self) {
        let running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(running) = running {
            drop(running.watcher);
            running.shutdown.notify_one();
            for task in running.tasks {
                if let Err(e) = task.await {
                    warn!("Watch task ended abnormally: {}", e);
                }
            }
            info!("Stopped watching {}", self.orchestrator.root().path().display());
        }
        self.orchestrator.set_watching(false);
    }

    /// Process whatever the coalescer holds right now.
    pub async fn flush(&self) {
        if let Some(batch) = self.coalescer.flush() {
            let cascade = self.orchestrator.config().cascade;
            self.orchestrator.process_changes(batch, cascade).await;
        }
    }
}

impl Drop for WatchService {
    fn drop(&mut self) {
        if let Some(running) = self
            .running
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            for task in running.tasks {
                task.abort();
            }
        }
        self.orchestrator.set_watching(false);
    }
}
