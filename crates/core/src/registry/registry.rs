//! Task registry implementation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::DownloadConfig;
use super::error::RegistryError;
use super::types::{
    running_percent, DownloadRequest, FailureKind, QueueSummary, Started, Task, TaskError,
    TaskEvent, TaskState,
};
use crate::install::InstallBridge;
use crate::metrics;
use crate::notify::{NotificationBridge, NotificationPayload};
use crate::store::ArtifactStore;
use crate::worker::{DownloadJob, DownloadWorker, Fetcher, StagedArtifact, WorkerProgress};

/// Buffer between a worker and the registry driver.
const PROGRESS_BUFFER: usize = 32;

struct TaskEntry {
    /// Insertion order, used by `query_all`.
    seq: u64,
    task: Task,
    cancel: CancellationToken,
    /// Temporary file of the current attempt.
    temp_path: Option<PathBuf>,
    /// Set while an install call holds an `InstallGuard` for this entry.
    installing: Arc<AtomicBool>,
    started_at: Instant,
}

/// Marks an entry as installing until dropped.
///
/// Dropping the guard also covers an install future that is dropped before
/// the bridge returns, so the task goes back to plain `ReadyToInstall`.
struct InstallGuard(Arc<AtomicBool>);

impl InstallGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Self {
        flag.store(true, Ordering::Release);
        Self(Arc::clone(flag))
    }
}

impl Drop for InstallGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Default)]
struct TaskTable {
    next_seq: u64,
    entries: HashMap<String, TaskEntry>,
}

impl TaskTable {
    /// Entry for `item_id`, only if it still belongs to attempt `task_id`.
    fn attempt_mut(&mut self, item_id: &str, task_id: &str) -> Option<&mut TaskEntry> {
        self.entries
            .get_mut(item_id)
            .filter(|entry| entry.task.task_id == task_id)
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

/// Owns every download task, keyed by item id.
///
/// All transitions happen under one lock, so they are mutually exclusive and
/// a cancellation racing a completion has a single outcome: whichever takes
/// the lock first wins. Cloning is cheap and clones share state.
#[derive(Clone)]
pub struct TaskRegistry {
    config: DownloadConfig,
    store: Arc<ArtifactStore>,
    worker: DownloadWorker,
    notifier: Option<Arc<dyn NotificationBridge>>,
    tasks: Arc<Mutex<TaskTable>>,
    events: broadcast::Sender<TaskEvent>,
    limiter: Option<Arc<Semaphore>>,
}

impl TaskRegistry {
    /// Creates a registry that downloads with `fetcher` into `store`.
    pub fn new(config: DownloadConfig, store: Arc<ArtifactStore>, fetcher: Arc<dyn Fetcher>) -> Self {
        let (events, _) = broadcast::channel(config.update_channel_capacity.max(1));
        let limiter = (config.max_concurrent_downloads > 0)
            .then(|| Arc::new(Semaphore::new(config.max_concurrent_downloads)));
        let worker = DownloadWorker::new(fetcher, store.clone(), config.clone());

        Self {
            config,
            store,
            worker,
            notifier: None,
            tasks: Arc::new(Mutex::new(TaskTable::default())),
            events,
            limiter,
        }
    }

    /// Adds a notification bridge.
    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationBridge>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Receives every task update from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.events.subscribe()
    }

    /// Starts downloading `url` for `item_id`.
    pub async fn start(&self, item_id: &str, url: &str) -> Result<Started, RegistryError> {
        self.start_with(DownloadRequest::new(item_id, url)).await
    }

    /// Starts a download, or joins the active task of the same item.
    ///
    /// A cancelled or failed task is replaced by a fresh one. An item with a
    /// ready or installed artifact must be redownloaded first.
    pub async fn start_with(&self, request: DownloadRequest) -> Result<Started, RegistryError> {
        let DownloadRequest {
            item_id,
            url,
            title,
        } = request;

        let mut table = self.tasks.lock().await;

        if let Some(entry) = table.entries.get(&item_id) {
            let state = entry.task.state;
            if state.is_active() {
                debug!(
                    "Joining active task {} for {} ({})",
                    entry.task.task_id, item_id, state
                );
                return Ok(Started {
                    task: entry.task.clone(),
                    joined: true,
                });
            }
            if state.has_artifact() {
                return Err(RegistryError::invalid(&item_id, "start", state));
            }
        }

        let task_id = Uuid::new_v4().to_string();
        let paths = self.store.allocate(&item_id, &url, &task_id);
        let title = title.unwrap_or_else(|| item_id.clone());
        let task = Task::new(task_id.clone(), item_id.clone(), title, url.clone());
        let cancel = CancellationToken::new();

        let seq = table.next_seq();
        table.entries.insert(
            item_id.clone(),
            TaskEntry {
                seq,
                task,
                cancel: cancel.clone(),
                temp_path: Some(paths.temp_path.clone()),
                installing: Arc::new(AtomicBool::new(false)),
                started_at: Instant::now(),
            },
        );
        metrics::DOWNLOADS_STARTED.inc();
        metrics::ACTIVE_DOWNLOADS.inc();

        info!("Starting download {} for {} from {}", task_id, item_id, url);

        let entry = match table.entries.get_mut(&item_id) {
            Some(entry) => entry,
            None => return Err(RegistryError::TaskNotFound(item_id)),
        };
        self.publish(&entry.task);
        if self.limiter.is_none() {
            self.enter_running(entry);
        }
        let snapshot = entry.task.clone();
        drop(table);

        let job = DownloadJob {
            item_id,
            task_id,
            url,
            paths,
        };
        let registry = self.clone();
        tokio::spawn(async move { registry.drive(job, cancel).await });

        Ok(Started {
            task: snapshot,
            joined: false,
        })
    }

    /// Runs one attempt: waits for a slot, streams, then settles the task.
    async fn drive(self, job: DownloadJob, cancel: CancellationToken) {
        let _permit = match &self.limiter {
            Some(limiter) => {
                let acquired = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return,
                    permit = limiter.clone().acquire_owned() => permit,
                };
                let permit = match acquired {
                    Ok(permit) => permit,
                    Err(_) => {
                        let error = TaskError::new(
                            FailureKind::NetworkError,
                            "download slots are no longer available",
                        );
                        let _ = self.fail(&job.item_id, &job.task_id, error).await;
                        return;
                    }
                };
                if !self.begin_running(&job.item_id, &job.task_id).await {
                    return;
                }
                Some(permit)
            }
            None => None,
        };

        let (progress_tx, mut progress_rx) = mpsc::channel(PROGRESS_BUFFER);
        let run = self.worker.run(job.clone(), progress_tx, cancel.clone());
        tokio::pin!(run);

        let result = loop {
            tokio::select! {
                result = &mut run => break result,
                Some(progress) = progress_rx.recv() => {
                    self.record_progress(&job.item_id, &job.task_id, progress).await;
                }
            }
        };
        while let Ok(progress) = progress_rx.try_recv() {
            self.record_progress(&job.item_id, &job.task_id, progress)
                .await;
        }

        match result {
            Ok(staged) => {
                if let Err(e) = self.mark_ready(&job.item_id, &job.task_id, staged).await {
                    debug!("Download {} for {} not promoted: {}", job.task_id, job.item_id, e);
                }
            }
            Err(e) if e.is_cancelled() => {
                debug!("Worker for {} ({}) stopped", job.item_id, job.task_id);
            }
            Err(e) => {
                let _ = self
                    .fail(&job.item_id, &job.task_id, TaskError::from(&e))
                    .await;
            }
        }
    }

    /// Moves a queued attempt to `Running` once it holds a slot.
    /// Returns false when the attempt was cancelled or replaced meanwhile.
    async fn begin_running(&self, item_id: &str, task_id: &str) -> bool {
        let mut table = self.tasks.lock().await;
        match table.attempt_mut(item_id, task_id) {
            Some(entry) if entry.task.state == TaskState::Queued => {
                self.enter_running(entry);
                true
            }
            _ => false,
        }
    }

    fn enter_running(&self, entry: &mut TaskEntry) {
        entry.task.state = TaskState::Running;
        entry.task.updated_at = Utc::now();
        self.publish(&entry.task);
        self.notify(&entry.task);
    }

    /// Applies a worker progress report.
    ///
    /// Byte counts never decrease and never exceed a known total.
    pub async fn record_progress(&self, item_id: &str, task_id: &str, progress: WorkerProgress) {
        let mut table = self.tasks.lock().await;
        let Some(entry) = table.attempt_mut(item_id, task_id) else {
            return;
        };
        if entry.task.state != TaskState::Running {
            return;
        }

        let task = &mut entry.task;
        let total = progress.bytes_total.or(task.bytes_total);
        let mut received = progress.bytes_received.max(task.bytes_received);
        if let Some(total) = total {
            received = received.min(total);
        }
        let percent = running_percent(received, total);

        if received == task.bytes_received
            && total == task.bytes_total
            && percent == task.progress_percent
        {
            return;
        }

        metrics::DOWNLOAD_BYTES.inc_by(received.saturating_sub(task.bytes_received));
        task.bytes_total = total;
        task.bytes_received = received;
        task.progress_percent = percent;
        task.updated_at = Utc::now();
        self.publish(task);
    }

    /// Promotes a staged artifact and marks the attempt ready.
    ///
    /// If the attempt is no longer running (it was cancelled while the last
    /// bytes were written) the staged file is discarded instead.
    pub async fn mark_ready(
        &self,
        item_id: &str,
        task_id: &str,
        staged: StagedArtifact,
    ) -> Result<Task, RegistryError> {
        let mut table = self.tasks.lock().await;
        let Some(entry) = table.attempt_mut(item_id, task_id) else {
            self.store.discard(&staged.temp_path).await;
            return Err(RegistryError::TaskNotFound(item_id.to_string()));
        };
        if entry.task.state != TaskState::Running {
            let state = entry.task.state;
            self.store.discard(&staged.temp_path).await;
            return Err(RegistryError::invalid(item_id, "mark ready", state));
        }

        if let Err(e) = self
            .store
            .promote(&staged.temp_path, &staged.final_path)
            .await
        {
            self.store.discard(&staged.temp_path).await;
            self.settle_failed(
                entry,
                TaskError::new(FailureKind::StorageError, e.detail()),
            );
            return Err(e.into());
        }

        metrics::DOWNLOAD_BYTES.inc_by(staged.bytes.saturating_sub(entry.task.bytes_received));
        let task = &mut entry.task;
        task.state = TaskState::ReadyToInstall;
        task.bytes_received = staged.bytes;
        task.bytes_total = Some(task.bytes_total.unwrap_or(staged.bytes));
        task.progress_percent = Some(100);
        task.artifact_path = Some(staged.final_path);
        task.updated_at = Utc::now();
        entry.temp_path = None;

        metrics::DOWNLOADS_COMPLETED.inc();
        Self::leave_active(entry, "completed");
        info!(
            "Download {} for {} ready ({} bytes)",
            task_id, item_id, staged.bytes
        );
        self.publish(&entry.task);
        self.notify(&entry.task);
        Ok(entry.task.clone())
    }

    /// Marks an active attempt failed and discards its partial file.
    pub async fn fail(
        &self,
        item_id: &str,
        task_id: &str,
        error: TaskError,
    ) -> Result<Task, RegistryError> {
        let mut table = self.tasks.lock().await;
        let Some(entry) = table.attempt_mut(item_id, task_id) else {
            return Err(RegistryError::TaskNotFound(item_id.to_string()));
        };
        if !entry.task.state.is_active() {
            return Err(RegistryError::invalid(item_id, "fail", entry.task.state));
        }

        let temp_path = entry.temp_path.take();
        self.settle_failed(entry, error);
        let task = entry.task.clone();
        drop(table);

        if let Some(path) = temp_path {
            self.store.discard(&path).await;
        }
        Ok(task)
    }

    fn settle_failed(&self, entry: &mut TaskEntry, error: TaskError) {
        warn!(
            "Download {} for {} failed ({}): {}",
            entry.task.task_id,
            entry.task.item_id,
            error.kind.as_str(),
            error.detail
        );
        metrics::DOWNLOADS_FAILED
            .with_label_values(&[error.kind.as_str()])
            .inc();
        Self::leave_active(entry, "failed");

        entry.temp_path = None;
        entry.task.state = TaskState::Failed;
        entry.task.error = Some(error);
        entry.task.artifact_path = None;
        entry.task.updated_at = Utc::now();
        self.publish(&entry.task);
        self.notify(&entry.task);
    }

    /// Cancels the active task of an item.
    ///
    /// Returns true if a queued or running task was cancelled, false when
    /// there was nothing to cancel.
    pub async fn cancel(&self, item_id: &str) -> Result<bool, RegistryError> {
        let mut table = self.tasks.lock().await;
        let Some(entry) = table.entries.get_mut(item_id) else {
            return Ok(false);
        };
        if !entry.task.state.is_active() {
            return Ok(false);
        }

        let temp_path = self.settle_cancelled(entry);
        drop(table);

        if let Some(path) = temp_path {
            self.store.discard(&path).await;
        }
        Ok(true)
    }

    fn settle_cancelled(&self, entry: &mut TaskEntry) -> Option<PathBuf> {
        entry.cancel.cancel();
        metrics::DOWNLOADS_CANCELLED.inc();
        Self::leave_active(entry, "cancelled");

        entry.task.state = TaskState::Cancelled;
        entry.task.updated_at = Utc::now();
        info!(
            "Cancelled download {} for {}",
            entry.task.task_id, entry.task.item_id
        );
        self.publish(&entry.task);
        self.notify(&entry.task);
        entry.temp_path.take()
    }

    /// Cancels every active task. Returns how many were cancelled.
    pub async fn cancel_all(&self) -> usize {
        let mut table = self.tasks.lock().await;
        let mut partials = Vec::new();
        for entry in table.entries.values_mut() {
            if entry.task.state.is_active() {
                partials.push(self.settle_cancelled(entry));
            }
        }
        drop(table);

        let cancelled = partials.len();
        for path in partials.into_iter().flatten() {
            self.store.discard(&path).await;
        }
        if cancelled > 0 {
            info!("Cancelled {} active downloads", cancelled);
        }
        cancelled
    }

    /// Deletes a ready artifact and forgets the task, so the item can be
    /// downloaded again.
    pub async fn redownload(&self, item_id: &str) -> Result<(), RegistryError> {
        let mut table = self.tasks.lock().await;
        let entry = Self::ready_entry(&mut table, item_id, "redownload")?;

        if let Some(path) = entry.task.artifact_path.clone() {
            self.delete_artifact(&path).await?;
        }
        self.remove(&mut table, item_id);
        Ok(())
    }

    /// Records that the artifact of a ready task was installed.
    ///
    /// With `auto_cleanup` the artifact is deleted and the task removed
    /// (`None` is returned); otherwise the task moves to `CleanupPending`.
    pub async fn acknowledge_installed(
        &self,
        item_id: &str,
        auto_cleanup: bool,
    ) -> Result<Option<Task>, RegistryError> {
        let mut table = self.tasks.lock().await;
        Self::ready_entry(&mut table, item_id, "acknowledge install")?;
        self.settle_installed(&mut table, item_id, auto_cleanup)
            .await
    }

    async fn settle_installed(
        &self,
        table: &mut TaskTable,
        item_id: &str,
        auto_cleanup: bool,
    ) -> Result<Option<Task>, RegistryError> {
        let Some(entry) = table.entries.get_mut(item_id) else {
            return Err(RegistryError::TaskNotFound(item_id.to_string()));
        };

        if auto_cleanup {
            if let Some(path) = entry.task.artifact_path.clone() {
                self.delete_artifact(&path).await?;
            }
            self.remove(table, item_id);
            return Ok(None);
        }

        entry.task.state = TaskState::CleanupPending;
        entry.task.updated_at = Utc::now();
        self.publish(&entry.task);
        Ok(Some(entry.task.clone()))
    }

    /// Ends an installed task, deleting its artifact if asked to.
    ///
    /// The task is removed even when the deletion fails. Returns whether a
    /// file was deleted.
    pub async fn resolve_cleanup(
        &self,
        item_id: &str,
        should_delete: bool,
    ) -> Result<bool, RegistryError> {
        let mut table = self.tasks.lock().await;
        let Some(entry) = table.entries.get(item_id) else {
            return Err(RegistryError::TaskNotFound(item_id.to_string()));
        };
        if entry.task.state != TaskState::CleanupPending {
            return Err(RegistryError::invalid(
                item_id,
                "resolve cleanup",
                entry.task.state,
            ));
        }

        let mut deleted = false;
        if should_delete {
            if let Some(path) = entry.task.artifact_path.clone() {
                match self.delete_artifact(&path).await {
                    Ok(existed) => deleted = existed,
                    Err(e) => warn!("Keeping {} after cleanup of {}: {}", path.display(), item_id, e),
                }
            }
        }
        self.remove(&mut table, item_id);
        Ok(deleted)
    }

    /// Removes a cancelled or failed task.
    pub async fn dismiss(&self, item_id: &str) -> Result<Task, RegistryError> {
        let mut table = self.tasks.lock().await;
        let Some(entry) = table.entries.get(item_id) else {
            return Err(RegistryError::TaskNotFound(item_id.to_string()));
        };
        if !entry.task.state.is_terminal() {
            return Err(RegistryError::invalid(item_id, "dismiss", entry.task.state));
        }
        self.remove(&mut table, item_id)
            .ok_or_else(|| RegistryError::TaskNotFound(item_id.to_string()))
    }

    /// Installs the artifact of a ready task through `bridge`.
    ///
    /// On success the task is acknowledged as installed. On failure it stays
    /// ready and the bridge error is returned. If the returned future is
    /// dropped before the bridge finishes, the task stays ready as well.
    pub async fn install(
        &self,
        item_id: &str,
        bridge: &dyn InstallBridge,
        package_name: Option<&str>,
        auto_cleanup: bool,
    ) -> Result<Option<Task>, RegistryError> {
        let (task_id, path, _guard) = {
            let mut table = self.tasks.lock().await;
            let entry = Self::ready_entry(&mut table, item_id, "install")?;
            let Some(path) = entry.task.artifact_path.clone() else {
                return Err(RegistryError::invalid(item_id, "install", entry.task.state));
            };
            let guard = InstallGuard::acquire(&entry.installing);
            (entry.task.task_id.clone(), path, guard)
        };

        info!("Installing {} via {}", item_id, bridge.name());
        let result = bridge.install(&path, package_name).await;

        if let Err(e) = result {
            metrics::INSTALLS_TOTAL.with_label_values(&["failed"]).inc();
            warn!("Install of {} failed: {}", item_id, e);
            return Err(e.into());
        }
        metrics::INSTALLS_TOTAL.with_label_values(&["success"]).inc();

        // Other exits from ReadyToInstall stay closed while the guard is held.
        let mut table = self.tasks.lock().await;
        if table.attempt_mut(item_id, &task_id).is_none() {
            return Err(RegistryError::TaskNotFound(item_id.to_string()));
        }
        self.settle_installed(&mut table, item_id, auto_cleanup)
            .await
    }

    /// Re-creates a ready task for an artifact found on disk.
    pub async fn restore_ready(
        &self,
        item_id: &str,
        url: &str,
        path: &Path,
    ) -> Result<Task, RegistryError> {
        let size = self.store.file_size(path).await?;

        let mut table = self.tasks.lock().await;
        if let Some(entry) = table.entries.get(item_id) {
            if entry.task.state.is_active() || entry.task.state.has_artifact() {
                return Err(RegistryError::invalid(item_id, "restore", entry.task.state));
            }
        }

        let mut task = Task::new(
            Uuid::new_v4().to_string(),
            item_id.to_string(),
            item_id.to_string(),
            url.to_string(),
        );
        task.state = TaskState::ReadyToInstall;
        task.bytes_total = Some(size);
        task.bytes_received = size;
        task.progress_percent = Some(100);
        task.artifact_path = Some(path.to_path_buf());

        let seq = table.next_seq();
        table.entries.insert(
            item_id.to_string(),
            TaskEntry {
                seq,
                task: task.clone(),
                cancel: CancellationToken::new(),
                temp_path: None,
                installing: Arc::new(AtomicBool::new(false)),
                started_at: Instant::now(),
            },
        );
        debug!("Restored ready artifact {} for {}", path.display(), item_id);
        self.publish(&task);
        Ok(task)
    }

    /// Snapshot of the task for an item.
    pub async fn query(&self, item_id: &str) -> Option<Task> {
        let table = self.tasks.lock().await;
        table.entries.get(item_id).map(|entry| entry.task.clone())
    }

    /// Snapshots of all tasks in insertion order.
    pub async fn query_all(&self) -> Vec<Task> {
        let table = self.tasks.lock().await;
        let mut entries: Vec<&TaskEntry> = table.entries.values().collect();
        entries.sort_by_key(|entry| entry.seq);
        entries.into_iter().map(|entry| entry.task.clone()).collect()
    }

    /// Task counts per state group.
    pub async fn summary(&self) -> QueueSummary {
        let table = self.tasks.lock().await;
        QueueSummary::from_tasks(table.entries.values().map(|entry| &entry.task))
    }

    fn ready_entry<'a>(
        table: &'a mut TaskTable,
        item_id: &str,
        operation: &'static str,
    ) -> Result<&'a mut TaskEntry, RegistryError> {
        let Some(entry) = table.entries.get_mut(item_id) else {
            return Err(RegistryError::TaskNotFound(item_id.to_string()));
        };
        if entry.task.state != TaskState::ReadyToInstall {
            return Err(RegistryError::invalid(item_id, operation, entry.task.state));
        }
        if entry.installing.load(Ordering::Acquire) {
            return Err(RegistryError::InstallInProgress(item_id.to_string()));
        }
        Ok(entry)
    }

    async fn delete_artifact(&self, path: &Path) -> Result<bool, RegistryError> {
        let existed = self.store.delete(path).await?;
        if existed {
            metrics::ARTIFACTS_DELETED.inc();
        }
        Ok(existed)
    }

    fn remove(&self, table: &mut TaskTable, item_id: &str) -> Option<Task> {
        let entry = table.entries.remove(item_id)?;
        debug!("Removed task {} for {}", entry.task.task_id, item_id);
        let _ = self.events.send(TaskEvent::Removed {
            item_id: entry.task.item_id.clone(),
            task_id: entry.task.task_id.clone(),
        });
        Some(entry.task)
    }

    fn leave_active(entry: &TaskEntry, result: &str) {
        metrics::ACTIVE_DOWNLOADS.dec();
        metrics::DOWNLOAD_DURATION
            .with_label_values(&[result])
            .observe(entry.started_at.elapsed().as_secs_f64());
    }

    fn publish(&self, task: &Task) {
        // No subscribers is not an error.
        let _ = self.events.send(task.to_event());
    }

    fn notify(&self, task: &Task) {
        if let Some(notifier) = &self.notifier {
            notifier.notify(NotificationPayload::from_task(task));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockFetcher, MockInstaller, MockResponse, RecordingNotifier};
    use std::time::Duration;
    use tempfile::TempDir;

    const URL: &str = "https://downloads.test/app.apk";

    struct Harness {
        registry: TaskRegistry,
        fetcher: Arc<MockFetcher>,
        notifier: Arc<RecordingNotifier>,
        _dir: TempDir,
    }

    fn harness_with(config: DownloadConfig) -> Harness {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ArtifactStore::new(dir.path()));
        let fetcher = Arc::new(MockFetcher::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let registry = TaskRegistry::new(config, store, fetcher.clone())
            .with_notifier(notifier.clone());
        Harness {
            registry,
            fetcher,
            notifier,
            _dir: dir,
        }
    }

    fn harness() -> Harness {
        harness_with(DownloadConfig::default())
    }

    async fn wait_for_state(registry: &TaskRegistry, item_id: &str, state: TaskState) -> Task {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(task) = registry.query(item_id).await {
                    if task.state == state {
                        return task;
                    }
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("task did not reach expected state")
    }

    #[tokio::test]
    async fn test_start_downloads_to_ready() {
        let h = harness();
        h.fetcher.set_response(URL, MockResponse::sized(2_048)).await;

        let started = h.registry.start("app", URL).await.unwrap();
        assert!(!started.joined);
        assert_eq!(started.task.state, TaskState::Running);

        let task = wait_for_state(&h.registry, "app", TaskState::ReadyToInstall).await;
        assert_eq!(task.progress_percent, Some(100));
        assert_eq!(task.bytes_received, 2_048);
        assert_eq!(task.bytes_total, Some(2_048));
        let path = task.artifact_path.unwrap();
        assert_eq!(tokio::fs::metadata(&path).await.unwrap().len(), 2_048);

        let states = h.notifier.states_for("app");
        assert_eq!(states, vec![TaskState::Running, TaskState::ReadyToInstall]);
    }

    #[tokio::test]
    async fn test_start_joins_active_task() {
        let h = harness();
        let gate = Arc::new(Semaphore::new(0));
        h.fetcher
            .set_response(URL, MockResponse::sized(100).gated(gate.clone()))
            .await;

        let first = h.registry.start("app", URL).await.unwrap();
        let second = h.registry.start("app", URL).await.unwrap();
        assert!(second.joined);
        assert_eq!(first.task.task_id, second.task.task_id);

        gate.add_permits(1_000);
        wait_for_state(&h.registry, "app", TaskState::ReadyToInstall).await;
        assert_eq!(h.fetcher.fetch_count(URL).await, 1);
    }

    #[tokio::test]
    async fn test_start_rejected_while_ready() {
        let h = harness();
        h.fetcher.set_response(URL, MockResponse::sized(10)).await;
        h.registry.start("app", URL).await.unwrap();
        wait_for_state(&h.registry, "app", TaskState::ReadyToInstall).await;

        let err = h.registry.start("app", URL).await.unwrap_err();
        assert!(matches!(
            err,
            RegistryError::InvalidStateTransition {
                state: TaskState::ReadyToInstall,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_cancel_running_task() {
        let h = harness();
        let gate = Arc::new(Semaphore::new(0));
        h.fetcher
            .set_response(URL, MockResponse::sized(100).gated(gate))
            .await;

        let started = h.registry.start("app", URL).await.unwrap();
        assert!(h.registry.cancel("app").await.unwrap());

        let task = h.registry.query("app").await.unwrap();
        assert_eq!(task.state, TaskState::Cancelled);
        assert!(task.artifact_path.is_none());
        assert!(task.error.is_none());

        // Second cancel is a no-op.
        assert!(!h.registry.cancel("app").await.unwrap());
        assert!(!h.registry.cancel("unknown").await.unwrap());

        let paths = h
            .registry
            .store()
            .allocate("app", URL, &started.task.task_id);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!paths.final_path.exists());
        assert!(!paths.temp_path.exists());
    }

    #[tokio::test]
    async fn test_cancel_ready_task_is_noop() {
        let h = harness();
        h.fetcher.set_response(URL, MockResponse::sized(10)).await;
        h.registry.start("app", URL).await.unwrap();
        wait_for_state(&h.registry, "app", TaskState::ReadyToInstall).await;

        assert!(!h.registry.cancel("app").await.unwrap());
        let task = h.registry.query("app").await.unwrap();
        assert_eq!(task.state, TaskState::ReadyToInstall);
        assert!(task.artifact_path.unwrap().exists());
    }

    #[tokio::test]
    async fn test_mark_ready_after_cancel_discards() {
        let h = harness();
        let gate = Arc::new(Semaphore::new(0));
        h.fetcher
            .set_response(URL, MockResponse::sized(10).gated(gate))
            .await;
        let started = h.registry.start("app", URL).await.unwrap();
        h.registry.cancel("app").await.unwrap();

        // A worker that finished just as the cancel landed.
        let paths = h
            .registry
            .store()
            .allocate("app", URL, &started.task.task_id);
        h.registry.store().ensure_root().await.unwrap();
        tokio::fs::write(&paths.temp_path, b"0123456789").await.unwrap();
        let staged = StagedArtifact {
            temp_path: paths.temp_path.clone(),
            final_path: paths.final_path.clone(),
            bytes: 10,
        };

        let err = h
            .registry
            .mark_ready("app", &started.task.task_id, staged)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidStateTransition { .. }));
        assert!(!paths.temp_path.exists());
        assert!(!paths.final_path.exists());
        assert_eq!(
            h.registry.query("app").await.unwrap().state,
            TaskState::Cancelled
        );
    }

    #[tokio::test]
    async fn test_failure_is_recorded() {
        let h = harness();
        h.fetcher.set_response(URL, MockResponse::status(503)).await;

        h.registry.start("app", URL).await.unwrap();
        let task = wait_for_state(&h.registry, "app", TaskState::Failed).await;
        let error = task.error.unwrap();
        assert_eq!(error.kind, FailureKind::ServerError);
        assert!(error.detail.contains("503"));
        assert!(task.artifact_path.is_none());

        // A failed task is replaced by a fresh start.
        h.fetcher.set_response(URL, MockResponse::sized(5)).await;
        let restarted = h.registry.start("app", URL).await.unwrap();
        assert!(!restarted.joined);
        assert_ne!(restarted.task.task_id, task.task_id);
        wait_for_state(&h.registry, "app", TaskState::ReadyToInstall).await;
    }

    #[tokio::test]
    async fn test_redownload_removes_artifact() {
        let h = harness();
        h.fetcher.set_response(URL, MockResponse::sized(10)).await;
        h.registry.start("app", URL).await.unwrap();
        let task = wait_for_state(&h.registry, "app", TaskState::ReadyToInstall).await;
        let path = task.artifact_path.unwrap();

        h.registry.redownload("app").await.unwrap();
        assert!(h.registry.query("app").await.is_none());
        assert!(!path.exists());

        let err = h.registry.redownload("app").await.unwrap_err();
        assert!(matches!(err, RegistryError::TaskNotFound(_)));
    }

    #[tokio::test]
    async fn test_acknowledge_with_auto_cleanup() {
        let h = harness();
        h.fetcher.set_response(URL, MockResponse::sized(10)).await;
        h.registry.start("app", URL).await.unwrap();
        let task = wait_for_state(&h.registry, "app", TaskState::ReadyToInstall).await;

        let result = h.registry.acknowledge_installed("app", true).await.unwrap();
        assert!(result.is_none());
        assert!(h.registry.query("app").await.is_none());
        assert!(!task.artifact_path.unwrap().exists());
    }

    #[tokio::test]
    async fn test_cleanup_keep_file() {
        let h = harness();
        h.fetcher.set_response(URL, MockResponse::sized(10)).await;
        h.registry.start("app", URL).await.unwrap();
        wait_for_state(&h.registry, "app", TaskState::ReadyToInstall).await;

        let task = h
            .registry
            .acknowledge_installed("app", false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(task.state, TaskState::CleanupPending);
        let path = task.artifact_path.clone().unwrap();

        assert!(!h.registry.resolve_cleanup("app", false).await.unwrap());
        assert!(h.registry.query("app").await.is_none());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_invalid_transitions_leave_state_unchanged() {
        let h = harness();
        let gate = Arc::new(Semaphore::new(0));
        h.fetcher
            .set_response(URL, MockResponse::sized(10).gated(gate))
            .await;
        h.registry.start("app", URL).await.unwrap();

        assert!(matches!(
            h.registry.redownload("app").await,
            Err(RegistryError::InvalidStateTransition { .. })
        ));
        assert!(matches!(
            h.registry.acknowledge_installed("app", true).await,
            Err(RegistryError::InvalidStateTransition { .. })
        ));
        assert!(matches!(
            h.registry.resolve_cleanup("app", true).await,
            Err(RegistryError::InvalidStateTransition { .. })
        ));
        assert!(matches!(
            h.registry.dismiss("app").await,
            Err(RegistryError::InvalidStateTransition { .. })
        ));
        assert_eq!(
            h.registry.query("app").await.unwrap().state,
            TaskState::Running
        );
        h.registry.cancel("app").await.unwrap();
    }

    #[tokio::test]
    async fn test_dismiss_cancelled_task() {
        let h = harness();
        let gate = Arc::new(Semaphore::new(0));
        h.fetcher
            .set_response(URL, MockResponse::sized(10).gated(gate))
            .await;
        h.registry.start("app", URL).await.unwrap();
        h.registry.cancel("app").await.unwrap();

        let mut events = h.registry.subscribe();
        let task = h.registry.dismiss("app").await.unwrap();
        assert_eq!(task.state, TaskState::Cancelled);
        assert!(h.registry.query("app").await.is_none());
        assert!(matches!(
            events.recv().await.unwrap(),
            TaskEvent::Removed { .. }
        ));
        assert!(matches!(
            h.registry.dismiss("app").await,
            Err(RegistryError::TaskNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_install_success_and_failure() {
        let h = harness();
        h.fetcher.set_response(URL, MockResponse::sized(10)).await;
        h.registry.start("app", URL).await.unwrap();
        wait_for_state(&h.registry, "app", TaskState::ReadyToInstall).await;

        let installer = MockInstaller::new();
        installer.fail_next("INSTALL_FAILED_VERSION_DOWNGRADE").await;
        let err = h
            .registry
            .install("app", &installer, Some("com.example.app"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Install(_)));
        assert_eq!(
            h.registry.query("app").await.unwrap().state,
            TaskState::ReadyToInstall
        );

        let task = h
            .registry
            .install("app", &installer, Some("com.example.app"), false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(task.state, TaskState::CleanupPending);

        let installs = installer.recorded_installs().await;
        assert_eq!(installs.len(), 2);
        assert_eq!(installs[1].package_name.as_deref(), Some("com.example.app"));
    }

    #[tokio::test]
    async fn test_dropped_install_leaves_task_ready() {
        let h = harness();
        h.fetcher.set_response(URL, MockResponse::sized(10)).await;
        h.registry.start("app", URL).await.unwrap();
        wait_for_state(&h.registry, "app", TaskState::ReadyToInstall).await;

        let installer = MockInstaller::new();
        installer.hold_installs(Arc::new(Semaphore::new(0))).await;
        let abandoned = tokio::time::timeout(
            Duration::from_millis(50),
            h.registry.install("app", &installer, None, false),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(installer.attempts(), 1);

        let task = h
            .registry
            .acknowledge_installed("app", false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(task.state, TaskState::CleanupPending);
        assert!(h.registry.resolve_cleanup("app", true).await.unwrap());
        assert!(h.registry.query("app").await.is_none());
    }

    #[tokio::test]
    async fn test_install_in_flight_blocks_other_exits() {
        let h = harness();
        h.fetcher.set_response(URL, MockResponse::sized(10)).await;
        h.registry.start("app", URL).await.unwrap();
        let ready = wait_for_state(&h.registry, "app", TaskState::ReadyToInstall).await;
        let path = ready.artifact_path.unwrap();

        let installer = Arc::new(MockInstaller::new());
        let gate = Arc::new(Semaphore::new(0));
        installer.hold_installs(gate.clone()).await;
        let install = tokio::spawn({
            let registry = h.registry.clone();
            let installer = installer.clone();
            async move { registry.install("app", installer.as_ref(), None, false).await }
        });
        while installer.attempts() == 0 {
            tokio::task::yield_now().await;
        }

        assert!(matches!(
            h.registry.redownload("app").await,
            Err(RegistryError::InstallInProgress(_))
        ));
        assert!(matches!(
            h.registry.acknowledge_installed("app", true).await,
            Err(RegistryError::InstallInProgress(_))
        ));
        assert!(!h.registry.cancel("app").await.unwrap());

        gate.add_permits(1);
        let task = install.await.unwrap().unwrap().unwrap();
        assert_eq!(task.state, TaskState::CleanupPending);
        assert!(path.exists());

        // Once settled, only CleanupPending rules apply.
        assert!(matches!(
            h.registry.redownload("app").await,
            Err(RegistryError::InvalidStateTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_restore_ready() {
        let h = harness();
        h.registry.store().ensure_root().await.unwrap();
        let paths = h.registry.store().allocate("app", URL, "old");
        tokio::fs::write(&paths.final_path, vec![7u8; 64]).await.unwrap();

        let task = h
            .registry
            .restore_ready("app", URL, &paths.final_path)
            .await
            .unwrap();
        assert_eq!(task.state, TaskState::ReadyToInstall);
        assert_eq!(task.bytes_total, Some(64));
        assert_eq!(task.progress_percent, Some(100));

        assert!(matches!(
            h.registry.restore_ready("app", URL, &paths.final_path).await,
            Err(RegistryError::InvalidStateTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_concurrency_cap_keeps_tasks_queued() {
        let h = harness_with(DownloadConfig::default().with_max_concurrent(1));
        let gate = Arc::new(Semaphore::new(0));
        let other = "https://downloads.test/other.apk";
        h.fetcher
            .set_response(URL, MockResponse::sized(10).gated(gate.clone()))
            .await;
        h.fetcher.set_response(other, MockResponse::sized(10)).await;

        h.registry.start("app", URL).await.unwrap();
        wait_for_state(&h.registry, "app", TaskState::Running).await;
        let queued = h.registry.start("other", other).await.unwrap();
        assert_eq!(queued.task.state, TaskState::Queued);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            h.registry.query("other").await.unwrap().state,
            TaskState::Queued
        );
        assert_eq!(h.registry.summary().await.active, 2);

        gate.add_permits(1_000);
        wait_for_state(&h.registry, "app", TaskState::ReadyToInstall).await;
        wait_for_state(&h.registry, "other", TaskState::ReadyToInstall).await;
    }

    #[tokio::test]
    async fn test_cancel_queued_task() {
        let h = harness_with(DownloadConfig::default().with_max_concurrent(1));
        let gate = Arc::new(Semaphore::new(0));
        let other = "https://downloads.test/other.apk";
        h.fetcher
            .set_response(URL, MockResponse::sized(10).gated(gate))
            .await;
        h.fetcher.set_response(other, MockResponse::sized(10)).await;

        h.registry.start("app", URL).await.unwrap();
        wait_for_state(&h.registry, "app", TaskState::Running).await;
        h.registry.start("other", other).await.unwrap();
        assert!(h.registry.cancel("other").await.unwrap());
        assert_eq!(
            h.registry.query("other").await.unwrap().state,
            TaskState::Cancelled
        );
        assert_eq!(h.fetcher.fetch_count(other).await, 0);
        h.registry.cancel_all().await;
    }

    #[tokio::test]
    async fn test_query_all_in_insertion_order() {
        let h = harness();
        for (i, item) in ["c", "a", "b"].iter().enumerate() {
            let url = format!("https://downloads.test/{}.apk", i);
            h.fetcher.set_response(&url, MockResponse::sized(1)).await;
            h.registry.start(item, &url).await.unwrap();
        }
        let ids: Vec<String> = h
            .registry
            .query_all()
            .await
            .into_iter()
            .map(|t| t.item_id)
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_cancel_all() {
        let h = harness();
        let gate = Arc::new(Semaphore::new(0));
        for item in ["a", "b"] {
            let url = format!("https://downloads.test/{}.apk", item);
            h.fetcher
                .set_response(&url, MockResponse::sized(10).gated(gate.clone()))
                .await;
            h.registry.start(item, &url).await.unwrap();
        }

        assert_eq!(h.registry.cancel_all().await, 2);
        assert_eq!(h.registry.summary().await.cancelled, 2);
        assert_eq!(h.registry.cancel_all().await, 0);
    }
}
