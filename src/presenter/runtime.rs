//! The actor that owns an [`ArticlesReducer`].
//!
//! A single task multiplexes user commands, the connectivity stream, the
//! local-store stream and completions of spawned work with `tokio::select!`,
//! applies each to the reducer and publishes the resulting snapshot. All
//! state mutation happens on that task.

use futures::{FutureExt, StreamExt};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};

use super::reducer::{ArticlesReducer, Effect};
use super::state::{DisplayState, SyncState};
use crate::connectivity::Connectivity;
use crate::storage::Article;
use crate::sync::{ArticlesRepository, SyncError, SyncResult};

const COMMAND_BUFFER: usize = 32;
const EVENT_BUFFER: usize = 64;

enum Command {
    Refresh,
    Delete(String),
    Reload,
    Shutdown,
}

/// Completion of work spawned on the reducer's behalf.
enum TaskEvent {
    Loaded(SyncResult<Vec<Article>>),
    Refreshed(SyncResult<Vec<Article>>),
    Deleted(SyncResult<()>),
}

/// Wraps a future to catch panics and convert them to errors.
///
/// Returns `Err(panic_message)` if the future panics.
async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: std::future::Future<Output = T>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|panic| {
            if let Some(s) = panic.downcast_ref::<&'static str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                "task panicked".to_string()
            }
        })
}

fn panicked(task: &'static str, message: String) -> SyncError {
    tracing::error!(task, error = %message, "Background task panicked");
    SyncError::Unknown(format!("{} task panicked: {}", task, message))
}

/// Start the presenter for one article list.
///
/// Must be called from within a Tokio runtime. The returned handle is the
/// only way to reach the actor; dropping it tears everything down.
pub fn spawn(
    repository: Arc<dyn ArticlesRepository>,
    connectivity: Arc<dyn Connectivity>,
) -> PresenterHandle {
    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (display_tx, display_rx) = watch::channel(DisplayState::default());
    let (sync_tx, sync_rx) = watch::channel(SyncState::default());

    let actor = Actor {
        reducer: ArticlesReducer::new(),
        repository,
        display_tx,
        sync_tx,
        tasks: JoinSet::new(),
    };
    let task = tokio::spawn(actor.run(connectivity, command_rx));

    PresenterHandle {
        commands: command_tx,
        display: display_rx,
        sync: sync_rx,
        task: Some(task),
    }
}

struct Actor {
    reducer: ArticlesReducer,
    repository: Arc<dyn ArticlesRepository>,
    display_tx: watch::Sender<DisplayState>,
    sync_tx: watch::Sender<SyncState>,
    /// Dropping the set aborts whatever is still running.
    tasks: JoinSet<()>,
}

impl Actor {
    async fn run(
        mut self,
        connectivity: Arc<dyn Connectivity>,
        mut commands: mpsc::Receiver<Command>,
    ) {
        let (event_tx, mut events) = mpsc::channel(EVENT_BUFFER);

        let connected = connectivity.is_available().await;
        let effect = self.reducer.on_start(connected);

        // Both observations live exactly as long as this loop.
        let mut connection = connectivity.observe().fuse();
        let mut local = self.repository.observe_articles().fuse();

        self.perform(Some(effect), &event_tx);
        self.publish();

        loop {
            tokio::select! {
                biased;

                command = commands.recv() => {
                    let effect = match command {
                        None | Some(Command::Shutdown) => break,
                        Some(Command::Refresh) => self.reducer.request_refresh(),
                        Some(Command::Delete(id)) => Some(self.reducer.request_delete(&id)),
                        Some(Command::Reload) => Some(Effect::Load),
                    };
                    self.perform(effect, &event_tx);
                }

                Some(event) = events.recv() => match event {
                    TaskEvent::Loaded(result) => self.reducer.on_load_result(result),
                    TaskEvent::Refreshed(result) => self.reducer.on_refresh_result(result),
                    TaskEvent::Deleted(result) => self.reducer.on_delete_result(result),
                },

                Some(state) = connection.next() => {
                    tracing::debug!(?state, "Connectivity changed");
                    let effect = self.reducer.on_connectivity(state);
                    self.perform(effect, &event_tx);
                }

                Some(articles) = local.next() => {
                    self.reducer.on_local_articles(articles);
                }

                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    if let Err(e) = joined {
                        if !e.is_cancelled() {
                            tracing::warn!(error = %e, "Presenter task ended abnormally");
                        }
                    }
                }
            }

            self.publish();
        }

        self.tasks.abort_all();
        tracing::debug!("Presenter stopped");
    }

    fn perform(&mut self, effect: Option<Effect>, event_tx: &mpsc::Sender<TaskEvent>) {
        let Some(effect) = effect else {
            return;
        };
        let repository = Arc::clone(&self.repository);
        let tx = event_tx.clone();

        match effect {
            Effect::Load => {
                self.reducer.on_load_started();
                self.tasks.spawn(async move {
                    let load = async {
                        let mut emissions = repository.get_articles();
                        while let Some(result) = emissions.next().await {
                            if tx.send(TaskEvent::Loaded(result)).await.is_err() {
                                return;
                            }
                        }
                    };
                    if let Err(message) = catch_task_panic(load).await {
                        let event = TaskEvent::Loaded(Err(panicked("load", message)));
                        let _ = tx.send(event).await;
                    }
                });
            }
            Effect::Refresh => {
                self.tasks.spawn(async move {
                    let result = catch_task_panic(repository.refresh_articles())
                        .await
                        .unwrap_or_else(|message| Err(panicked("refresh", message)));
                    let _ = tx.send(TaskEvent::Refreshed(result)).await;
                });
            }
            Effect::Delete(object_id) => {
                self.tasks.spawn(async move {
                    let result = catch_task_panic(repository.delete_article(&object_id))
                        .await
                        .unwrap_or_else(|message| Err(panicked("delete", message)));
                    let _ = tx.send(TaskEvent::Deleted(result)).await;
                });
            }
        }
    }

    fn publish(&self) {
        let display = self.reducer.display();
        self.display_tx.send_if_modified(|current| {
            if current == display {
                return false;
            }
            *current = display.clone();
            true
        });

        let sync = self.reducer.sync_state();
        self.sync_tx.send_if_modified(|current| {
            if current == sync {
                return false;
            }
            *current = sync.clone();
            true
        });
    }
}

/// Owner-side handle to a running presenter.
pub struct PresenterHandle {
    commands: mpsc::Sender<Command>,
    display: watch::Receiver<DisplayState>,
    sync: watch::Receiver<SyncState>,
    task: Option<JoinHandle<()>>,
}

impl PresenterHandle {
    /// Latest published snapshot.
    pub fn state(&self) -> DisplayState {
        self.display.borrow().clone()
    }

    /// Receiver that is notified on every snapshot change.
    pub fn subscribe(&self) -> watch::Receiver<DisplayState> {
        self.display.clone()
    }

    pub fn sync_state(&self) -> SyncState {
        self.sync.borrow().clone()
    }

    pub async fn refresh(&self) {
        self.send(Command::Refresh).await;
    }

    pub async fn delete_article(&self, object_id: &str) {
        self.send(Command::Delete(object_id.to_string())).await;
    }

    /// Run `get_articles()` again.
    pub async fn reload(&self) {
        self.send(Command::Reload).await;
    }

    /// Stop the actor and wait for it. In-flight work is aborted and both
    /// observations are dropped before this returns.
    pub async fn shutdown(mut self) {
        self.send(Command::Shutdown).await;
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Presenter task ended abnormally");
            }
        }
    }

    async fn send(&self, command: Command) {
        if self.commands.send(command).await.is_err() {
            tracing::debug!("Presenter already stopped, command dropped");
        }
    }
}

impl Drop for PresenterHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
