//! Board session: one task driving a board controller.
//!
//! DESIGN
//! ======
//! A session owns its [`BoardController`] inside a single spawned task that
//! selects over the personal feed, the shared feed, the theme, and inbound
//! [`Command`]s. Only that task touches the controller, so no locks are
//! needed. After every event the task publishes a fresh [`BoardView`] on a
//! watch channel for the renderer.
//!
//! LIFECYCLE
//! =========
//! 1. `spawn` subscribes both feeds and merges their current batches
//! 2. Feed changes → `apply_snapshot`; commands → controller mutation
//! 3. `close` (or drop) aborts the task and releases the feeds
//!
//! Writes already handed to the write queue are not cancelled by close.
//!
//! ERROR HANDLING
//! ==============
//! Refused commands are logged and absorbed; the loop keeps running. A feed
//! that closes is logged once and then ignored.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::board::{BoardController, BoardError, ConfirmPrompt};
use crate::config::SessionConfig;
use crate::layout::{BoardView, Viewport};
use crate::note::{NoteKey, NoteSource};
use crate::persistence::spawn_write_worker;
use crate::store::remote::RemoteStore;
use crate::store::{Feed, NoteStore, StoreError};
use crate::theme::{Theme, ThemeStore};

const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// One discrete user interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    AddNote,
    AddSharedNote,
    Delete(NoteKey),
    Recolor(NoteKey),
    EditContent { key: NoteKey, text: String },
    Resize { key: NoteKey, width: i64, height: i64 },
    DragEnd { key: NoteKey, dx_px: f64, dy_px: f64 },
    Viewport(Viewport),
}

impl Command {
    fn kind(&self) -> &'static str {
        match self {
            Self::AddNote => "add",
            Self::AddSharedNote => "add_shared",
            Self::Delete(_) => "delete",
            Self::Recolor(_) => "recolor",
            Self::EditContent { .. } => "edit",
            Self::Resize { .. } => "resize",
            Self::DragEnd { .. } => "drag_end",
            Self::Viewport(_) => "viewport",
        }
    }
}

pub struct BoardSession {
    id: Uuid,
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<BoardView>,
    task: JoinHandle<()>,
}

impl BoardSession {
    /// Subscribe both feeds of `controller`'s user and start the event loop.
    ///
    /// # Errors
    ///
    /// Returns the store error if either subscription fails.
    pub async fn spawn(
        mut controller: BoardController,
        store: &dyn NoteStore,
        prompt: Arc<dyn ConfirmPrompt + Send + Sync>,
        mut theme: watch::Receiver<Theme>,
    ) -> Result<Self, StoreError> {
        let mut personal = store.subscribe(controller.collection_for(NoteSource::Personal)).await?;
        let mut shared = store.subscribe(controller.collection_for(NoteSource::Shared)).await?;

        let batch = personal.borrow_and_update().clone();
        controller.apply_snapshot(NoteSource::Personal, &batch);
        let batch = shared.borrow_and_update().clone();
        controller.apply_snapshot(NoteSource::Shared, &batch);

        let (view_tx, view) = watch::channel(controller.view(*theme.borrow_and_update()));
        let (commands, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let id = Uuid::new_v4();
        info!(session = %id, user = controller.user_id(), "session started");

        let task = tokio::spawn(run(id, controller, Feeds { personal, shared, theme }, rx, prompt, view_tx));
        Ok(Self { id, commands, view, task })
    }

    /// Connect to the store server named in `config` and start a session
    /// for its user.
    ///
    /// # Errors
    ///
    /// Returns the store error if the client cannot be built or the feeds
    /// cannot be subscribed.
    pub async fn connect(
        config: &SessionConfig,
        viewport: Viewport,
        prompt: Arc<dyn ConfirmPrompt + Send + Sync>,
    ) -> Result<Self, StoreError> {
        let store: Arc<dyn NoteStore> = Arc::new(RemoteStore::new(&config.server_url)?);
        let (writes, _worker) = spawn_write_worker(store.clone(), config.write_queue_capacity);
        let controller = BoardController::new(&config.user_id, viewport, writes)?;
        Self::spawn(controller, store.as_ref(), prompt, ThemeStore::global().subscribe()).await
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Queue a command. Returns `false` once the session has stopped.
    pub async fn send(&self, command: Command) -> bool {
        self.commands.send(command).await.is_ok()
    }

    /// Latest rendered board; call `changed()` on it to await updates.
    #[must_use]
    pub fn view(&self) -> watch::Receiver<BoardView> {
        self.view.clone()
    }

    /// Stop the loop and drop the feed subscriptions.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for BoardSession {
    fn drop(&mut self) {
        self.task.abort();
        debug!(session = %self.id, "session closed");
    }
}

// =============================================================================
// EVENT LOOP
// =============================================================================

struct Feeds {
    personal: Feed,
    shared: Feed,
    theme: watch::Receiver<Theme>,
}

async fn run(
    id: Uuid,
    mut controller: BoardController,
    mut feeds: Feeds,
    mut commands: mpsc::Receiver<Command>,
    prompt: Arc<dyn ConfirmPrompt + Send + Sync>,
    view_tx: watch::Sender<BoardView>,
) {
    let mut personal_open = true;
    let mut shared_open = true;
    let mut theme_open = true;

    loop {
        tokio::select! {
            changed = feeds.personal.changed(), if personal_open => {
                if changed.is_err() {
                    warn!(session = %id, "personal feed closed");
                    personal_open = false;
                    continue;
                }
                let batch = feeds.personal.borrow_and_update().clone();
                controller.apply_snapshot(NoteSource::Personal, &batch);
            }
            changed = feeds.shared.changed(), if shared_open => {
                if changed.is_err() {
                    warn!(session = %id, "shared feed closed");
                    shared_open = false;
                    continue;
                }
                let batch = feeds.shared.borrow_and_update().clone();
                controller.apply_snapshot(NoteSource::Shared, &batch);
            }
            changed = feeds.theme.changed(), if theme_open => {
                if changed.is_err() {
                    theme_open = false;
                    continue;
                }
            }
            command = commands.recv() => {
                let Some(command) = command else { break };
                let kind = command.kind();
                if let Err(e) = dispatch(&mut controller, command, prompt.as_ref()) {
                    debug!(session = %id, command = kind, error = %e, "command refused");
                }
            }
        }
        view_tx.send_replace(controller.view(*feeds.theme.borrow_and_update()));
    }
    debug!(session = %id, "session loop stopped");
}

fn dispatch(controller: &mut BoardController, command: Command, prompt: &dyn ConfirmPrompt) -> Result<(), BoardError> {
    match command {
        Command::AddNote => controller.add_note().map(drop),
        Command::AddSharedNote => controller.add_shared_note().map(drop),
        Command::Delete(key) => controller.delete_note(key, prompt).map(drop),
        Command::Recolor(key) => controller.recolor(key).map(drop),
        Command::EditContent { key, text } => controller.edit_content(key, &text),
        Command::Resize { key, width, height } => controller.resize(key, width, height).map(drop),
        Command::DragEnd { key, dx_px, dy_px } => controller.drag_end(key, dx_px, dy_px).map(drop),
        Command::Viewport(viewport) => {
            controller.set_viewport(viewport);
            Ok(())
        }
    }
}
