use std::time::Duration;

use serde_json::json;

use super::*;
use crate::consts::CELL_SIZE_PX;
use crate::layout::LayoutMode;
use crate::note::{Note, NoteColor};
use crate::store::CollectionPath;
use crate::store::memory::MemoryStore;

fn confirm_all(_: &Note) -> bool {
    true
}

fn desktop() -> Viewport {
    Viewport::new(CELL_SIZE_PX * 4.0, 1200.0)
}

async fn start(store: &Arc<MemoryStore>, user: &str, theme: &ThemeStore) -> BoardSession {
    let (writes, _worker) = spawn_write_worker(store.clone(), 64);
    let controller = BoardController::new(user, desktop(), writes).unwrap();
    BoardSession::spawn(controller, store.as_ref(), Arc::new(confirm_all), theme.subscribe())
        .await
        .unwrap()
}

async fn wait_view<F>(view: &mut watch::Receiver<BoardView>, pred: F) -> BoardView
where
    F: FnMut(&BoardView) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), view.wait_for(pred))
        .await
        .expect("view condition not reached in time")
        .expect("session stopped")
        .clone()
}

async fn wait_store<F, Fut>(mut probe: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        while !probe().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("store condition not reached in time");
}

#[tokio::test]
async fn existing_records_are_merged_on_spawn() {
    let store = Arc::new(MemoryStore::new());
    let personal = CollectionPath::personal("alice").unwrap();
    store
        .insert_raw(&personal, 1, json!({"id": 1, "content": "hi", "color": "green", "row": 2, "col": 1}))
        .await;

    let theme = ThemeStore::default();
    let session = start(&store, "alice", &theme).await;
    let view = session.view().borrow().clone();
    assert_eq!(view.notes.len(), 1);
    assert_eq!((view.notes[0].row, view.notes[0].col), (2, 1));
    assert_eq!(view.notes[0].content, "hi");
}

#[tokio::test]
async fn add_note_renders_and_persists() {
    let store = Arc::new(MemoryStore::new());
    let theme = ThemeStore::default();
    let session = start(&store, "alice", &theme).await;
    let mut view = session.view();

    assert!(session.send(Command::AddNote).await);
    let rendered = wait_view(&mut view, |v| v.notes.len() == 1).await;
    let key = rendered.notes[0].key;

    let personal = CollectionPath::personal("alice").unwrap();
    wait_store(|| {
        let store = store.clone();
        let personal = personal.clone();
        async move { store.get(&personal, key.id).await.is_some() }
    })
    .await;

    // The echo of the create must not duplicate the note.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(session.view().borrow().notes.len(), 1);
}

#[tokio::test]
async fn shared_note_lifecycle_across_two_users() {
    let store = Arc::new(MemoryStore::new());
    let theme = ThemeStore::default();
    let alice = start(&store, "alice", &theme).await;
    let bob = start(&store, "bob", &theme).await;
    let mut alice_view = alice.view();
    let mut bob_view = bob.view();

    assert!(alice.send(Command::AddSharedNote).await);
    let key = wait_view(&mut alice_view, |v| v.notes.len() == 1).await.notes[0].key;

    // Bob sees it and gets his own placement.
    wait_view(&mut bob_view, |v| v.notes.iter().any(|n| n.key == key)).await;
    let shared = CollectionPath::shared();
    wait_store(|| {
        let store = store.clone();
        let shared = shared.clone();
        async move {
            store
                .get(&shared, key.id)
                .await
                .is_some_and(|doc| doc["placements"]["alice"].is_object() && doc["placements"]["bob"].is_object())
        }
    })
    .await;

    // Bob removes it: only his placement goes, Alice keeps the note.
    assert!(bob.send(Command::Delete(key)).await);
    wait_view(&mut bob_view, |v| v.notes.is_empty()).await;
    wait_store(|| {
        let store = store.clone();
        let shared = shared.clone();
        async move {
            store
                .get(&shared, key.id)
                .await
                .is_some_and(|doc| doc["placements"].get("bob").is_none() && doc["dismissedBy"] == json!(["bob"]))
        }
    })
    .await;
    assert_eq!(alice.view().borrow().notes.len(), 1);

    // Alice is the creator: her delete removes it for everyone.
    assert!(alice.send(Command::Delete(key)).await);
    wait_store(|| {
        let store = store.clone();
        let shared = shared.clone();
        async move { store.get(&shared, key.id).await.is_none() }
    })
    .await;
    wait_view(&mut alice_view, |v| v.notes.is_empty()).await;
}

#[tokio::test]
async fn theme_change_rerenders_fill() {
    let store = Arc::new(MemoryStore::new());
    let theme = ThemeStore::new(Theme::Light);
    let session = start(&store, "alice", &theme).await;
    let mut view = session.view();

    assert!(session.send(Command::AddNote).await);
    wait_view(&mut view, |v| v.notes.len() == 1).await;

    theme.set(Theme::Dark);
    let dark = NoteColor::Yellow.hex(Theme::Dark);
    wait_view(&mut view, |v| v.notes.first().is_some_and(|n| n.fill == dark)).await;
}

#[tokio::test]
async fn refused_command_keeps_session_running() {
    let store = Arc::new(MemoryStore::new());
    let theme = ThemeStore::default();
    let session = start(&store, "alice", &theme).await;
    let mut view = session.view();

    assert!(session.send(Command::AddNote).await);
    let key = wait_view(&mut view, |v| v.notes.len() == 1).await.notes[0].key;

    assert!(session.send(Command::Viewport(Viewport::new(CELL_SIZE_PX, 400.0))).await);
    wait_view(&mut view, |v| v.mode == LayoutMode::Stacked).await;

    assert!(session.send(Command::DragEnd { key, dx_px: CELL_SIZE_PX, dy_px: 0.0 }).await);
    assert!(session.send(Command::AddNote).await);
    let rendered = wait_view(&mut view, |v| v.notes.len() == 2).await;
    assert!(rendered.notes.iter().all(|n| !n.draggable));
}

#[tokio::test]
async fn close_stops_the_loop() {
    let store = Arc::new(MemoryStore::new());
    let theme = ThemeStore::default();
    let session = start(&store, "alice", &theme).await;
    let mut view = session.view();

    session.close();
    tokio::time::timeout(Duration::from_secs(2), async {
        while view.changed().await.is_ok() {}
    })
    .await
    .expect("view sender was not dropped");
}
