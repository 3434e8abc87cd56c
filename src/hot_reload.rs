use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use notify_debouncer_full::{
    new_debouncer, DebouncedEvent,
    notify::{RecursiveMode, Watcher, Error as NotifyError},
};
use tracing::{debug, error, info};

use crate::content_loader::reload_content;
use crate::state::{AppState, RefreshBroadcaster};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(tx): State<RefreshBroadcaster>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, tx))
}

async fn handle_socket(mut socket: WebSocket, tx: RefreshBroadcaster) {
    let mut rx = tx.subscribe();

    if rx.recv().await.is_ok() {
        if socket.send(Message::Text("reload".to_string().into())).await.is_err() {
            debug!("Client disconnected before reload message could be sent");
        }
    }
}

fn is_relevant(event: &DebouncedEvent) -> bool {
    let is_relevant_kind = event.kind.is_modify()
        || event.kind.is_create()
        || event.kind.is_remove();

    if !is_relevant_kind {
        return false;
    }

    // Emacs lock files and `~` backups
    let is_temp_file = event.event.paths.iter().any(|path| {
        path.file_name()
            .and_then(|name| name.to_str())
            .map_or(false, |s| s.starts_with(".#") || s.ends_with('~'))
    });

    !is_temp_file
}

/// Directories hot reload watches: the template directory, plus the post
/// directory when posts are read from disk.
pub fn watch_dirs(app_state: &AppState) -> Vec<PathBuf> {
    let mut dirs = vec![app_state.config.content_dir.clone()];
    if let Some(dir) = app_state.source.local_dir() {
        if !dir.starts_with(&app_state.config.content_dir) {
            dirs.push(dir);
        }
    }
    dirs
}

pub fn start_content_watcher(tx: RefreshBroadcaster, app_state: Arc<AppState>) {
    info!("Starting content watcher for hot-reload...");
    let dirs = watch_dirs(&app_state);
    tokio::spawn(async move {
        let (watcher_tx, mut watcher_rx) = tokio::sync::mpsc::channel(1);

        let debouncer = new_debouncer(Duration::from_millis(200), None, move |res: Result<Vec<DebouncedEvent>, Vec<NotifyError>>| {
            match res {
                Ok(events) => {
                    let relevant_events: Vec<&DebouncedEvent> = events.iter().filter(|event| is_relevant(event)).collect();
                    if !relevant_events.is_empty() {
                        debug!("Relevant file change detected: {:?}", relevant_events.iter().flat_map(|e| &e.event.paths).map(|p| p.display()).collect::<Vec<_>>());
                        if let Err(e) = watcher_tx.blocking_send(()) {
                            error!("Failed to send watcher event: {}", e);
                        }
                    }
                }
                Err(errors) => {
                    for e in errors {
                        error!("Watcher error: {}", e);
                    }
                }
            }
        });

        let mut debouncer = match debouncer {
            Ok(debouncer) => debouncer,
            Err(e) => {
                error!("Failed to create debouncer: {}", e);
                return;
            }
        };

        for dir in &dirs {
            match debouncer.watcher().watch(dir, RecursiveMode::Recursive) {
                Ok(()) => info!(dir = %dir.display(), "watching for changes"),
                Err(e) => error!(dir = %dir.display(), "Failed to watch directory: {}", e),
            }
        }

        // Keep the debouncer alive and wait for events
        while watcher_rx.recv().await.is_some() {
            info!("Content change detected, reloading content and sending signal...");

            reload_content(&app_state).await;

            // No subscribers just means no open browser tabs.
            if tx.send(()).is_err() {
                debug!("No websocket clients to notify");
            }
        }
    });
}
