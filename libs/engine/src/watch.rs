use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::RecorderError;
use crate::recorder::Recorder;

// ═══════════════════════════════════════════════════════════════
//  Model watcher — external edits of model.json → reload
// ═══════════════════════════════════════════════════════════════

/// Следить за `model.json` и перезагружать модель при внешних изменениях.
///
/// Наблюдается родительская директория (редакторы часто заменяют файл
/// через rename), события фильтруются по имени файла модели. Пачка
/// событий внутри `debounce` схлопывается в один reload.
pub fn spawn_model_watcher(
    recorder: Arc<Recorder>,
    debounce: Duration,
    token: CancellationToken,
) -> Result<JoinHandle<()>, RecorderError> {
    let model_path = recorder.store().path().to_path_buf();
    let watch_dir = model_path
        .parent()
        .map(Path::to_path_buf)
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from("."));
    let model_name = model_path.file_name().map(|n| n.to_os_string());

    let (tx, mut rx) = mpsc::channel::<()>(1);
    let mut debouncer = new_debouncer(debounce, move |result: DebounceEventResult| match result {
        Ok(events) => {
            if events.iter().any(|e| e.path.file_name() == model_name.as_deref()) {
                // Канал на один слот: повторные изменения до reload'а схлопываются.
                let _ = tx.try_send(());
            }
        }
        Err(e) => tracing::warn!(error = ?e, "model watch error"),
    })
    .map_err(|e| RecorderError::Watch(format!("create watcher: {e}")))?;

    debouncer
        .watcher()
        .watch(&watch_dir, RecursiveMode::NonRecursive)
        .map_err(|e| RecorderError::Watch(format!("watch {}: {e}", watch_dir.display())))?;

    tracing::info!(path = %model_path.display(), "watching model document");

    Ok(tokio::spawn(async move {
        let _debouncer = debouncer;
        loop {
            tokio::select! {
                changed = rx.recv() => {
                    if changed.is_none() {
                        break;
                    }
                    tracing::info!("model document changed");
                    if let Err(e) = recorder.reload_model().await {
                        tracing::error!(error = %e, "model reload failed, keeping previous model");
                    }
                }
                _ = token.cancelled() => break,
            }
        }
        tracing::info!("model watcher stopped");
    }))
}
