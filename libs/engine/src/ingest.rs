use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;

use recorder_api::{now_ms, RecordKey};

use crate::error::RecorderError;
use crate::layout::Layout;
use crate::reconciler::Reconciler;

// ═══════════════════════════════════════════════════════════════
//  Ingestor — inbound message → record file
// ═══════════════════════════════════════════════════════════════

/// Append-only запись входящих сообщений.
///
/// Retention здесь не вызывается — вытеснением занимается отдельный таймер.
pub struct Ingestor {
    layout: Layout,
    reconciler: Arc<Reconciler>,
}

impl Ingestor {
    pub fn new(layout: Layout, reconciler: Arc<Reconciler>) -> Self {
        Self { layout, reconciler }
    }

    /// Сохранить сообщение, пришедшее на `topic`.
    ///
    /// `Ok(None)` — подписки на topic нет (гонка с отпиской), сообщение отброшено.
    pub async fn ingest(&self, topic: &str, payload: &[u8]) -> Result<Option<RecordKey>, RecorderError> {
        let Some(source) = self.reconciler.lookup(topic).await else {
            tracing::warn!(topic = %topic, "no subscription, message discarded");
            return Ok(None);
        };

        let dir = self.layout.source_dir(&source);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| RecorderError::io(format!("mkdir {}", dir.display()), e))?;

        let key = write_record(&dir, now_ms(), payload).await?;
        tracing::debug!(topic = %topic, record = %key, bytes = payload.len(), "record written");
        Ok(Some(key))
    }
}

static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

/// Записать payload в первый свободный файл `"<ts>-<serial>"`.
///
/// Payload целиком пишется во временный `.`-файл (`list_sorted` его
/// не видит), затем публикуется hard link'ом под именем записи. Link
/// атомарен и не перезаписывает существующий файл: читатель видит запись
/// только целиком, и два писателя не получают один ключ.
pub async fn write_record(dir: &Path, ts_ms: i64, payload: &[u8]) -> Result<RecordKey, RecorderError> {
    let staging = dir.join(format!(
        ".staging-{}-{}",
        std::process::id(),
        STAGING_SEQ.fetch_add(1, Ordering::Relaxed)
    ));

    let published = async {
        write_staging(&staging, payload).await?;
        publish(dir, &staging, ts_ms).await
    }
    .await;

    if let Err(e) = tokio::fs::remove_file(&staging).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %staging.display(), error = %e, "failed to remove staging file");
        }
    }
    published
}

async fn write_staging(path: &Path, payload: &[u8]) -> Result<(), RecorderError> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(|e| RecorderError::io(format!("create {}", path.display()), e))?;
    file.write_all(payload)
        .await
        .map_err(|e| RecorderError::io(format!("write {}", path.display()), e))?;
    file.flush()
        .await
        .map_err(|e| RecorderError::io(format!("flush {}", path.display()), e))?;
    Ok(())
}

async fn publish(dir: &Path, staging: &Path, ts_ms: i64) -> Result<RecordKey, RecorderError> {
    let mut serial: u32 = 0;
    loop {
        let key = RecordKey::new(ts_ms, serial);
        let path = dir.join(key.to_string());
        match tokio::fs::hard_link(staging, &path).await {
            Ok(()) => return Ok(key),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                serial = serial.checked_add(1).ok_or_else(|| {
                    RecorderError::io(
                        format!("record serials exhausted in {}", dir.display()),
                        std::io::Error::other("serial overflow"),
                    )
                })?;
            }
            Err(e) => return Err(RecorderError::io(format!("link {}", path.display()), e)),
        }
    }
}
