use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use recorder_api::{now_ms, Limit, Source};

use crate::layout::{list_sorted, record_time, Layout};
use crate::model_store::ModelStore;

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);

/// Результат sweep'а одного source'а.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSweep {
    pub topic: String,
    /// Имена удалённых записей в порядке удаления.
    pub removed: Vec<String>,
}

// ═══════════════════════════════════════════════════════════════
//  RetentionEngine
// ═══════════════════════════════════════════════════════════════

/// Периодическое вытеснение записей по лимитам source'ов.
///
/// Для каждого source'а независимо применяются проходы age → size → count
/// (только те, лимит которых задан). Source'ы и проходы выполняются строго
/// последовательно. Ошибки удаления отдельных файлов логируются и
/// не прерывают sweep.
pub struct RetentionEngine {
    layout: Layout,
    store: Arc<ModelStore>,
    interval: Duration,
}

impl RetentionEngine {
    pub fn new(layout: Layout, store: Arc<ModelStore>, interval: Duration) -> Self {
        Self { layout, store, interval }
    }

    /// Таймерный цикл: полный sweep, затем пауза `interval`.
    /// Интервал — нижняя граница периода, а не точный период.
    pub async fn run(&self, token: CancellationToken) {
        tracing::info!(interval_ms = self.interval.as_millis() as u64, "retention started");
        loop {
            let sweeps = self.sweep_all().await;
            let removed: usize = sweeps.iter().map(|s| s.removed.len()).sum();
            if removed > 0 {
                tracing::debug!(removed, "retention sweep finished");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = token.cancelled() => break,
            }
        }
        tracing::info!("retention stopped");
    }

    /// Один полный проход по всем source'ам модели.
    pub async fn sweep_all(&self) -> Vec<SourceSweep> {
        let sources = self.store.sources().await;
        let mut sweeps = Vec::with_capacity(sources.len());
        for source in &sources {
            sweeps.push(self.sweep_source(source, now_ms()).await);
        }
        sweeps
    }

    /// Применить лимиты одного source'а на момент `now`.
    pub async fn sweep_source(&self, source: &Source, now: i64) -> SourceSweep {
        let (topic, limit): (&str, &Limit) = match source {
            Source::Mqtt { params, limit } => (params.topic.as_str(), limit),
        };
        let dir = self.layout.source_dir(source);
        let mut removed = Vec::new();

        if let Some(time) = limit.time {
            let cutoff = now.saturating_sub(i64::try_from(time).unwrap_or(i64::MAX));
            age_pass(&dir, cutoff, &mut removed).await;
        }
        if let Some(size) = limit.size {
            size_pass(&dir, size.bytes(), &mut removed).await;
        }
        if let Some(count) = limit.count {
            count_pass(&dir, count, &mut removed).await;
        }

        for name in &removed {
            tracing::debug!(topic = %topic, record = %name, "record evicted");
        }
        SourceSweep {
            topic: topic.to_string(),
            removed,
        }
    }
}

/// Отсортированный список записей; ошибка листинга = нечего чистить.
async fn scan(dir: &Path) -> Vec<String> {
    match list_sorted(dir).await {
        Ok(names) => names,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "cannot list source directory");
            Vec::new()
        }
    }
}

/// Удалить всё, что создано раньше `cutoff`.
async fn age_pass(dir: &Path, cutoff: i64, removed: &mut Vec<String>) {
    for name in scan(dir).await {
        let Some(created) = record_time(dir, &name).await else {
            continue;
        };
        if created < cutoff {
            remove_record(dir, &name, removed).await;
        }
    }
}

/// Накопительный размер от старых к новым: файл, на котором сумма
/// превысила лимит, и все более новые удаляются.
async fn size_pass(dir: &Path, max_bytes: u64, removed: &mut Vec<String>) {
    let mut total: u64 = 0;
    let mut overflow = false;
    for name in scan(dir).await {
        if !overflow {
            let Ok(meta) = tokio::fs::metadata(dir.join(&name)).await else {
                continue;
            };
            total = total.saturating_add(meta.len());
            overflow = total > max_bytes;
        }
        if overflow {
            remove_record(dir, &name, removed).await;
        }
    }
}

/// Оставить только `max_count` самых старых записей.
async fn count_pass(dir: &Path, max_count: u64, removed: &mut Vec<String>) {
    let mut seen: u64 = 0;
    for name in scan(dir).await {
        seen += 1;
        if seen > max_count {
            remove_record(dir, &name, removed).await;
        }
    }
}

async fn remove_record(dir: &Path, name: &str, removed: &mut Vec<String>) {
    match tokio::fs::remove_file(dir.join(name)).await {
        Ok(()) => removed.push(name.to_string()),
        // Уже удалён другим проходом.
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(dir = %dir.display(), record = %name, error = %e, "failed to evict record");
        }
    }
}
