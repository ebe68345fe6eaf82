use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use recorder_api::{RecordKey, Source};

use crate::error::RecorderError;
use crate::layout::{list_sorted, record_time, Layout};
use crate::model_store::ModelStore;

/// Сводка по source'у.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceInfo {
    pub source: Source,
    /// Суммарный размер поддерева директории source'а, байт.
    pub size: u64,
    /// Timestamp последней записи; `null`, если записей нет.
    pub last: Option<i64>,
}

// ═══════════════════════════════════════════════════════════════
//  QueryEngine
// ═══════════════════════════════════════════════════════════════

/// Чтение записей и сводок. Все обращения к ФС идут последовательно.
pub struct QueryEngine {
    layout: Layout,
    store: Arc<ModelStore>,
}

impl QueryEngine {
    pub fn new(layout: Layout, store: Arc<ModelStore>) -> Self {
        Self { layout, store }
    }

    /// Payload'ы записей source'а, созданных строго позже `after`,
    /// в порядке поступления. Нечитаемые записи пропускаются.
    pub async fn series_after(&self, topic: &str, after: i64) -> Result<Vec<String>, RecorderError> {
        let source = self
            .store
            .find(topic)
            .await
            .ok_or_else(|| RecorderError::NotFound(topic.to_string()))?;
        let dir = self.layout.source_dir(&source);

        let names = match list_sorted(&dir).await {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!(topic = %topic, error = %e, "cannot list source directory");
                return Ok(Vec::new());
            }
        };

        let mut series = Vec::new();
        for name in names {
            match record_time(&dir, &name).await {
                Some(created) if created > after => {}
                _ => continue,
            }
            match tokio::fs::read(dir.join(&name)).await {
                Ok(bytes) => series.push(String::from_utf8_lossy(&bytes).into_owned()),
                Err(e) => {
                    tracing::warn!(topic = %topic, record = %name, error = %e, "unreadable record skipped");
                }
            }
        }
        Ok(series)
    }

    pub async fn info_for_topic(&self, topic: &str) -> Result<SourceInfo, RecorderError> {
        let source = self
            .store
            .find(topic)
            .await
            .ok_or_else(|| RecorderError::NotFound(topic.to_string()))?;
        Ok(self.info_for_source(&source).await)
    }

    /// Размер и последняя запись — пересчитываются при каждом вызове.
    pub async fn info_for_source(&self, source: &Source) -> SourceInfo {
        let dir = self.layout.source_dir(source);

        let size = tree_size(&dir).await;
        let last = match list_sorted(&dir).await {
            Ok(names) => names.iter().rev().find_map(|n| RecordKey::parse(n)).map(|k| k.ts_ms),
            Err(_) => None,
        };

        SourceInfo {
            source: source.clone(),
            size,
            last,
        }
    }

    /// Страница сводок. `page_size == 0` — без пагинации, все source'ы.
    pub async fn info_for_all(&self, page_size: usize, page_index: usize) -> Vec<SourceInfo> {
        let sources = self.store.sources().await;
        let page: &[Source] = if page_size == 0 {
            &sources
        } else {
            let start = page_index.saturating_mul(page_size).min(sources.len());
            let end = start.saturating_add(page_size).min(sources.len());
            &sources[start..end]
        };

        let mut infos = Vec::with_capacity(page.len());
        for source in page {
            infos.push(self.info_for_source(source).await);
        }
        infos
    }
}

/// Рекурсивный размер поддерева. Недоступные элементы считаются нулём.
async fn tree_size(root: &Path) -> u64 {
    let mut total: u64 = 0;
    let mut pending: Vec<PathBuf> = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let Ok(mut entries) = tokio::fs::read_dir(&dir).await else {
            continue;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            if meta.is_dir() {
                pending.push(entry.path());
            } else {
                total = total.saturating_add(meta.len());
            }
        }
    }
    total
}

/// Разбор timestamp'а из запроса: число или числовой префикс
/// (`"1700000000000"`, `"1700000000000.7"`, `"15abc"`), дробная часть
/// отбрасывается. Без числового префикса — `None`.
pub fn parse_timestamp(input: &str) -> Option<i64> {
    let s = input.trim();
    let digits_end = |from: usize| {
        s[from..]
            .find(|c: char| !c.is_ascii_digit())
            .map_or(s.len(), |i| from + i)
    };

    let sign = usize::from(s.starts_with(['-', '+']));
    let int_end = digits_end(sign);
    let mut end = int_end;
    if s[int_end..].starts_with('.') {
        end = digits_end(int_end + 1);
    }
    if end == sign || (int_end == sign && end == int_end + 1) {
        return None;
    }

    let value: f64 = s[..end].parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(value.trunc().clamp(i64::MIN as f64, i64::MAX as f64) as i64)
}
