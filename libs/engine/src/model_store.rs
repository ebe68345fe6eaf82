use std::path::{Path, PathBuf};

use tokio::sync::RwLock;

use recorder_api::{Limit, Model, Source};

use crate::error::RecorderError;

// ═══════════════════════════════════════════════════════════════
//  ModelStore
// ═══════════════════════════════════════════════════════════════

/// Состояние процесса: список source'ов, привязанный к `model.json`.
///
/// Жизненный цикл:
/// - `open()` — загрузка при старте (битый документ = фатальная ошибка);
/// - `reload()` — единственная точка обновления из файла (явный вызов или watcher);
/// - `upsert()` / `delete()` — единственные мутации, каждая перезаписывает
///   документ целиком под write-lock'ом, так что порядок записей на диск
///   совпадает с порядком мутаций.
pub struct ModelStore {
    path: PathBuf,
    sources: RwLock<Vec<Source>>,
}

impl ModelStore {
    /// Загрузить документ модели. Если поля `sources` нет — оно создаётся
    /// пустым и документ сразу сохраняется.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, RecorderError> {
        let path = path.into();
        let (sources, missing) = read_document(&path).await?;
        if missing {
            write_document(&path, &sources).await?;
        }
        tracing::info!(path = %path.display(), sources = sources.len(), "model loaded");
        Ok(Self {
            path,
            sources: RwLock::new(sources),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Перечитать документ с диска. При ошибке разбора текущая модель
    /// в памяти не меняется.
    pub async fn reload(&self) -> Result<Vec<Source>, RecorderError> {
        let mut guard = self.sources.write().await;
        let (sources, missing) = read_document(&self.path).await?;
        if missing {
            write_document(&self.path, &sources).await?;
        }
        *guard = sources.clone();
        tracing::info!(path = %self.path.display(), sources = sources.len(), "model reloaded");
        Ok(sources)
    }

    /// Снимок текущего списка source'ов.
    pub async fn sources(&self) -> Vec<Source> {
        self.sources.read().await.clone()
    }

    /// Первый source с данным topic'ом.
    pub async fn find(&self, topic: &str) -> Option<Source> {
        self.sources
            .read()
            .await
            .iter()
            .find(|s| s.topic() == topic)
            .cloned()
    }

    /// Сохранить текущую модель целиком (не атомарно).
    pub async fn save(&self) -> Result<(), RecorderError> {
        let guard = self.sources.read().await;
        write_document(&self.path, &guard).await
    }

    /// Заменить limit существующего source'а или добавить новый source
    /// вида по умолчанию. Возвращает итоговый source.
    pub async fn upsert(&self, topic: &str, limit: Limit) -> Result<Source, RecorderError> {
        let mut guard = self.sources.write().await;
        let mut next = guard.clone();

        let source = match next.iter_mut().find(|s| s.topic() == topic) {
            Some(existing) => {
                existing.set_limit(limit);
                existing.clone()
            }
            None => {
                let created = Source::new(topic, limit);
                next.push(created.clone());
                created
            }
        };

        write_document(&self.path, &next).await?;
        *guard = next;
        tracing::info!(topic = %topic, "source upserted");
        Ok(source)
    }

    /// Удалить source по topic'у. Директория с записями остаётся на диске.
    pub async fn delete(&self, topic: &str) -> Result<Source, RecorderError> {
        let mut guard = self.sources.write().await;
        let idx = guard
            .iter()
            .position(|s| s.topic() == topic)
            .ok_or_else(|| RecorderError::NotFound(topic.to_string()))?;

        let mut next = guard.clone();
        let removed = next.remove(idx);

        write_document(&self.path, &next).await?;
        *guard = next;
        tracing::info!(topic = %topic, "source deleted");
        Ok(removed)
    }
}

/// Прочитать документ. Второй элемент — `true`, если поля `sources` не было.
async fn read_document(path: &Path) -> Result<(Vec<Source>, bool), RecorderError> {
    let content = tokio::fs::read(path)
        .await
        .map_err(|e| RecorderError::io(format!("read {}", path.display()), e))?;
    let model: Model = serde_json::from_slice(&content).map_err(|e| RecorderError::ModelParse {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(match model.sources {
        Some(sources) => (sources, false),
        None => (Vec::new(), true),
    })
}

async fn write_document(path: &Path, sources: &[Source]) -> Result<(), RecorderError> {
    let model = Model {
        sources: Some(sources.to_vec()),
    };
    let json = serde_json::to_vec_pretty(&model)?;
    tokio::fs::write(path, json)
        .await
        .map_err(|e| RecorderError::io(format!("write {}", path.display()), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use recorder_api::ByteSize;
    use tempfile::TempDir;

    fn model_path(tmp: &TempDir, content: &str) -> PathBuf {
        let path = tmp.path().join("model.json");
        std::fs::write(&path, content).unwrap();
        path
    }

    fn persisted(path: &Path) -> serde_json::Value {
        serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn open_initializes_missing_sources() {
        let tmp = TempDir::new().unwrap();
        let path = model_path(&tmp, "{}");

        let store = ModelStore::open(&path).await.unwrap();
        assert!(store.sources().await.is_empty());
        assert_eq!(persisted(&path), serde_json::json!({ "sources": [] }));
    }

    #[tokio::test]
    async fn open_rejects_malformed_document() {
        let tmp = TempDir::new().unwrap();
        let path = model_path(&tmp, "{ not json");

        let err = ModelStore::open(&path).await.err().unwrap();
        assert!(matches!(err, RecorderError::ModelParse { .. }));
    }

    #[tokio::test]
    async fn upsert_appends_then_replaces_limit_in_place() {
        let tmp = TempDir::new().unwrap();
        let path = model_path(&tmp, r#"{"sources":[{"type":"mqtt","limit":{},"params":{"topic":"/a"}}]}"#);
        let store = ModelStore::open(&path).await.unwrap();

        let created = store
            .upsert("/b", Limit { count: Some(10), ..Limit::default() })
            .await
            .unwrap();
        assert_eq!(created.topic(), "/b");

        let updated = store
            .upsert("/a", Limit { size: Some(ByteSize::from_bytes(2048)), ..Limit::default() })
            .await
            .unwrap();
        assert_eq!(updated.limit().size, Some(ByteSize::from_bytes(2048)));

        let topics: Vec<String> = store.sources().await.iter().map(|s| s.topic().to_string()).collect();
        assert_eq!(topics, vec!["/a", "/b"]);

        let doc = persisted(&path);
        assert_eq!(doc["sources"][0]["limit"]["size"], "2kb");
        assert_eq!(doc["sources"][1]["limit"]["count"], 10);
        assert_eq!(doc["sources"][1]["type"], "mqtt");
    }

    #[tokio::test]
    async fn delete_unknown_topic_leaves_document_untouched() {
        let tmp = TempDir::new().unwrap();
        let before = r#"{"sources":[{"type":"mqtt","params":{"topic":"/a"}}]}"#;
        let path = model_path(&tmp, before);
        let store = ModelStore::open(&path).await.unwrap();

        let err = store.delete("/missing").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
        assert_eq!(store.sources().await.len(), 1);
    }

    #[tokio::test]
    async fn delete_returns_removed_source() {
        let tmp = TempDir::new().unwrap();
        let path = model_path(&tmp, "{}");
        let store = ModelStore::open(&path).await.unwrap();
        store.upsert("/a", Limit::default()).await.unwrap();

        let removed = store.delete("/a").await.unwrap();
        assert_eq!(removed.topic(), "/a");
        assert!(store.find("/a").await.is_none());
        assert_eq!(persisted(&path), serde_json::json!({ "sources": [] }));
    }

    #[tokio::test]
    async fn reload_picks_up_external_edit_and_keeps_model_on_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = model_path(&tmp, "{}");
        let store = ModelStore::open(&path).await.unwrap();
        store.upsert("/a", Limit { count: Some(3), ..Limit::default() }).await.unwrap();

        // Внешняя правка: добавлен второй source, первый сохранён.
        let mut doc = persisted(&path);
        doc["sources"]
            .as_array_mut()
            .unwrap()
            .push(serde_json::json!({ "type": "mqtt", "params": { "topic": "/b" } }));
        std::fs::write(&path, serde_json::to_vec(&doc).unwrap()).unwrap();

        let sources = store.reload().await.unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(store.find("/a").await.unwrap().limit().count, Some(3));

        std::fs::write(&path, "garbage").unwrap();
        assert!(store.reload().await.is_err());
        assert_eq!(store.sources().await.len(), 2);
    }
}
