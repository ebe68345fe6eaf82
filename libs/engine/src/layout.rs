use std::path::{Component, Path, PathBuf};

use recorder_api::{compare_names, system_time_ms, RecordKey, Source};

use crate::error::RecorderError;

/// Файловая структура рекордера.
///
/// ```text
/// {home}/streamer/model.json          — документ модели
/// {home}/streamer/files/{topic}/      — директория source'а
/// {home}/streamer/files/{topic}/{ts}-{serial}  — одна запись
/// ```
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
    files: PathBuf,
    model: PathBuf,
}

impl Layout {
    pub fn new(home: impl AsRef<Path>) -> Self {
        let root = home.as_ref().join("streamer");
        Self {
            files: root.join("files"),
            model: root.join("model.json"),
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files(&self) -> &Path {
        &self.files
    }

    pub fn model(&self) -> &Path {
        &self.model
    }

    /// Создать корневые директории и пустой документ модели, если их нет.
    pub async fn prepare(&self) -> Result<(), RecorderError> {
        tokio::fs::create_dir_all(&self.files)
            .await
            .map_err(|e| RecorderError::io(format!("mkdir {}", self.files.display()), e))?;
        let exists = tokio::fs::try_exists(&self.model)
            .await
            .map_err(|e| RecorderError::io(format!("stat {}", self.model.display()), e))?;
        if !exists {
            tokio::fs::write(&self.model, "{}")
                .await
                .map_err(|e| RecorderError::io(format!("create {}", self.model.display()), e))?;
            tracing::info!(path = %self.model.display(), "created empty model document");
        }
        Ok(())
    }

    /// Директория записей source'а.
    pub fn source_dir(&self, source: &Source) -> PathBuf {
        match source {
            Source::Mqtt { params, .. } => self.topic_dir(&params.topic),
        }
    }

    /// `files/` + topic без ведущего `/`. Пустые уровни, `.` и `..`
    /// пропускаются — путь никогда не выходит за пределы `files/`.
    pub fn topic_dir(&self, topic: &str) -> PathBuf {
        let trimmed = topic.strip_prefix('/').unwrap_or(topic);
        let mut dir = self.files.clone();
        for level in trimmed.split('/') {
            if let Some(Component::Normal(part)) = Path::new(level).components().next() {
                dir.push(part);
            }
        }
        dir
    }
}

// ═══════════════════════════════════════════════════════════════
//  Directory scanning
// ═══════════════════════════════════════════════════════════════

/// Имена файлов директории source'а в порядке поступления.
///
/// Поддиректории и скрытые (`.`-) файлы, в т.ч. недописанные записи,
/// пропускаются.
///
/// Отсутствующая директория = пустой список (source ещё ничего не получил).
pub async fn list_sorted(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }
        if let Ok(name) = entry.file_name().into_string() {
            if !name.starts_with('.') {
                names.push(name);
            }
        }
    }
    names.sort_by(|a, b| compare_names(a, b));
    Ok(names)
}

/// Время создания записи, Unix ms.
///
/// Для записи это timestamp из имени; для постороннего файла —
/// время создания из метаданных, а если ФС его не даёт — mtime.
pub async fn record_time(dir: &Path, name: &str) -> Option<i64> {
    if let Some(key) = RecordKey::parse(name) {
        return Some(key.ts_ms);
    }
    let meta = tokio::fs::metadata(dir.join(name)).await.ok()?;
    meta.created()
        .or_else(|_| meta.modified())
        .ok()
        .map(system_time_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_paths_from_home() {
        let layout = Layout::new("/var/rec");
        assert_eq!(layout.root(), Path::new("/var/rec/streamer"));
        assert_eq!(layout.files(), Path::new("/var/rec/streamer/files"));
        assert_eq!(layout.model(), Path::new("/var/rec/streamer/model.json"));
    }

    #[test]
    fn strips_leading_separator_only_once() {
        let layout = Layout::new("/h");
        assert_eq!(
            layout.topic_dir("/sensors/t1"),
            PathBuf::from("/h/streamer/files/sensors/t1")
        );
        assert_eq!(
            layout.topic_dir("sensors/t1"),
            PathBuf::from("/h/streamer/files/sensors/t1")
        );
    }

    #[test]
    fn topic_cannot_escape_files_tree() {
        let layout = Layout::new("/h");
        assert_eq!(
            layout.topic_dir("/../../etc/./passwd"),
            PathBuf::from("/h/streamer/files/etc/passwd")
        );
    }

    #[tokio::test]
    async fn prepare_creates_tree_and_empty_model() {
        let tmp = tempfile::TempDir::new().unwrap();
        let layout = Layout::new(tmp.path());
        layout.prepare().await.unwrap();
        assert!(layout.files().is_dir());
        assert_eq!(std::fs::read_to_string(layout.model()).unwrap(), "{}");

        std::fs::write(layout.model(), r#"{"sources":[]}"#).unwrap();
        layout.prepare().await.unwrap();
        assert_eq!(std::fs::read_to_string(layout.model()).unwrap(), r#"{"sources":[]}"#);
    }

    #[tokio::test]
    async fn list_sorted_orders_by_record_key() {
        let tmp = tempfile::TempDir::new().unwrap();
        for name in ["200-0", "100-10", "100-2", "README", ".staging-1-0"] {
            std::fs::write(tmp.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(tmp.path().join("nested")).unwrap();
        let names = list_sorted(tmp.path()).await.unwrap();
        assert_eq!(names, vec!["100-2", "100-10", "200-0", "README"]);

        assert!(list_sorted(&tmp.path().join("missing")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn record_time_prefers_key_timestamp() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("123-0"), b"x").unwrap();
        std::fs::write(tmp.path().join("other"), b"x").unwrap();

        assert_eq!(record_time(tmp.path(), "123-0").await, Some(123));
        assert!(record_time(tmp.path(), "other").await.unwrap() > 0);
        assert_eq!(record_time(tmp.path(), "gone").await, None);
    }
}
