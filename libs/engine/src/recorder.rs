use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use recorder_api::{BrokerClient, Limit, RecordKey, Source};

use crate::error::RecorderError;
use crate::ingest::Ingestor;
use crate::layout::Layout;
use crate::model_store::ModelStore;
use crate::query::{QueryEngine, SourceInfo};
use crate::reconciler::Reconciler;
use crate::retention::{RetentionEngine, DEFAULT_INTERVAL};

#[derive(Debug, Clone)]
pub struct RecorderOptions {
    /// Пауза между sweep'ами retention.
    pub retention_interval: Duration,
}

impl Default for RecorderOptions {
    fn default() -> Self {
        Self {
            retention_interval: DEFAULT_INTERVAL,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Recorder
// ═══════════════════════════════════════════════════════════════

/// Ядро рекордера: модель + подписки + запись + retention + запросы.
///
/// Транспорт (MQTT-клиент, HTTP/WS) работает только через методы этого
/// типа: входящие сообщения → `ingest`, события соединения → `on_connected`,
/// запросы → `series_after` / `info_*` / `upsert_by_topic` / `delete_by_topic`.
pub struct Recorder {
    layout: Layout,
    store: Arc<ModelStore>,
    reconciler: Arc<Reconciler>,
    ingestor: Ingestor,
    query: QueryEngine,
    retention: RetentionEngine,
    connected: AtomicBool,
}

impl Recorder {
    /// Подготовить `{home}/streamer` и загрузить модель.
    /// Битый документ модели — фатальная ошибка.
    pub async fn open(
        home: impl AsRef<Path>,
        broker: Arc<dyn BrokerClient>,
        options: RecorderOptions,
    ) -> Result<Self, RecorderError> {
        let layout = Layout::new(home);
        layout.prepare().await?;

        let store = Arc::new(ModelStore::open(layout.model()).await?);
        let reconciler = Arc::new(Reconciler::new(broker));

        Ok(Self {
            ingestor: Ingestor::new(layout.clone(), reconciler.clone()),
            query: QueryEngine::new(layout.clone(), store.clone()),
            retention: RetentionEngine::new(layout.clone(), store.clone(), options.retention_interval),
            layout,
            store,
            reconciler,
            connected: AtomicBool::new(false),
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn store(&self) -> &Arc<ModelStore> {
        &self.store
    }

    pub fn retention(&self) -> &RetentionEngine {
        &self.retention
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Событие подключения к брокеру. Только первое подключение запускает
    /// реконсиляцию и возвращает `true`; последующие — no-op.
    pub async fn on_connected(&self) -> bool {
        if self.connected.swap(true, Ordering::SeqCst) {
            tracing::debug!("broker reconnected, subscriptions kept");
            return false;
        }
        tracing::info!("broker connected");
        self.reconcile().await;
        true
    }

    /// Полный цикл реконсиляции по текущей модели.
    pub async fn reconcile(&self) -> Vec<String> {
        let sources = self.store.sources().await;
        self.reconciler.reconcile(&sources).await
    }

    /// Перечитать модель; при активном соединении — пересобрать подписки.
    pub async fn reload_model(&self) -> Result<(), RecorderError> {
        self.store.reload().await?;
        if self.is_connected() {
            self.reconcile().await;
        }
        Ok(())
    }

    pub async fn tracked_topics(&self) -> Vec<String> {
        self.reconciler.tracked_topics().await
    }

    /// Входящее сообщение брокера. `Ok(None)` — topic не отслеживается.
    pub async fn ingest(&self, topic: &str, payload: &[u8]) -> Result<Option<RecordKey>, RecorderError> {
        self.ingestor.ingest(topic, payload).await
    }

    pub async fn series_after(&self, topic: &str, after: i64) -> Result<Vec<String>, RecorderError> {
        self.query.series_after(topic, after).await
    }

    pub async fn info_for_topic(&self, topic: &str) -> Result<SourceInfo, RecorderError> {
        self.query.info_for_topic(topic).await
    }

    pub async fn info_for_source(&self, source: &Source) -> SourceInfo {
        self.query.info_for_source(source).await
    }

    pub async fn info_for_all(&self, page_size: usize, page_index: usize) -> Vec<SourceInfo> {
        self.query.info_for_all(page_size, page_index).await
    }

    pub async fn upsert_by_topic(&self, topic: &str, limit: Limit) -> Result<Source, RecorderError> {
        self.store.upsert(topic, limit).await
    }

    pub async fn delete_by_topic(&self, topic: &str) -> Result<Source, RecorderError> {
        self.store.delete(topic).await
    }
}
