use std::future::Future;
use std::pin::Pin;

use crate::error::BrokerError;
use crate::source::Source;

// ════════════════════════════════════════════════════════════════
//  Broker seam
// ════════════════════════════════════════════════════════════════

/// Соединение с pub/sub брокером, как его видит ядро.
///
/// Реализации: rumqttc-клиент в бинарнике, mock в тестах.
/// Доставка входящих сообщений идёт в обратную сторону — транспорт
/// вызывает `Recorder::ingest(topic, payload)`.
pub trait BrokerClient: Send + Sync {
    /// Подписаться на topic. Future завершается, когда запрос принят клиентом.
    fn subscribe<'a>(
        &'a self,
        topic: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), BrokerError>> + Send + 'a>>;

    /// Отписаться от topic.
    fn unsubscribe<'a>(
        &'a self,
        topic: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), BrokerError>> + Send + 'a>>;
}

/// Живая подписка: topic + source, ради которого она создана.
/// Существует только в памяти, пересобирается при каждой реконсиляции.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub topic: String,
    pub source: Source,
}
