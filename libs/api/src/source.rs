use serde::{Deserialize, Serialize};

use crate::size::ByteSize;

// ════════════════════════════════════════════════════════════════
//  Limit
// ════════════════════════════════════════════════════════════════

/// Политика хранения записей source'а.
///
/// Каждое поле — независимый лимит; отсутствующее поле = лимита нет.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limit {
    /// Максимальный возраст записи, мс.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<u64>,
    /// Максимальный суммарный размер записей.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<ByteSize>,
    /// Максимальное количество записей.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

impl Limit {
    pub fn is_empty(&self) -> bool {
        self.time.is_none() && self.size.is_none() && self.count.is_none()
    }
}

// ════════════════════════════════════════════════════════════════
//  Source
// ════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MqttParams {
    pub topic: String,
}

/// Вид source'а — дискриминант без данных.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum SourceKind {
    #[default]
    Mqtt,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Mqtt => write!(f, "mqtt"),
        }
    }
}

/// Сконфигурированная точка приёма: topic + политика хранения.
///
/// На диске:
/// ```json
/// { "type": "mqtt", "limit": { "count": 100 }, "params": { "topic": "/sensors/t1" } }
/// ```
/// Идентичность — (вид, topic). Уникальность обеспечивает upsert в model store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Source {
    Mqtt {
        #[serde(default)]
        limit: Limit,
        params: MqttParams,
    },
}

impl Source {
    /// Новый source вида по умолчанию (mqtt).
    pub fn new(topic: impl Into<String>, limit: Limit) -> Self {
        Source::Mqtt {
            limit,
            params: MqttParams { topic: topic.into() },
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            Source::Mqtt { .. } => SourceKind::Mqtt,
        }
    }

    pub fn topic(&self) -> &str {
        match self {
            Source::Mqtt { params, .. } => &params.topic,
        }
    }

    pub fn limit(&self) -> &Limit {
        match self {
            Source::Mqtt { limit, .. } => limit,
        }
    }

    pub fn set_limit(&mut self, new_limit: Limit) {
        match self {
            Source::Mqtt { limit, .. } => *limit = new_limit,
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  Model document
// ════════════════════════════════════════════════════════════════

/// Документ модели (`model.json`). Единственное поле верхнего уровня — `sources`.
///
/// `None` означает, что поле отсутствовало в файле; model store
/// нормализует его в пустой список и сразу сохраняет.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Model {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_matches_document_shape() {
        let json = r#"{"type":"mqtt","limit":{"time":60000,"size":"10kb","count":5},"params":{"topic":"/a/b"}}"#;
        let source: Source = serde_json::from_str(json).unwrap();
        assert_eq!(source.kind(), SourceKind::Mqtt);
        assert_eq!(source.topic(), "/a/b");
        assert_eq!(source.limit().time, Some(60_000));
        assert_eq!(source.limit().size, Some(ByteSize::from_bytes(10 * 1024)));
        assert_eq!(source.limit().count, Some(5));

        let back = serde_json::to_value(&source).unwrap();
        assert_eq!(back["type"], "mqtt");
        assert_eq!(back["params"]["topic"], "/a/b");
        assert_eq!(back["limit"]["size"], "10kb");
    }

    #[test]
    fn missing_limit_fields_are_omitted() {
        let source = Source::new("t", Limit { count: Some(3), ..Limit::default() });
        let value = serde_json::to_value(&source).unwrap();
        assert_eq!(value["limit"], serde_json::json!({ "count": 3 }));

        let parsed: Source = serde_json::from_str(r#"{"type":"mqtt","params":{"topic":"t"}}"#).unwrap();
        assert!(parsed.limit().is_empty());
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let json = r#"{"type":"amqp","params":{"topic":"t"}}"#;
        assert!(serde_json::from_str::<Source>(json).is_err());
    }

    #[test]
    fn set_limit_replaces_whole_policy() {
        let mut source = Source::new("t", Limit { time: Some(10), ..Limit::default() });
        source.set_limit(Limit { count: Some(1), ..Limit::default() });
        assert_eq!(source.limit(), &Limit { count: Some(1), ..Limit::default() });
    }

    #[test]
    fn model_without_sources_field() {
        let model: Model = serde_json::from_str("{}").unwrap();
        assert!(model.sources.is_none());
    }
}
