/// Ошибка запроса к брокеру (`subscribe` / `unsubscribe`).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    /// Клиент не принял запрос: очередь закрыта, event loop остановлен.
    #[error("{request} '{topic}': {detail}")]
    Request {
        request: &'static str,
        topic: String,
        detail: String,
    },

    /// Брокер отклонил запрос (ACL, некорректный фильтр).
    #[error("{request} '{topic}' rejected: {detail}")]
    Rejected {
        request: &'static str,
        topic: String,
        detail: String,
    },
}

/// Ошибка разбора размера (`"512"`, `"10kb"`, `"5mb"`).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ByteSizeError {
    #[error("empty size value")]
    Empty,

    #[error("invalid size number '{0}'")]
    InvalidNumber(String),

    #[error("unknown size suffix '{suffix}' in '{input}'")]
    UnknownSuffix { input: String, suffix: String },

    #[error("size '{0}' overflows")]
    Overflow(String),
}
