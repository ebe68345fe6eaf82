use std::sync::Arc;

use tokio::sync::Mutex;

use recorder_api::{BrokerClient, BrokerError, Source, Subscription};

// ═══════════════════════════════════════════════════════════════
//  Reconciler
// ═══════════════════════════════════════════════════════════════

/// Держит живые подписки брокера в соответствии с моделью.
///
/// Каждый цикл полный: отписка от всего отслеживаемого (последовательно,
/// с ожиданием каждой отписки), очистка, затем подписка на каждый topic
/// из модели ровно один раз. Mutex удерживается весь цикл, так что
/// пересекающиеся вызовы выполняются друг за другом.
pub struct Reconciler {
    broker: Arc<dyn BrokerClient>,
    tracked: Mutex<Vec<Subscription>>,
}

impl Reconciler {
    pub fn new(broker: Arc<dyn BrokerClient>) -> Self {
        Self {
            broker,
            tracked: Mutex::new(Vec::new()),
        }
    }

    /// Выполнить полный цикл. Возвращает отслеживаемые topic'и после цикла.
    pub async fn reconcile(&self, sources: &[Source]) -> Vec<String> {
        let mut tracked = self.tracked.lock().await;

        for sub in tracked.iter() {
            match self.broker.unsubscribe(&sub.topic).await {
                Ok(()) => tracing::debug!(topic = %sub.topic, "unsubscribed"),
                Err(e) => tracing::warn!(topic = %sub.topic, error = %e, "unsubscribe failed"),
            }
        }
        tracked.clear();

        for source in sources {
            let topic = match source {
                Source::Mqtt { params, .. } => params.topic.as_str(),
            };
            if tracked.iter().any(|s| s.topic == topic) {
                continue;
            }
            match self.broker.subscribe(topic).await {
                Ok(()) => {
                    tracing::info!(topic = %topic, "subscribed");
                    tracked.push(Subscription {
                        topic: topic.to_string(),
                        source: source.clone(),
                    });
                }
                Err(e @ BrokerError::Rejected { .. }) => {
                    tracing::error!(topic = %topic, error = %e, "subscribe rejected by broker");
                }
                Err(e) => {
                    tracing::warn!(topic = %topic, error = %e, "subscribe failed, will retry on next reconcile");
                }
            }
        }

        tracked.iter().map(|s| s.topic.clone()).collect()
    }

    /// Source отслеживаемой подписки на topic.
    pub async fn lookup(&self, topic: &str) -> Option<Source> {
        self.tracked
            .lock()
            .await
            .iter()
            .find(|s| s.topic == topic)
            .map(|s| s.source.clone())
    }

    pub async fn tracked_topics(&self) -> Vec<String> {
        self.tracked.lock().await.iter().map(|s| s.topic.clone()).collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::future::Future;
    use std::pin::Pin;

    use recorder_api::Limit;

    use super::*;

    /// Брокер в памяти: журналирует вызовы, умеет отказывать в подписке.
    #[derive(Default)]
    pub(crate) struct MockBroker {
        pub calls: std::sync::Mutex<Vec<String>>,
        pub reject: std::sync::Mutex<Vec<String>>,
    }

    impl MockBroker {
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl BrokerClient for MockBroker {
        fn subscribe<'a>(
            &'a self,
            topic: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<(), BrokerError>> + Send + 'a>> {
            Box::pin(async move {
                self.calls.lock().unwrap().push(format!("sub {topic}"));
                if self.reject.lock().unwrap().iter().any(|t| t == topic) {
                    return Err(BrokerError::Rejected {
                        request: "subscribe",
                        topic: topic.to_string(),
                        detail: "not allowed".into(),
                    });
                }
                Ok(())
            })
        }

        fn unsubscribe<'a>(
            &'a self,
            topic: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<(), BrokerError>> + Send + 'a>> {
            Box::pin(async move {
                self.calls.lock().unwrap().push(format!("unsub {topic}"));
                Ok(())
            })
        }
    }

    fn source(topic: &str) -> Source {
        Source::new(topic, Limit::default())
    }

    #[tokio::test]
    async fn subscribes_each_topic_once() {
        let broker = Arc::new(MockBroker::default());
        let reconciler = Reconciler::new(broker.clone());

        let topics = reconciler
            .reconcile(&[source("/a"), source("/b"), source("/a")])
            .await;
        assert_eq!(topics, vec!["/a", "/b"]);
        assert_eq!(broker.calls(), vec!["sub /a", "sub /b"]);
    }

    #[tokio::test]
    async fn repeated_cycle_is_idempotent() {
        let broker = Arc::new(MockBroker::default());
        let reconciler = Reconciler::new(broker.clone());
        let sources = [source("/a"), source("/b")];

        let first = reconciler.reconcile(&sources).await;
        let second = reconciler.reconcile(&sources).await;
        assert_eq!(first, second);
        assert_eq!(reconciler.tracked_topics().await, vec!["/a", "/b"]);
        assert_eq!(
            broker.calls(),
            vec!["sub /a", "sub /b", "unsub /a", "unsub /b", "sub /a", "sub /b"]
        );
    }

    #[tokio::test]
    async fn removed_source_is_unsubscribed_and_untracked() {
        let broker = Arc::new(MockBroker::default());
        let reconciler = Reconciler::new(broker.clone());

        reconciler.reconcile(&[source("/a"), source("/b")]).await;
        let topics = reconciler.reconcile(&[source("/b")]).await;
        assert_eq!(topics, vec!["/b"]);
        assert!(reconciler.lookup("/a").await.is_none());
        assert_eq!(reconciler.lookup("/b").await.unwrap().topic(), "/b");
    }

    #[tokio::test]
    async fn rejected_subscription_is_not_tracked() {
        let broker = Arc::new(MockBroker::default());
        broker.reject.lock().unwrap().push("/bad".into());
        let reconciler = Reconciler::new(broker.clone());

        let topics = reconciler.reconcile(&[source("/bad"), source("/ok")]).await;
        assert_eq!(topics, vec!["/ok"]);
    }
}
