use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use recorder_api::{BrokerClient, BrokerError};
use recorder_engine::Recorder;

use crate::config::MqttConfig;

/// Ёмкость очереди запросов клиента → event loop.
const REQUEST_CAPACITY: usize = 64;

pub fn options(cfg: &MqttConfig) -> MqttOptions {
    let mut opts = MqttOptions::new(cfg.client_id.clone(), cfg.host.clone(), cfg.port);
    opts.set_keep_alive(Duration::from_secs(cfg.keep_alive_secs));
    // Подписки живут на стороне брокера между переподключениями.
    opts.set_clean_session(false);
    opts
}

// ═══════════════════════════════════════════════════════════════
//  MqttBroker — BrokerClient поверх rumqttc
// ═══════════════════════════════════════════════════════════════

pub struct MqttBroker {
    client: AsyncClient,
}

impl MqttBroker {
    pub fn new(cfg: &MqttConfig) -> (Self, EventLoop) {
        let (client, eventloop) = AsyncClient::new(options(cfg), REQUEST_CAPACITY);
        (Self { client }, eventloop)
    }
}

impl BrokerClient for MqttBroker {
    fn subscribe<'a>(
        &'a self,
        topic: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), BrokerError>> + Send + 'a>> {
        Box::pin(async move {
            self.client
                .subscribe(topic, QoS::AtLeastOnce)
                .await
                .map_err(|e| BrokerError::Request {
                    request: "subscribe",
                    topic: topic.to_string(),
                    detail: e.to_string(),
                })
        })
    }

    fn unsubscribe<'a>(
        &'a self,
        topic: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), BrokerError>> + Send + 'a>> {
        Box::pin(async move {
            self.client
                .unsubscribe(topic)
                .await
                .map_err(|e| BrokerError::Request {
                    request: "unsubscribe",
                    topic: topic.to_string(),
                    detail: e.to_string(),
                })
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  Event loop task
// ═══════════════════════════════════════════════════════════════

/// Крутить event loop rumqttc до отмены: ConnAck → `on_connected`,
/// Publish → `ingest`. Ошибка соединения — лог и повтор через `reconnect_delay`.
pub fn spawn_event_loop(
    mut eventloop: EventLoop,
    recorder: Arc<Recorder>,
    reconnect_delay: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = token.cancelled() => break,
                event = eventloop.poll() => event,
            };

            match event {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    tracing::debug!(code = ?ack.code, "mqtt connack");
                    spawn_on_connected(&recorder);
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    match recorder.ingest(&publish.topic, &publish.payload).await {
                        Ok(Some(key)) => {
                            tracing::trace!(topic = %publish.topic, record = %key, "recorded");
                        }
                        Ok(None) => {}
                        Err(e) => {
                            tracing::error!(topic = %publish.topic, error = %e, "failed to record message");
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, delay_ms = reconnect_delay.as_millis() as u64, "mqtt connection error");
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(reconnect_delay) => {}
                    }
                }
            }
        }
        tracing::info!("mqtt event loop stopped");
    })
}

/// Реконсиляция после ConnAck идёт отдельной задачей: её subscribe'ы
/// встают в очередь запросов клиента, которую разгребает только `poll()`.
fn spawn_on_connected(recorder: &Arc<Recorder>) -> JoinHandle<()> {
    let recorder = recorder.clone();
    tokio::spawn(async move {
        recorder.on_connected().await;
    })
}

#[cfg(test)]
mod tests {
    use recorder_api::Limit;
    use recorder_engine::RecorderOptions;
    use tokio::sync::mpsc;

    use super::*;

    /// Брокер с ограниченной очередью запросов: subscribe ждёт, пока
    /// место не освободит читатель очереди (как `poll()` у rumqttc).
    struct QueuedBroker {
        requests: mpsc::Sender<String>,
    }

    impl BrokerClient for QueuedBroker {
        fn subscribe<'a>(
            &'a self,
            topic: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<(), BrokerError>> + Send + 'a>> {
            Box::pin(async move {
                self.requests
                    .send(topic.to_string())
                    .await
                    .map_err(|e| BrokerError::Request {
                        request: "subscribe",
                        topic: topic.to_string(),
                        detail: e.to_string(),
                    })
            })
        }

        fn unsubscribe<'a>(
            &'a self,
            _topic: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<(), BrokerError>> + Send + 'a>> {
            Box::pin(async { Ok(()) })
        }
    }

    #[tokio::test]
    async fn connack_reconcile_does_not_block_the_request_queue() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (tx, mut rx) = mpsc::channel(4);
        let recorder = Recorder::open(
            tmp.path(),
            Arc::new(QueuedBroker { requests: tx }),
            RecorderOptions::default(),
        )
        .await
        .unwrap();
        let topics: Vec<String> = (0..=REQUEST_CAPACITY).map(|i| format!("/s/{i}")).collect();
        for topic in &topics {
            recorder.upsert_by_topic(topic, Limit::default()).await.unwrap();
        }
        let recorder = Arc::new(recorder);

        // Возврат без ожидания реконсиляции: иначе очередь на 4 слота не разгрести.
        let handle = spawn_on_connected(&recorder);

        let mut drained = Vec::new();
        let drain = async {
            while drained.len() < topics.len() {
                match rx.recv().await {
                    Some(topic) => drained.push(topic),
                    None => break,
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(5), drain).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();

        assert_eq!(drained, topics);
        assert_eq!(recorder.tracked_topics().await, topics);
    }

    #[test]
    fn options_follow_config() {
        let cfg = MqttConfig {
            host: "broker.local".into(),
            port: 1884,
            client_id: "rec-1".into(),
            keep_alive_secs: 15,
            reconnect_delay_ms: 500,
        };
        let opts = options(&cfg);
        assert_eq!(opts.broker_address(), ("broker.local".to_string(), 1884));
        assert_eq!(opts.client_id(), "rec-1");
        assert_eq!(opts.keep_alive(), Duration::from_secs(15));
        assert!(!opts.clean_session());
    }
}
