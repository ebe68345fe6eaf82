use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use recorder_engine::{spawn_model_watcher, Recorder, RecorderOptions};

use crate::config::{ServeArgs, ServerConfig};
use crate::error::ServerError;
use crate::mqtt::{spawn_event_loop, MqttBroker};

/// Сколько ждать кооперативной остановки задач перед abort.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn run(args: ServeArgs) -> Result<(), ServerError> {
    tracing::info!("recorder-server starting");

    // --- Load config ---
    let config = ServerConfig::load(&args.config)?;
    tracing::info!(config = %args.config, home = %config.home.display(), "loaded config");

    // --- CancellationToken for graceful shutdown ---
    let token = CancellationToken::new();

    // --- Broker client + recorder core ---
    let (broker, eventloop) = MqttBroker::new(&config.mqtt);
    let options = RecorderOptions {
        retention_interval: config.retention_interval(),
    };
    let recorder = Arc::new(Recorder::open(&config.home, Arc::new(broker), options).await?);
    let sources = recorder.store().sources().await;
    tracing::info!(sources = sources.len(), "model loaded");

    let mut handles: Vec<JoinHandle<()>> = Vec::new();

    // --- Retention ---
    let retention_recorder = recorder.clone();
    let retention_token = token.clone();
    handles.push(tokio::spawn(async move {
        retention_recorder.retention().run(retention_token).await;
    }));

    // --- Model watcher ---
    handles.push(spawn_model_watcher(recorder.clone(), config.watch_debounce(), token.clone())?);

    // --- MQTT event loop ---
    handles.push(spawn_event_loop(
        eventloop,
        recorder.clone(),
        Duration::from_millis(config.mqtt.reconnect_delay_ms),
        token.clone(),
    ));
    tracing::info!(host = %config.mqtt.host, port = config.mqtt.port, "mqtt client started");

    // --- API server (HTTP + WS) ---
    let api_recorder = recorder.clone();
    let api_port = config.api_port;
    let api_token = token.clone();
    handles.push(tokio::spawn(async move {
        if let Err(e) = recorder_api_server::run(api_port, api_recorder, api_token).await {
            tracing::error!(error = %e, "api server error");
        }
    }));

    tracing::info!(port = config.api_port, "api server (http+ws) listening");
    tracing::info!("server ready");

    // --- Ожидание Ctrl+C ---
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down...");

    token.cancel();

    let drain = async {
        for h in handles.iter_mut() {
            let _ = h.await;
        }
    };
    let timed_out = tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err();
    if timed_out {
        tracing::warn!("tasks did not stop in time, aborting");
        for h in &handles {
            h.abort();
        }
    }

    tracing::info!("shutdown complete");
    Ok(())
}
