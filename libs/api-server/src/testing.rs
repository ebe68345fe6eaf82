use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use recorder_api::{BrokerClient, BrokerError};
use recorder_engine::{Recorder, RecorderOptions};

use super::AppState;

pub(crate) struct NoopBroker;

impl BrokerClient for NoopBroker {
    fn subscribe<'a>(
        &'a self,
        _topic: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), BrokerError>> + Send + 'a>> {
        Box::pin(async { Ok(()) })
    }

    fn unsubscribe<'a>(
        &'a self,
        _topic: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), BrokerError>> + Send + 'a>> {
        Box::pin(async { Ok(()) })
    }
}

pub(crate) async fn state(tmp: &tempfile::TempDir) -> AppState {
    let recorder = Recorder::open(tmp.path(), Arc::new(NoopBroker), RecorderOptions::default())
        .await
        .unwrap();
    AppState { recorder: Arc::new(recorder) }
}
