pub mod error;
pub mod ingest;
pub mod layout;
pub mod model_store;
pub mod query;
pub mod reconciler;
pub mod recorder;
pub mod retention;
pub mod watch;

pub use error::RecorderError;
pub use layout::Layout;
pub use model_store::ModelStore;
pub use query::{parse_timestamp, QueryEngine, SourceInfo};
pub use reconciler::Reconciler;
pub use recorder::{Recorder, RecorderOptions};
pub use retention::{RetentionEngine, SourceSweep};
pub use watch::spawn_model_watcher;
