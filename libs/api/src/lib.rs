pub mod broker;
pub mod error;
pub mod record;
pub mod size;
pub mod source;
mod util;

pub use broker::{BrokerClient, Subscription};
pub use error::{BrokerError, ByteSizeError};
pub use record::{compare_names, RecordKey};
pub use size::ByteSize;
pub use source::{Limit, Model, MqttParams, Source, SourceKind};
pub use util::{now_ms, system_time_ms};
