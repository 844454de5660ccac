pub mod batch;
pub mod config;
pub mod dispatch;
pub mod metrics;
pub mod odin;
pub mod queue;
pub mod secrets;
pub mod testing;
pub mod token;
pub mod watermark;

pub use batch::{BatchJob, BatchOutcome, BatchRouter, CategoryTable, ValidationError};
pub use config::{
    load_config, load_config_from_str, validate_config, BatchTarget, Config, ConfigError,
    SanitizedConfig,
};
pub use dispatch::{
    DispatchError, DispatchRunner, DispatchTarget, Dispatcher, PairOutcome, PairReport, RunError,
    RunReport,
};
pub use odin::{HttpOdinApi, OdinApi, Scan, UpstreamError};
pub use queue::{HttpJobQueue, JobMessage, JobQueue, QueueError, SendAck};
pub use secrets::resolve_secret;
pub use token::{JobAddressEncoder, TargetPayload, TokenError};
pub use watermark::{SqliteWatermarkStore, WatermarkError, WatermarkRecord, WatermarkStore};
