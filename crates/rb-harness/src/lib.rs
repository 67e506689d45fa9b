pub mod activity;
pub mod clock;
pub mod config;
pub mod interaction;
pub mod metrics;
pub mod panel;
pub mod probe;
pub mod session;

pub use activity::{ActivityError, ActivityLoader};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{BenchConfig, ConfigError};
pub use interaction::InteractionController;
pub use metrics::{BUILD_FAILED, FpsReading, Metrics, SharedMetrics};
pub use probe::{MemoryProbe, NoProbe, ProcStatusProbe, default_probe};
pub use session::Session;
