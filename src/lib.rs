//! Call Quality Copilot: real-time call quality adaptation
//!
//! This crate watches a live call transport, decides how the call should
//! adapt to changing network conditions, and drives the outgoing video
//! encoder.
//!
//! # Features
//! - Pre-call route selection from a latency probe and connection hints
//! - Mid-call monitoring with an ordered adaptation policy
//! - Throttled, auto-dismissing user hints
//! - Hardware-first codec selection with software fallback
//! - Frame pull/encode loop with key frame cadence and encoder stats
//! - Optional OpenH264 software backends (`software-codec` feature)
//!
//! # Usage
//! ```rust,ignore
//! use call_copilot::{CallSession, ConnectionRegistry, CopilotConfig, TcpLatencyProbe};
//! use std::sync::Arc;
//!
//! let config = CopilotConfig::load_or_default();
//! let session = CallSession::new(config.clone(), Arc::new(ConnectionRegistry::new()));
//! let route = session.prepare(&TcpLatencyProbe::new(&config.probe.target)).await.route;
//! session.on_connected(transport).await;
//! // ...
//! session.teardown().await;
//! ```
pub mod config;
pub mod encoder;
pub mod errors;
pub mod quality;
pub mod session;
pub mod timing;
pub mod transport;
pub mod types;

// Testing utilities - scripted collaborators for offline testing
pub mod testing;

use std::sync::{Mutex, MutexGuard, PoisonError};

// Re-exports for convenience
pub use config::CopilotConfig;
pub use encoder::{EncoderStats, HardwareDecoder, HardwareEncoderManager, VideoCodec};
pub use errors::{CopilotError, CopilotResult};
pub use quality::{CallCopilot, NetworkProbe, TcpLatencyProbe};
pub use session::CallSession;
pub use transport::{ConnectionRegistry, StatsReport, Transport};
pub use types::{
    CallRoute, CopilotAction, Hint, NetworkAssessment, NetworkSample, QualityClassification,
    TransportState,
};

/// Install `env_logger`, defaulting to `call_copilot=info` when `RUST_LOG`
/// is unset. Later calls are ignored.
pub fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("call_copilot=info");
    if env_logger::Builder::from_env(env).try_init().is_ok() {
        log::debug!("Logging initialized");
    }
}

/// Lock a std mutex, recovering the data if a holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Crate description
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
        software_codec: cfg!(feature = "software-codec"),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub software_codec: bool,
}
