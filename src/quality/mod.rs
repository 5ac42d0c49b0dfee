/// Call quality analysis and adaptation
///
/// Pre-call route selection, the mid-call decision policy, hint display,
/// and the engine that ties them to a live transport.
pub mod engine;
pub mod hints;
pub mod policy;
pub mod probe;

pub use engine::{sample_from_report, CallCopilot};
pub use hints::{ActiveHint, HintBoard};
pub use policy::{decide, Decision, HintState};
pub use probe::{assess_network, NetworkProbe, TcpLatencyProbe};
