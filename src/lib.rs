//! Routine Engage - On-device engagement scoring for routine practice sessions
//!
//! Engage samples a live camera stream at a fixed cadence, measures how much
//! the scene changed between consecutive downsampled frames, and turns the
//! per-session counters into practice and test scores:
//! frame sampling → motion estimation → session accumulation → scoring.
//!
//! ## Modules
//!
//! - **Capture**: [`sampler`], [`motion`], [`session`], driven by a
//!   [`scheduler::FrameScheduler`] and a [`clock::Clock`]
//! - **Scoring**: [`scoring`] formulas, [`summary`] records, [`history`] trends
//! - **Host integration**: [`flow`] screen state machine, [`pipeline`] result
//!   processing, [`store`] persistence boundary, [`ffi`] C bindings

pub mod clock;
pub mod config;
pub mod error;
pub mod flow;
pub mod history;
pub mod motion;
pub mod pipeline;
pub mod sampler;
pub mod scheduler;
pub mod scoring;
pub mod session;
pub mod store;
pub mod summary;
pub mod timer;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::EngageConfig;
pub use error::EngageError;
pub use flow::{ScreenFlow, SessionMode};
pub use pipeline::{practice_summary_json, test_result_json, EngagementProcessor};
pub use session::PracticeSession;
pub use types::{PerformanceTier, PracticeMetrics, PracticeSummary, TestResult};

/// Engine version
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "routine-engage";
