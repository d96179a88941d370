//! Test result aggregation and publishing for Probe Dock collectors.
//!
//! This crate turns test-framework events into a run payload and publishes it:
//!
//! - Identity extraction from nested group/test metadata (keys, fingerprints, names)
//! - Grouped results merging several executions into one logical result
//! - Staleness cache so unchanged test descriptions are not resent
//! - Two wire formats and upload protocols, selected per server
//! - Correlation uid grouping several payloads into one report
//!
//! # Quick Start
//!
//! ```no_run
//! use probedock_client::{Collector, Config, Holder, Publisher};
//!
//! # async fn example() -> probedock_client::ProbeDockResult<()> {
//! let config = Config::load("probedock.yml").await?.apply_env_overrides();
//!
//! let mut collector = Collector::new(config.resolved_project());
//! collector.start();
//! collector.start_test();
//! collector.test_passed(&Holder::new("should work"));
//! collector.stop();
//!
//! let mut run = collector.finish();
//! let publisher = Publisher::new(config.selected_server(), config.publish_options())?;
//! let outcome = publisher.process(&mut run).await;
//! if !outcome.published {
//!     eprintln!("results were not published");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Workspace layout
//!
//! ```text
//! {workspace}/uid
//! {workspace}/servers/{server}/cache.json
//! {workspace}/servers/{server}/payload.json
//! ```

pub mod cache;
pub mod client;
pub mod collector;
pub mod config;
pub mod error;
pub mod identity;
mod io;
pub mod meta;
pub mod payload;
pub mod project;
pub mod publisher;
pub mod result;
pub mod run;
pub mod server;
pub mod uid;

// Re-export main types
pub use cache::{content_hash, CacheLoad, Freshness, PayloadCache};
pub use client::{HttpUploader, PayloadUploader};
pub use collector::{format_failure_message, Collector};
pub use config::{Config, PayloadSwitches};
pub use error::{ProbeDockError, ProbeDockResult, UploadResponse};
pub use identity::{fingerprint, TestIdentity};
pub use meta::{Holder, HolderMeta};
pub use payload::{Payload, PayloadOptions, ProtocolVersion};
pub use project::ProjectProfile;
pub use publisher::{Console, Notice, NoticeLevel, PublishOptions, PublishOutcome, Publisher};
pub use result::{TestResult, TestStatus};
pub use run::TestRun;
pub use server::{Credentials, ResolvedServer, ServerProfile};
pub use uid::{UidManager, UID_ENV_ALIAS, UID_ENV_VAR};
