//! OSPulse - Object storage load-generation harness
//!
//! OSPulse drives concurrent PUT/GET/DELETE workloads against an object
//! storage endpoint, measures per-operation latency and aggregate throughput,
//! and reports results in a format comparable across runs and across
//! independently-started client hosts.
//!
//! # Architecture
//!
//! - **Worker pool**: one OS thread per worker, each with its own connection
//! - **Synchronized start**: multiple client hosts begin at one epoch instant
//! - **Deterministic addressing**: collision-free keyspace partitioning
//!   across ranks and workers
//! - **Comprehensive stats**: fixed-bucket latency histograms, global median,
//!   per-batch CPU utilization

pub mod addressing;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod output;
pub mod stats;
pub mod util;
pub mod worker;

// Re-export commonly used types
pub use config::RunConfig;
pub use stats::{LatencyHistogram, WorkerOutcome, WorkerResult};

/// Result type used throughout OSPulse
pub type Result<T> = anyhow::Result<T>;
