//! Vigil: a process-health monitoring agent.
//!
//! Probes HTTP endpoints on a fixed interval, restarts unhealthy processes
//! with bounded retries, watches CPU/memory and application logs, and
//! delivers alerts and a daily status report.
//!
//! See `DESIGN.md` for architecture notes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod credentials;
pub mod logging;

pub mod controller;
pub mod logsource;
pub mod sampler;
pub mod sink;

pub mod monitor;
