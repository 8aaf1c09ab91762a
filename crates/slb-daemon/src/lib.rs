//! SLB Daemon - the long-lived local coordinator process.
//!
//! One daemon per project, listening on a Unix domain socket at a
//! deterministic runtime path derived from the project path. The wire
//! protocol is newline-delimited JSON-RPC 2.0; `subscribe` turns a
//! connection into a stream of `event` notifications until the client
//! closes or falls behind (`slow_consumer`).
//!
//! The daemon is optional. Its value-adds are the low-latency `hook_query`
//! answer (in-memory pattern engine plus an approved-request lookup) and
//! push-based events; when it is absent, clients fall back to direct store
//! access and polling.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod client;
mod error;
mod paths;
mod pidfile;
pub mod rpc;
mod server;

pub use client::DaemonClient;
pub use error::{DaemonError, DaemonResult};
pub use paths::{pidfile_path, runtime_dir, socket_path};
pub use pidfile::PidFile;
pub use server::{Daemon, DaemonContext, HookDecision};
