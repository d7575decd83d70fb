//! # Runtime
//!
//! Process startup and the watch loop that feeds Kubernetes objects into the
//! collector.

pub mod initialization;
pub mod watch_loop;
