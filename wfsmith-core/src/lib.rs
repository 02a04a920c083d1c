//! wfsmith core library: workflow-trace fingerprinting, microstructure
//! detection, and synthetic DAG growth.
//!
//! The pipeline runs one way: a decoded [`graph::TaskGraph`] is annotated
//! by [`annotate::annotate`], a family of annotated graphs feeds
//! [`detect::analyze_family`], the resulting [`catalog::Catalog`] is
//! persisted, and [`synthesize::synthesize`] grows a base graph from it to
//! an arbitrary target size.

pub mod annotate;
pub mod catalog;
pub mod config;
pub mod detect;
pub mod error;
pub mod graph;
pub mod hash;
pub mod interpolate;
pub mod synthesize;
pub mod trace;

pub use error::{Result, WfsmithError};
