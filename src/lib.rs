//! Orchestration of iCLIP demultiplexing and group analysis on a Resolwe server.
//!
//! The engine ([`polling`], [`collections`], [`classify`], [`group`]) only sees
//! the [`remote::RemoteJobClient`] trait; [`pipeline`] wires it into the two
//! end-to-end flows driven by the `iclip-demultiplex` and
//! `iclip-group-analysis` binaries.

/// Application directory resolution.
pub mod app_dirs;
pub mod classify;
/// Command-line parsing shared by the binaries.
pub mod cli;
pub mod collections;
pub mod config;
pub mod descriptor;
pub mod group;
mod http_client;
pub mod logging;
pub mod pipeline;
pub mod polling;
pub mod remote;
