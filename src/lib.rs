//! Resumable batch audio enhancement
//!
//! Uploads every not-yet-enhanced audio file in a source directory to a remote
//! enhancement service, waits for each job, downloads the result, and appends
//! the per-file outcome to a CSV status log. Re-running picks up whatever has
//! no artifact in the output directory yet.

pub mod app_state;
pub mod config;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod startup;
