//! Conversion configuration.
//!
//! The embedding process constructs a [`ConvertConfig`] explicitly and hands
//! it to the service; nothing here reads globals. The struct is serializable
//! because it also travels to the sandboxed worker process as part of the job
//! request.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::render::DEFAULT_LONG_EDGE;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertConfig {
    /// Directory where source uploads live and rendered artifacts are written.
    pub asset_dir: PathBuf,
    /// URL prefix under which files in `asset_dir` are served.
    pub asset_url_base: String,
    /// Target size in pixels for the longer edge of the largest variant.
    pub desired_long_edge: u32,
    /// Number of concurrent conversion workers on the queue. The queue
    /// clamps this to a minimum of one worker.
    pub worker_count: usize,
}

impl ConvertConfig {
    pub fn new(asset_dir: impl Into<PathBuf>) -> Self {
        Self {
            asset_dir: asset_dir.into(),
            asset_url_base: "/assets".to_string(),
            desired_long_edge: DEFAULT_LONG_EDGE,
            worker_count: 2,
        }
    }

    /// Create the asset directory if it does not exist yet.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.asset_dir)
    }

    /// Public URL for a file inside the asset directory.
    pub fn asset_url(&self, file_name: &str) -> String {
        format!("{}/{}", self.asset_url_base.trim_end_matches('/'), file_name)
    }
}
