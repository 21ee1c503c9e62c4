//! File service module for Novalink
//!
//! Greets a file client with the catalog of the configured directory and
//! then serves `GET_FILE` downloads until the client disconnects.

mod catalog;
mod session;
mod transfer;

pub use catalog::{list_files, resolve_file};
pub use session::FileSession;
pub use transfer::Transfer;

use crate::config::FilesConfig;
use crate::services::{ServiceHandler, StreamDyn};
use anyhow::Result;

/// File service handler implementing the [`ServiceHandler`] trait.
#[derive(Debug, Clone)]
pub struct FileServiceHandler {
    config: FilesConfig,
}

impl FileServiceHandler {
    /// Create a new file service handler with the given configuration.
    pub fn new(config: FilesConfig) -> Self {
        Self { config }
    }

    /// Get a reference to the file service configuration.
    pub fn config(&self) -> &FilesConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl ServiceHandler for FileServiceHandler {
    fn service_type(&self) -> &str {
        "files"
    }

    async fn handle_tcp_stream(&self, stream: Box<dyn StreamDyn>) -> Result<()> {
        FileSession::new(stream, &self.config).run().await
    }

    fn validate(&self) -> Result<()> {
        if !self.config.dir.is_dir() {
            tracing::warn!(
                "File directory {:?} does not exist; clients will see an empty listing",
                self.config.dir
            );
        }
        self.config.validate().map_err(|e| anyhow::anyhow!(e))
    }
}
