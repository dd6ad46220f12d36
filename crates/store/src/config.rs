//! Store configuration and connection bootstrap.
//!
//! Plain struct, no env/CLI parsing crate — the library is consumed
//! programmatically, never from a binary entry point of its own.

use std::time::Duration;

use mongodb::options::ClientOptions;
use mongodb::Client;
use tracing::{instrument, warn};
use vorfall_core::error::VorfallResult;
use vorfall_events::registry::ProjectionRegistry;
use vorfall_events::ProjectionDefinition;

use crate::stream_store::{map_mongo_error, StreamStore};

/// Configuration for a [`StreamStore`] connection.
#[derive(Clone)]
pub struct VorfallConfig {
    pub connection_string: String,
    pub database_name: String,
    pub projections: Vec<ProjectionDefinition>,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl VorfallConfig {
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            database_name: "default".to_string(),
            projections: Vec::new(),
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }

    pub fn with_database_name(mut self, database_name: impl Into<String>) -> Self {
        self.database_name = database_name.into();
        self
    }

    pub fn with_projections(mut self, projections: Vec<ProjectionDefinition>) -> Self {
        self.projections = projections;
        self
    }

    /// Connect with bounded linear backoff: `retry_delay_ms * attempt`
    /// between attempts, up to `max_retries`. This is the one retrying
    /// wrapper the core keeps — connection setup, not a reconnecting proxy
    /// around an established session.
    ///
    /// Also the library's de facto process entry point: it installs the
    /// shared tracing subscriber on first call so every later
    /// `#[instrument]`ed method actually has somewhere to send its spans.
    #[instrument(skip(self), fields(database = %self.database_name), err)]
    pub async fn connect(&self) -> VorfallResult<StreamStore> {
        vorfall_observability::init();

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.try_connect().await {
                Ok(store) => return Ok(store),
                Err(err) if attempt < self.max_retries.max(1) => {
                    warn!(attempt, %err, "vorfall connection attempt failed, retrying");
                    tokio::time::sleep(Duration::from_millis(self.retry_delay_ms * attempt as u64)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn try_connect(&self) -> VorfallResult<StreamStore> {
        let options = ClientOptions::parse(&self.connection_string).await.map_err(map_mongo_error)?;
        let client = Client::with_options(options).map_err(map_mongo_error)?;
        let database = client.database(&self.database_name);
        let registry = ProjectionRegistry::new(self.projections.clone());
        Ok(StreamStore::new(client, database, registry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_configuration() {
        let config = VorfallConfig::new("mongodb://localhost:27017");
        assert_eq!(config.database_name, "default");
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay_ms, 1000);
        assert!(config.projections.is_empty());
    }

    #[test]
    fn builder_methods_override_defaults() {
        let config = VorfallConfig::new("mongodb://localhost:27017").with_database_name("events");
        assert_eq!(config.database_name, "events");
    }
}
