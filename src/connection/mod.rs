//! Connection negotiation: one-shot establishment of a working transport.
//!
//! The negotiator tries the wire paths in order (control-plane probe
//! first, then the per-index host), creating the index on the way when it
//! does not exist yet. Every establishment outcome is recorded on the
//! shared [`ConnectionHealth`], which is what eventually arms degraded mode
//! in constrained deployments.

mod health;

#[cfg(test)]
mod tests;

pub use health::{
    ConnectionHealth, HealthSnapshot, Route, DEFAULT_GRACE_WINDOW, FAILURE_THRESHOLD,
};

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::{ConfigError, StoreConfig};
use crate::remote::{ControlPlaneTransport, IndexHostTransport, VectorTransport};
use crate::transport::{HttpTransport, TransportError};

#[derive(Debug, Error)]
pub enum ConnectError {
    /// Fatal; surfaced before any transport attempt.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// The HTTP client itself could not be constructed.
    #[error("HTTP client error: {reason}")]
    Client { reason: String },

    /// One wire path's probe failed; folded into [`ConnectError::NoPath`]
    /// unless the other path succeeds.
    #[error("{kind} probe failed: {reason}")]
    Probe { kind: &'static str, reason: String },

    /// Index creation failed. Fatal for this call but poisons nothing; a
    /// later establishment starts from scratch.
    #[error("Index creation failed: {reason}")]
    IndexCreation { reason: String },

    /// Both wire paths failed.
    #[error("No transport path available (control-plane: {control_plane}; index-host: {index_host})")]
    NoPath {
        control_plane: String,
        index_host: String,
    },
}

/// Tries the wire paths in order and yields the first that answers.
///
/// Safe to call repeatedly: it holds no background tasks and reuses one
/// HTTP client, so a manual "retry connection" never stacks resources.
#[derive(Debug)]
pub struct Negotiator {
    config: StoreConfig,
    http: HttpTransport,
}

impl Negotiator {
    pub fn new(config: StoreConfig) -> Result<Self, ConnectError> {
        config.validate()?;
        let http = HttpTransport::new(
            config.api_key.clone(),
            config.retry.clone(),
            config.connect_timeout,
        )
        .map_err(|err| ConnectError::Client {
            reason: err.to_string(),
        })?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Runs the strategy sequence once and records the outcome on `health`.
    ///
    /// Success marks the connection available and resets the failure
    /// counter. A failure of both paths counts toward the temporary-failure
    /// threshold; an index-creation failure does not, because the control
    /// plane demonstrably answered.
    pub async fn establish(
        &self,
        health: &ConnectionHealth,
    ) -> Result<Arc<dyn VectorTransport>, ConnectError> {
        match self.try_paths().await {
            Ok(transport) => {
                health.record_success();
                info!(
                    "Vector store transport established via {} (index '{}', namespace '{}')",
                    transport.kind().as_str(),
                    self.config.index_name,
                    self.config.namespace
                );
                Ok(transport)
            }
            Err(err) => {
                if matches!(err, ConnectError::NoPath { .. }) {
                    let failures = health.record_failure();
                    debug!("Negotiation failed ({} consecutive): {}", failures, err);
                }
                Err(err)
            }
        }
    }

    async fn try_paths(&self) -> Result<Arc<dyn VectorTransport>, ConnectError> {
        let control_error = match self.try_control_plane().await {
            Ok(transport) => return Ok(transport),
            Err(err @ ConnectError::IndexCreation { .. }) => return Err(err),
            Err(err) => err.to_string(),
        };
        debug!(
            "Control-plane path failed, trying the index host: {}",
            control_error
        );

        let host_error = match self.try_index_host().await {
            Ok(transport) => return Ok(transport),
            Err(err) => err.to_string(),
        };
        Err(ConnectError::NoPath {
            control_plane: control_error,
            index_host: host_error,
        })
    }

    /// Control-plane strategy: list indexes, create the target when absent,
    /// then use the control-plane path style.
    async fn try_control_plane(&self) -> Result<Arc<dyn VectorTransport>, ConnectError> {
        let control = self.control_plane();
        let indexes = control
            .list_indexes()
            .await
            .map_err(probe_error("control-plane"))?;
        if !indexes.iter().any(|name| name == &self.config.index_name) {
            // The listing can lag an asynchronous creation; only create once
            // the per-index endpoint confirms the index is really absent.
            let exists = control
                .describe_index()
                .await
                .map_err(probe_error("control-plane"))?;
            if !exists {
                self.ensure_index(&control).await?;
            }
        }
        Ok(Arc::new(control))
    }

    /// Index-host strategy: resolve the conventional data-plane host and
    /// confirm it answers stats.
    async fn try_index_host(&self) -> Result<Arc<dyn VectorTransport>, ConnectError> {
        let host = IndexHostTransport::new(
            self.http.clone(),
            IndexHostTransport::host_for(&self.config.index_name, &self.config.environment),
        );
        host.stats().await.map_err(probe_error("index-host"))?;
        Ok(Arc::new(host))
    }

    /// Creates the index and lets asynchronous creation settle.
    async fn ensure_index(&self, control: &ControlPlaneTransport) -> Result<(), ConnectError> {
        info!(
            "Index '{}' not found, creating it (dimension {}, metric {})",
            self.config.index_name,
            self.config.dimension,
            self.config.metric.as_str()
        );
        control
            .create_index(self.config.dimension, self.config.metric.as_str())
            .await
            .map_err(|err| ConnectError::IndexCreation {
                reason: err.to_string(),
            })?;
        tokio::time::sleep(self.config.create_grace).await;
        Ok(())
    }

    fn control_plane(&self) -> ControlPlaneTransport {
        ControlPlaneTransport::new(
            self.http.clone(),
            self.config.api_base.clone(),
            self.config.index_name.clone(),
        )
    }
}

fn probe_error(kind: &'static str) -> impl FnOnce(TransportError) -> ConnectError {
    move |err| ConnectError::Probe {
        kind,
        reason: err.to_string(),
    }
}
