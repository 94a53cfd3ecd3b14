//! Main application orchestration.
//!
//! Runs the reconnect loop on the current task until a shutdown signal
//! arrives, then performs the final flush so buffered bars are not lost.

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::reconnect::ReconnectLoop;
use barstream_core::SYMBOL;
use barstream_feed::{BarSource, PolygonConnector};
use barstream_persistence::CsvBarWriter;
use std::future::Future;
use tracing::{error, info};

/// Main application.
pub struct Application {
    config: AppConfig,
    source: Box<dyn BarSource>,
    reconnect: ReconnectLoop,
    writer: CsvBarWriter,
}

impl Application {
    /// Create the application with the Polygon connector.
    ///
    /// Fails if the API key environment variable is unset.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let connector = PolygonConnector::from_env(&config.ws_url, &config.api_key_env)?;
        info!(url = %connector.url(), "Polygon connector configured");
        Self::with_source(config, Box::new(connector))
    }

    /// Create the application with an arbitrary bar source.
    pub fn with_source(config: AppConfig, source: Box<dyn BarSource>) -> AppResult<Self> {
        config.validate()?;

        std::fs::create_dir_all(&config.data_dir)?;

        let writer = CsvBarWriter::new(&config.data_dir, SYMBOL);
        let reconnect = ReconnectLoop::new(config.reconnect_delay());

        Ok(Self {
            config,
            source,
            reconnect,
            writer,
        })
    }

    /// Handle to the reconnect loop, for observing its state.
    pub fn reconnect_loop(&self) -> ReconnectLoop {
        self.reconnect.clone()
    }

    /// Run until Ctrl-C.
    pub async fn run(self) -> AppResult<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(?e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until `shutdown` completes, then flush what is buffered.
    pub async fn run_until<F>(mut self, shutdown: F) -> AppResult<()>
    where
        F: Future<Output = ()>,
    {
        info!(
            symbol = SYMBOL,
            data_dir = %self.config.data_dir,
            reconnect_delay_ms = self.config.reconnect_delay_ms,
            threshold = self.writer.threshold(),
            "Starting {} data streaming service",
            SYMBOL
        );

        let loop_result = tokio::select! {
            result = self.reconnect.run(self.source.as_ref(), SYMBOL, &mut self.writer) => Some(result),
            () = shutdown => None,
        };

        match loop_result {
            None => {
                let saved = self.writer.flush();
                info!(saved, pending = self.writer.len(), "Service stopped by user");
                Ok(())
            }
            Some(Ok(never)) => match never {},
            Some(Err(e)) => {
                error!(?e, "Fatal error");
                let saved = self.writer.flush();
                info!(saved, "Final flush after fatal error");
                Err(e)
            }
        }
    }
}
