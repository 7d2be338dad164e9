use crate::config::LoggerConfig;
use crate::error::{ConfigError, SupervisorError};
use crate::sink::SinkSet;
use crate::status::StatusBoard;
use crate::transport::Connector;
use crate::worker::{ConnectionWorker, EndpointSinks};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;

/// Opens the sinks, starts one worker per enabled endpoint and waits for them.
pub struct Supervisor {
    config: LoggerConfig,
    connector: Arc<dyn Connector>,
    status: StatusBoard,
}

impl Supervisor {
    pub fn new(config: LoggerConfig, connector: Arc<dyn Connector>, status: StatusBoard) -> Self {
        Self {
            config,
            connector,
            status,
        }
    }

    /// Validate the configuration, open every sink and build the workers.
    ///
    /// Nothing touches the output directory unless validation passes.
    pub fn build_workers(&self) -> Result<Vec<ConnectionWorker>, ConfigError> {
        self.config.validate()?;
        let sinks = SinkSet::open_all(&self.config.out_dir)?;
        self.workers_for(&sinks)
    }

    /// One worker per enabled endpoint, each holding only the sinks of its role.
    pub fn workers_for(&self, sinks: &SinkSet) -> Result<Vec<ConnectionWorker>, ConfigError> {
        self.config
            .enabled_endpoints()
            .map(|endpoint| {
                let authorized = EndpointSinks::for_role(&endpoint.role, sinks).ok_or_else(|| {
                    ConfigError::Invalid {
                        field: "endpoints",
                        reason: format!("{}: sink for its role is not open", endpoint.name),
                    }
                })?;
                Ok(ConnectionWorker::new(
                    endpoint,
                    &self.config,
                    Arc::clone(&self.connector),
                    authorized,
                    self.status.clone(),
                ))
            })
            .collect()
    }

    /// Run every worker until shutdown.
    ///
    /// Returns the first sink failure or crashed worker. The remaining
    /// workers are aborted at that point.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<(), SupervisorError> {
        let workers = self.build_workers()?;
        Self::run_workers(workers, shutdown).await
    }

    pub async fn run_workers(
        workers: Vec<ConnectionWorker>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), SupervisorError> {
        let mut tasks = JoinSet::new();
        for worker in workers {
            log::info!("Starting worker {}", worker.name());
            tasks.spawn(worker.run(shutdown.clone()));
        }

        while let Some(joined) = tasks.join_next().await {
            let failure = match joined {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => SupervisorError::Worker(e),
                Err(e) => SupervisorError::Panicked(e.to_string()),
            };
            log::error!("{}", failure);
            tasks.abort_all();
            return Err(failure);
        }

        log::info!("All workers stopped");
        Ok(())
    }
}
