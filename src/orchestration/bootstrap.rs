//! # Tower Bootstrap
//!
//! Wires configuration, structured logging and the standard observers around
//! a tower and starts its event loop on the current runtime.

use super::tower::{Tower, TowerHandle};
use crate::config::ConfigManager;
use crate::events::{EventPublisher, PsFileDumper, TracingListener};
use crate::logging::init_structured_logging_with;
use crate::messaging::TowerMessaging;
use crate::planning::Planner;
use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Bootstrap options
#[derive(Debug, Clone, Default)]
pub struct BootstrapConfig {
    /// Custom configuration directory (None = `./config`)
    pub config_directory: Option<PathBuf>,
    /// Environment override (None = auto-detect)
    pub environment_override: Option<String>,
}

/// System status information
#[derive(Debug, Clone)]
pub struct SystemStatus {
    pub running: bool,
    pub environment: String,
    pub event_subscribers: usize,
    pub ps_log_dir: Option<PathBuf>,
}

/// Handle on a running tower and its observers
pub struct TowerSystemHandle {
    pub tower: TowerHandle,
    pub events: EventPublisher,
    pub config_manager: Arc<ConfigManager>,
    join: Option<JoinHandle<()>>,
}

impl TowerSystemHandle {
    pub fn is_running(&self) -> bool {
        self.join.as_ref().is_some_and(|join| !join.is_finished())
    }

    pub fn status(&self) -> SystemStatus {
        SystemStatus {
            running: self.is_running(),
            environment: self.config_manager.environment().to_string(),
            event_subscribers: self.events.subscriber_count(),
            ps_log_dir: self.config_manager.config().logging.ps_log_dir.clone(),
        }
    }

    /// Stop the event loop and wait for it to finish
    pub async fn stop(&mut self) -> anyhow::Result<()> {
        let Some(join) = self.join.take() else {
            warn!("Tower already stopped");
            return Ok(());
        };
        if self.tower.shutdown().is_err() {
            warn!("Tower loop already gone");
        }
        join.await.context("tower event loop panicked")?;
        info!("Tower shut down");
        Ok(())
    }
}

/// Tower system bootstrapper
pub struct TowerBootstrap;

impl TowerBootstrap {
    /// Load configuration and start a tower with the bundled planner
    pub async fn bootstrap(
        messaging: Arc<dyn TowerMessaging>,
        config: BootstrapConfig,
    ) -> anyhow::Result<TowerSystemHandle> {
        let config_manager = match &config.environment_override {
            Some(environment) => {
                ConfigManager::load_from_directory_with_env(config.config_directory.clone(), environment)
            }
            None => ConfigManager::load_from_directory(config.config_directory.clone()),
        }
        .context("failed to load tower configuration")?;

        Self::start_with_config(messaging, config_manager, None)
    }

    /// Start a tower from an already loaded configuration
    pub fn start_with_config(
        messaging: Arc<dyn TowerMessaging>,
        config_manager: Arc<ConfigManager>,
        planner: Option<Arc<dyn Planner>>,
    ) -> anyhow::Result<TowerSystemHandle> {
        let config = config_manager.config().clone();
        init_structured_logging_with(config.logging.json);

        let events = EventPublisher::new(config.events.capacity);
        let mut builder = Tower::builder(config.clone())
            .listener(TracingListener)
            .listener(events.clone());

        if let Some(dir) = &config.logging.ps_log_dir {
            let dumper = PsFileDumper::new(dir)
                .with_context(|| format!("cannot prepare PS log directory {}", dir.display()))?;
            builder = builder.listener(dumper);
        }
        if let Some(planner) = planner {
            builder = builder.planner(planner);
        }

        let (tower, join) = builder.spawn(messaging);
        info!(
            environment = %config_manager.environment(),
            comms_timeout_ms = config.timing.comms_timeout_ms,
            "Tower system started"
        );

        Ok(TowerSystemHandle {
            tower,
            events,
            config_manager,
            join: Some(join),
        })
    }
}

/// Start a tower with auto-detected configuration
pub async fn start_tower(messaging: Arc<dyn TowerMessaging>) -> anyhow::Result<TowerSystemHandle> {
    TowerBootstrap::bootstrap(messaging, BootstrapConfig::default()).await
}
