//! Repository manager: one backend, its catalog and its cache.

use super::context::Context;
use super::repository::Repository;
use crate::catalog::ModelDef;
use crate::config::Configuration;
use crate::error::{Error, Result};
use crate::storage::DataConnector;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, instrument};

/// Entry point of the data-access layer.
///
/// Owns one open driver, the model catalog and the identity map behind a
/// single lock. Cloning is cheap and every clone shares the same context.
///
/// # Example
///
/// ```rust,no_run
/// use dataconn_core::{Configuration, FieldDef, ModelDef, RepositoryManager};
///
/// let config = Configuration::for_driver("sqlite3", "data.db");
/// let manager = RepositoryManager::connect(&config)?;
/// let users = manager.record_model(
///     ModelDef::new("User")
///         .with_field(FieldDef::string("username").max_length(30))
///         .with_field(FieldDef::string("password")),
/// )?;
/// let user = users.create([("username", "Kredh"), ("password", "fore123")])?;
/// let found = users.query().filter("username = ?", "Kredh")?.first()?;
/// assert!(found.is_some_and(|found| found.is(&user)));
/// # Ok::<(), dataconn_core::Error>(())
/// ```
#[derive(Clone)]
pub struct RepositoryManager {
    context: Arc<Mutex<Context>>,
}

impl RepositoryManager {
    /// Open `connector` with `config`.
    #[instrument(skip_all, fields(driver = connector.driver.name()))]
    pub fn new(mut connector: DataConnector, config: &Configuration) -> Result<Self> {
        connector.driver.open(config)?;
        info!("Repository manager ready");
        Ok(Self {
            context: Arc::new(Mutex::new(Context::new(connector))),
        })
    }

    /// Open the driver named by the configuration's `driver` key.
    pub fn connect(config: &Configuration) -> Result<Self> {
        let connector = DataConnector::by_name(config.driver()?)?;
        Self::new(connector, config)
    }

    /// Record one model and create its table.
    pub fn record_model(&self, model: ModelDef) -> Result<Repository> {
        let mut repositories = self.record_models(vec![model])?;
        repositories
            .pop()
            .ok_or_else(|| Error::Schema("no model recorded".into()))
    }

    /// Record models that refer to each other.
    pub fn record_models(&self, models: Vec<ModelDef>) -> Result<Vec<Repository>> {
        let recorded = self.context.lock().record(models)?;
        Ok(recorded
            .into_iter()
            .map(|model| Repository::new(model, self.context.clone()))
            .collect())
    }

    /// The repository of a recorded model.
    pub fn repository(&self, name: &str) -> Result<Repository> {
        let model = self.context.lock().model(name)?;
        Ok(Repository::new(model, self.context.clone()))
    }

    /// Names of the recorded models, in registration order.
    pub fn models(&self) -> Vec<String> {
        self.context
            .lock()
            .catalog
            .models()
            .map(|m| m.name().to_string())
            .collect()
    }

    /// Name of the driver in use.
    pub fn driver_name(&self) -> &'static str {
        self.context.lock().connector.driver.name()
    }

    /// Flush deferred writes.
    pub fn save(&self) -> Result<()> {
        self.context.lock().connector.driver.save()
    }

    /// Remove every stored line. Cached objects become stale.
    pub fn clear(&self) -> Result<()> {
        let mut context = self.context.lock();
        context.connector.driver.clear()?;
        context.forget_objects();
        Ok(())
    }

    /// Flush and release the backend.
    pub fn close(&self) -> Result<()> {
        let mut context = self.context.lock();
        context.connector.driver.close()?;
        context.forget_objects();
        Ok(())
    }

    /// Erase all stored data and release the backend.
    pub fn destroy(&self) -> Result<()> {
        let mut context = self.context.lock();
        context.connector.driver.destroy()?;
        context.forget_objects();
        Ok(())
    }
}

impl std::fmt::Debug for RepositoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryManager")
            .field("driver", &self.driver_name())
            .field("models", &self.models())
            .finish()
    }
}
