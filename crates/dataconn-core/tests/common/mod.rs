//! Shared fixtures for the backend scenario suites.

#![allow(dead_code)]

use dataconn_core::{Configuration, FieldDef, ModelDef, RepositoryManager, Value};
use tempfile::TempDir;

/// A repository manager over a temporary directory.
pub struct TestBackend {
    pub manager: RepositoryManager,
    pub config: Configuration,
    pub dir: TempDir,
}

impl TestBackend {
    pub fn open(driver: &str) -> Self {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let location = match driver {
            "yaml" => dir.path().join("tables"),
            "sled" => dir.path().join("store"),
            _ => dir.path().join("data.db"),
        };
        let config = Configuration::for_driver(driver, location);
        let manager = RepositoryManager::connect(&config).unwrap();
        Self {
            manager,
            config,
            dir,
        }
    }

    /// Close the backend and connect again with an empty catalog.
    pub fn reopen(&mut self) {
        self.manager.close().unwrap();
        self.manager = RepositoryManager::connect(&self.config).unwrap();
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn user_model() -> ModelDef {
    ModelDef::new("User")
        .with_field(FieldDef::string("username").required().max_length(30))
        .with_field(FieldDef::string("password"))
}

pub fn product_model() -> ModelDef {
    ModelDef::new("Product")
        .with_field(FieldDef::string("name").required())
        .with_field(FieldDef::integer("price").with_default(0))
        .with_field(FieldDef::integer("quantity").with_default(1))
        .with_field(FieldDef::integer("total").with_computed_default(|line| {
            let price = line.get("price").and_then(Value::as_i64).unwrap_or(0);
            let quantity = line.get("quantity").and_then(Value::as_i64).unwrap_or(0);
            Value::Int64(price * quantity)
        }))
}

pub fn setting_model() -> ModelDef {
    ModelDef::bare("Setting")
        .with_field(FieldDef::string("key").pkey())
        .with_field(FieldDef::string("value"))
}

pub fn group_and_user() -> Vec<ModelDef> {
    vec![
        ModelDef::new("Group")
            .with_field(FieldDef::string("name"))
            .with_field(FieldDef::has_many("users", "User")),
        ModelDef::new("User")
            .with_field(FieldDef::string("username"))
            .with_field(FieldDef::has_one("group", "Group")),
    ]
}

/// Run each scenario function against every driver.
macro_rules! backend_tests {
    ($($scenario:ident),* $(,)?) => {
        mod sqlite {
            $(
                #[test]
                fn $scenario() {
                    super::$scenario("sqlite3");
                }
            )*
        }

        mod document {
            $(
                #[test]
                fn $scenario() {
                    super::$scenario("sled");
                }
            )*
        }

        mod yaml {
            $(
                #[test]
                fn $scenario() {
                    super::$scenario("yaml");
                }
            )*
        }
    };
}
