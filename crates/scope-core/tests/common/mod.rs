//! Shared fixtures for scope-core tests

#![allow(dead_code)]

use scope_core::{ConfigService, Configuration};
use scope_model::TypeSchema;
use scope_store::ConfigStorage;
use scope_test_utils::fixtures::app_schemas;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Database {
    pub host: String,
    pub port: u16,
}

impl Default for Database {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct App {
    pub theme: String,
    pub retries: u32,
    pub telemetry: bool,
    pub region: String,
    pub features: BTreeSet<String>,
    pub database: Database,
}

impl Default for App {
    fn default() -> Self {
        Self {
            theme: "light".to_string(),
            retries: 3,
            telemetry: true,
            region: "eu".to_string(),
            features: BTreeSet::new(),
            database: Database::default(),
        }
    }
}

impl Configuration for App {
    fn schema() -> scope_model::Result<TypeSchema> {
        Ok(app_schemas().remove(0))
    }

    fn nested_schemas() -> scope_model::Result<Vec<TypeSchema>> {
        Ok(app_schemas().split_off(1))
    }
}

pub fn service(storage: Arc<dyn ConfigStorage>) -> ConfigService {
    ConfigService::builder(storage)
        .configuration::<App>()
        .unwrap()
        .build()
        .unwrap()
}
