//! Destination sinks
//!
//! Each handler forwards one finished response to an external sink described
//! by the destination's opaque JSON config.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::info;
use rusqlite::{params, Connection};
use serde_json::Value;

use crate::domain::{timestamp, DestinationKind, DomainError, DomainResult, FormDestination, FormResponse};
use crate::validation::is_empty_value;

#[async_trait]
pub trait DestinationHandler: Send + Sync {
    async fn deliver(&self, response: &FormResponse, destination: &FormDestination) -> DomainResult<()>;
}

fn required_config<'a>(destination: &'a FormDestination, key: &str) -> DomainResult<&'a str> {
    destination
        .config_str(key)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            DomainError::InvalidInput(format!("Destination {} is missing config.{}", destination.name, key))
        })
}

fn response_label(response: &FormResponse) -> String {
    response
        .id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "unsaved".to_string())
}

/// Records the delivery; there is no mail transport on device
#[derive(Debug, Default)]
pub struct EmailHandler;

#[async_trait]
impl DestinationHandler for EmailHandler {
    async fn deliver(&self, response: &FormResponse, destination: &FormDestination) -> DomainResult<()> {
        let recipient = required_config(destination, "recipient")?;
        info!(
            "Email delivery of response {} to {} ({} answers)",
            response_label(response),
            recipient,
            response.data.len()
        );
        Ok(())
    }
}

/// POSTs the response JSON to `config.url`
pub struct ApiHandler {
    client: reqwest::Client,
    timeout: Duration,
}

impl ApiHandler {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl DestinationHandler for ApiHandler {
    async fn deliver(&self, response: &FormResponse, destination: &FormDestination) -> DomainResult<()> {
        let url = required_config(destination, "url")?;
        let payload = serde_json::to_string(response)?;

        let mut request = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .body(payload)
            .timeout(self.timeout);
        if let Some(Value::Object(headers)) = destination.config.get("headers") {
            for (name, value) in headers {
                if let Some(value) = value.as_str() {
                    request = request.header(name.as_str(), value);
                }
            }
        }

        let resp = request.send().await?;
        if resp.status().is_success() {
            info!("Response {} delivered to {}", response_label(response), url);
            Ok(())
        } else {
            Err(DomainError::Network(format!("API returned HTTP {}", resp.status())))
        }
    }
}

/// Appends the response to `form_responses_export` in the SQLite file at `config.connectionString`
#[derive(Debug, Default)]
pub struct DatabaseHandler;

fn export_to_sqlite(path: &str, response: &FormResponse) -> DomainResult<()> {
    let conn = Connection::open(path)?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS form_responses_export (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            response_id INTEGER,
            form_template_id INTEGER NOT NULL,
            payload TEXT NOT NULL,
            exported_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "INSERT INTO form_responses_export (response_id, form_template_id, payload, exported_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            response.id,
            response.form_template_id,
            serde_json::to_string(response)?,
            timestamp::format(&timestamp::now())
        ],
    )?;
    Ok(())
}

#[async_trait]
impl DestinationHandler for DatabaseHandler {
    async fn deliver(&self, response: &FormResponse, destination: &FormDestination) -> DomainResult<()> {
        let path = required_config(destination, "connectionString")?.to_string();
        let response = response.clone();

        let label = response_label(&response);
        let target = path.clone();
        tokio::task::spawn_blocking(move || export_to_sqlite(&path, &response))
            .await
            .map_err(|e| DomainError::Unknown(format!("Export task failed: {}", e)))??;

        info!("Response {} exported to {}", label, target);
        Ok(())
    }
}

/// Writes `response-<id>.<format>` into `config.directory`
#[derive(Debug, Default)]
pub struct FileHandler;

impl FileHandler {
    /// `json` (pretty) or `csv` (header of field names plus one row)
    pub fn render(response: &FormResponse, format: &str) -> DomainResult<Vec<u8>> {
        match format {
            "json" => Ok(serde_json::to_vec_pretty(response)?),
            "csv" => {
                let mut writer = csv::Writer::from_writer(Vec::new());
                writer
                    .write_record(response.data.keys())
                    .map_err(|e| DomainError::Unknown(e.to_string()))?;
                writer
                    .write_record(response.data.values().map(csv_cell))
                    .map_err(|e| DomainError::Unknown(e.to_string()))?;
                writer
                    .into_inner()
                    .map_err(|e| DomainError::Unknown(e.to_string()))
            }
            other => Err(DomainError::InvalidInput(format!("Unsupported file format: {}", other))),
        }
    }
}

fn csv_cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
            .collect::<Vec<_>>()
            .join(";"),
        other if is_empty_value(Some(other)) => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl DestinationHandler for FileHandler {
    async fn deliver(&self, response: &FormResponse, destination: &FormDestination) -> DomainResult<()> {
        let directory = PathBuf::from(required_config(destination, "directory")?);
        let format = destination.config_str("format").unwrap_or("json").to_lowercase();
        let bytes = Self::render(response, &format)?;

        tokio::fs::create_dir_all(&directory).await?;
        let path = directory.join(format!("response-{}.{}", response_label(response), format));
        tokio::fs::write(&path, bytes).await?;

        info!("Response {} written to {}", response_label(response), path.display());
        Ok(())
    }
}

/// Handlers by destination type name
#[derive(Clone, Default)]
pub struct DestinationRegistry {
    handlers: HashMap<String, Arc<dyn DestinationHandler>>,
}

impl DestinationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Email, API, database and file handlers
    pub fn with_defaults(api_timeout: Duration) -> Self {
        Self::new()
            .register(DestinationKind::Email, Arc::new(EmailHandler))
            .register(DestinationKind::Api, Arc::new(ApiHandler::new(api_timeout)))
            .register(DestinationKind::Database, Arc::new(DatabaseHandler))
            .register(DestinationKind::File, Arc::new(FileHandler))
    }

    pub fn register(mut self, kind: DestinationKind, handler: Arc<dyn DestinationHandler>) -> Self {
        self.handlers.insert(kind.as_str().to_string(), handler);
        self
    }

    pub fn handler_for(&self, kind: &DestinationKind) -> Option<Arc<dyn DestinationHandler>> {
        self.handlers.get(kind.as_str()).cloned()
    }
}
