//! Template Repository
//!
//! SQLite-backed storage for form templates. Fields and settings are kept as
//! JSON text columns in the shape templates are exchanged in.

use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::db::{read_json, read_timestamp};
use super::query::{Page, PageRequest};
use super::traits::{Repository, SearchableRepository, TemplateStore};
use crate::domain::{timestamp, DomainError, DomainResult, FormTemplate};

const TEMPLATE_COLUMNS: &str = "id, name, description, fields, settings, created_at, updated_at";

/// SQLite implementation of the template store
pub struct TemplateRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TemplateRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }
}

fn query_templates(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> DomainResult<Vec<FormTemplate>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;

    let mut templates = Vec::new();
    while let Some(row) = rows.next()? {
        templates.push(row_to_template(row)?);
    }
    Ok(templates)
}

#[async_trait]
impl Repository<FormTemplate> for TemplateRepository {
    async fn create(&self, entity: &FormTemplate) -> DomainResult<FormTemplate> {
        let now = timestamp::now();
        let fields = serde_json::to_string(&entity.fields)?;
        let settings = serde_json::to_string(&entity.settings)?;

        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO form_templates (name, description, fields, settings, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entity.name,
                entity.description,
                fields,
                settings,
                timestamp::format(&now),
                timestamp::format(&now)
            ],
        )?;

        let mut created = entity.clone();
        created.id = Some(conn.last_insert_rowid());
        created.created_at = now;
        created.updated_at = now;
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> DomainResult<Option<FormTemplate>> {
        let sql = format!("SELECT {} FROM form_templates WHERE id = ?1", TEMPLATE_COLUMNS);
        let conn = self.conn.lock().await;
        Ok(query_templates(&conn, &sql, params![id])?.into_iter().next())
    }

    async fn list(&self) -> DomainResult<Vec<FormTemplate>> {
        let sql = format!("SELECT {} FROM form_templates ORDER BY id ASC", TEMPLATE_COLUMNS);
        let conn = self.conn.lock().await;
        query_templates(&conn, &sql, [])
    }

    async fn update(&self, entity: &FormTemplate) -> DomainResult<Option<FormTemplate>> {
        let id = entity
            .id
            .ok_or_else(|| DomainError::InvalidInput("Cannot update a template without an id".to_string()))?;
        let now = timestamp::now();
        let fields = serde_json::to_string(&entity.fields)?;
        let settings = serde_json::to_string(&entity.settings)?;

        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE form_templates SET name = ?1, description = ?2, fields = ?3, settings = ?4, updated_at = ?5
             WHERE id = ?6",
            params![entity.name, entity.description, fields, settings, timestamp::format(&now), id],
        )?;

        if changed == 0 {
            return Ok(None);
        }
        let mut updated = entity.clone();
        updated.updated_at = now;
        Ok(Some(updated))
    }

    async fn delete(&self, id: i64) -> DomainResult<()> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM form_templates WHERE id = ?1", params![id])?;
        Ok(())
    }
}

#[async_trait]
impl SearchableRepository<FormTemplate> for TemplateRepository {
    /// Case-insensitive substring match on name or description
    async fn search(&self, query: &str) -> DomainResult<Vec<FormTemplate>> {
        let needle = query.to_lowercase();
        let templates = self.list().await?;
        Ok(templates
            .into_iter()
            .filter(|t| {
                t.name.to_lowercase().contains(&needle) || t.description.to_lowercase().contains(&needle)
            })
            .collect())
    }
}

#[async_trait]
impl TemplateStore for TemplateRepository {
    async fn duplicate(&self, id: i64) -> DomainResult<FormTemplate> {
        let original = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Template with ID {} not found", id)))?;

        let mut copy = original;
        copy.id = None;
        copy.name = format!("{} (Copy)", copy.name);
        self.create(&copy).await
    }

    async fn list_page(&self, request: &PageRequest) -> DomainResult<Page<FormTemplate>> {
        let templates = self.list().await?;
        Ok(Page::build(templates, request))
    }
}

/// Convert a database row to FormTemplate
fn row_to_template(row: &rusqlite::Row) -> DomainResult<FormTemplate> {
    let created_at: String = row.get(5)?;
    let updated_at: String = row.get(6)?;

    Ok(FormTemplate {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        description: row.get(2)?,
        fields: read_json(row.get(3)?)?.unwrap_or_default(),
        settings: read_json(row.get(4)?)?.unwrap_or_default(),
        created_at: read_timestamp(&created_at)?,
        updated_at: read_timestamp(&updated_at)?,
    })
}
