//! Response Repository
//!
//! SQLite-backed storage for form responses. Answers and the device/location
//! snapshots are JSON text columns; timestamps are ISO-8601 text.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::db::{read_json, read_timestamp};
use super::query::{Page, ResponseQuery};
use super::traits::{Repository, ResponseStore};
use crate::domain::{
    timestamp, DomainError, DomainResult, FormResponse, ResponsePatch, ResponseStatus, Timestamp,
};

const RESPONSE_COLUMNS: &str = "id, form_template_id, data, status, created_at, updated_at, submitted_at, \
     offline_created, synced_at, device_info, location_data, meta";

/// SQLite implementation of the response store
pub struct ResponseRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ResponseRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }
}

fn query_responses(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> DomainResult<Vec<FormResponse>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;

    let mut responses = Vec::new();
    while let Some(row) = rows.next()? {
        responses.push(row_to_response(row)?);
    }
    Ok(responses)
}

fn load(conn: &Connection, id: i64) -> DomainResult<Option<FormResponse>> {
    let sql = format!("SELECT {} FROM form_responses WHERE id = ?1", RESPONSE_COLUMNS);
    Ok(query_responses(conn, &sql, params![id])?.into_iter().next())
}

fn status_of(conn: &Connection, id: i64) -> DomainResult<Option<ResponseStatus>> {
    let status: Option<String> = conn
        .query_row("SELECT status FROM form_responses WHERE id = ?1", params![id], |row| row.get(0))
        .optional()?;
    Ok(status.map(|s| ResponseStatus::from_str(&s)))
}

fn to_json<T: serde::Serialize>(value: &Option<T>) -> DomainResult<Option<String>> {
    value
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(DomainError::from)
}

fn format_opt(ts: &Option<Timestamp>) -> Option<String> {
    ts.as_ref().map(timestamp::format)
}

/// Write every mutable column of an existing row; returns the number of rows changed
fn store(conn: &Connection, id: i64, response: &FormResponse) -> DomainResult<usize> {
    let changed = conn.execute(
        "UPDATE form_responses SET form_template_id = ?1, data = ?2, status = ?3, updated_at = ?4,
             submitted_at = ?5, offline_created = ?6, synced_at = ?7, device_info = ?8,
             location_data = ?9, meta = ?10
         WHERE id = ?11",
        params![
            response.form_template_id,
            serde_json::to_string(&response.data)?,
            response.status.as_str(),
            timestamp::format(&response.updated_at),
            format_opt(&response.submitted_at),
            response.offline_created,
            format_opt(&response.synced_at),
            to_json(&response.device_info)?,
            to_json(&response.location_data)?,
            to_json(&response.meta)?,
            id
        ],
    )?;
    Ok(changed)
}

/// Load, patch and write back under one lock
fn patch_locked(conn: &Connection, id: i64, patch: &ResponsePatch) -> DomainResult<Option<FormResponse>> {
    let Some(mut response) = load(conn, id)? else {
        return Ok(None);
    };
    patch.apply_to(&mut response).map_err(DomainError::Conflict)?;
    response.updated_at = timestamp::now();
    store(conn, id, &response)?;
    Ok(Some(response))
}

#[async_trait]
impl Repository<FormResponse> for ResponseRepository {
    async fn create(&self, entity: &FormResponse) -> DomainResult<FormResponse> {
        let now = timestamp::now();
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO form_responses (form_template_id, data, status, created_at, updated_at,
                 submitted_at, offline_created, synced_at, device_info, location_data, meta)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                entity.form_template_id,
                serde_json::to_string(&entity.data)?,
                entity.status.as_str(),
                timestamp::format(&now),
                timestamp::format(&now),
                format_opt(&entity.submitted_at),
                entity.offline_created,
                format_opt(&entity.synced_at),
                to_json(&entity.device_info)?,
                to_json(&entity.location_data)?,
                to_json(&entity.meta)?
            ],
        )?;

        let mut created = entity.clone();
        created.id = Some(conn.last_insert_rowid());
        created.created_at = now;
        created.updated_at = now;
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> DomainResult<Option<FormResponse>> {
        let conn = self.conn.lock().await;
        load(&conn, id)
    }

    async fn list(&self) -> DomainResult<Vec<FormResponse>> {
        let sql = format!("SELECT {} FROM form_responses ORDER BY id ASC", RESPONSE_COLUMNS);
        let conn = self.conn.lock().await;
        query_responses(&conn, &sql, [])
    }

    async fn update(&self, entity: &FormResponse) -> DomainResult<Option<FormResponse>> {
        let id = entity
            .id
            .ok_or_else(|| DomainError::InvalidInput("Cannot update a response without an id".to_string()))?;

        let conn = self.conn.lock().await;
        let Some(current) = status_of(&conn, id)? else {
            return Ok(None);
        };
        if !current.can_become(entity.status) {
            return Err(DomainError::Conflict(format!(
                "response {} is {} and cannot return to {}",
                id,
                current.as_str(),
                entity.status.as_str()
            )));
        }

        let mut updated = entity.clone();
        updated.updated_at = timestamp::now();
        if store(&conn, id, &updated)? == 0 {
            return Ok(None);
        }
        Ok(Some(updated))
    }

    async fn delete(&self, id: i64) -> DomainResult<()> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM form_responses WHERE id = ?1", params![id])?;
        Ok(())
    }
}

#[async_trait]
impl ResponseStore for ResponseRepository {
    async fn patch(&self, id: i64, patch: &ResponsePatch) -> DomainResult<Option<FormResponse>> {
        let conn = self.conn.lock().await;
        patch_locked(&conn, id, patch)
    }

    async fn list_by_template(&self, template_id: i64) -> DomainResult<Vec<FormResponse>> {
        let sql = format!(
            "SELECT {} FROM form_responses WHERE form_template_id = ?1 ORDER BY id ASC",
            RESPONSE_COLUMNS
        );
        let conn = self.conn.lock().await;
        query_responses(&conn, &sql, params![template_id])
    }

    async fn list_drafts(&self, template_id: i64) -> DomainResult<Vec<FormResponse>> {
        let sql = format!(
            "SELECT {} FROM form_responses WHERE form_template_id = ?1 AND status = 'draft' ORDER BY id ASC",
            RESPONSE_COLUMNS
        );
        let conn = self.conn.lock().await;
        query_responses(&conn, &sql, params![template_id])
    }

    async fn list_page(&self, query: &ResponseQuery) -> DomainResult<Page<FormResponse>> {
        let mut responses = match query.template_id {
            Some(template_id) => self.list_by_template(template_id).await?,
            None => self.list().await?,
        };
        if let Some(status) = query.status {
            responses.retain(|r| r.status == status);
        }
        Ok(Page::build(responses, &query.page))
    }

    async fn submit(&self, id: i64) -> DomainResult<Option<FormResponse>> {
        let patch = ResponsePatch {
            status: Some(ResponseStatus::Submitted),
            submitted_at: Some(timestamp::now()),
            ..Default::default()
        };
        let conn = self.conn.lock().await;
        patch_locked(&conn, id, &patch)
    }

    async fn list_unsynced(&self) -> DomainResult<Vec<FormResponse>> {
        let sql = format!(
            "SELECT {} FROM form_responses
             WHERE offline_created = 1 AND status IN ('submitted', 'error')
             ORDER BY id ASC",
            RESPONSE_COLUMNS
        );
        let conn = self.conn.lock().await;
        query_responses(&conn, &sql, [])
    }

    async fn mark_synced(&self, id: i64) -> DomainResult<Option<FormResponse>> {
        let patch = ResponsePatch {
            offline_created: Some(false),
            synced_at: Some(timestamp::now()),
            ..Default::default()
        };
        let conn = self.conn.lock().await;
        patch_locked(&conn, id, &patch)
    }
}

/// Convert a database row to FormResponse
fn row_to_response(row: &rusqlite::Row) -> DomainResult<FormResponse> {
    let status: String = row.get(3)?;
    let created_at: String = row.get(4)?;
    let updated_at: String = row.get(5)?;
    let submitted_at: Option<String> = row.get(6)?;
    let synced_at: Option<String> = row.get(8)?;

    Ok(FormResponse {
        id: Some(row.get(0)?),
        form_template_id: row.get(1)?,
        data: read_json(row.get(2)?)?.unwrap_or_default(),
        status: ResponseStatus::from_str(&status),
        created_at: read_timestamp(&created_at)?,
        updated_at: read_timestamp(&updated_at)?,
        submitted_at: submitted_at.as_deref().map(read_timestamp).transpose()?,
        offline_created: row.get(7)?,
        synced_at: synced_at.as_deref().map(read_timestamp).transpose()?,
        device_info: read_json(row.get(9)?)?,
        location_data: read_json(row.get(10)?)?,
        meta: read_json(row.get(11)?)?,
    })
}
