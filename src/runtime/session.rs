//! Form-fill session
//!
//! Holds the answers for one template, runs validation on submit and writes
//! drafts and submissions to the response store. Saving and submitting share
//! one write token per session; a submit always wins over autosave.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use log::{debug, error, info};
use serde::Serialize;
use serde_json::Value;

use super::autosave::Debouncer;
use super::device::DeviceInfoProvider;
use super::geolocation::{self, GeolocationProvider, PositionOptions};
use super::progress;
use crate::domain::{
    timestamp, DomainError, DomainResult, FormResponse, FormTemplate, ResponseData, ResponsePatch,
    ResponseStatus,
};
use crate::registry::{self, FieldView};
use crate::repository::ResponseStore;
use crate::sync::Connectivity;
use crate::validation::{is_displayed, FieldErrors, Validator};

/// Session state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Editing,
    Saving,
    Submitting,
    /// Terminal
    Submitted,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved(i64),
    /// Nothing written: read-only, closed, already submitted, or another write in flight
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Submitted(i64),
    /// Validation failed and the template does not accept incomplete submissions
    Rejected(FieldErrors),
}

/// Collaborators a session writes through
#[derive(Clone)]
pub struct SessionDeps {
    pub responses: Arc<dyn ResponseStore>,
    pub connectivity: Connectivity,
    pub device: Arc<dyn DeviceInfoProvider>,
    pub geolocation: Arc<dyn GeolocationProvider>,
    pub validator: Validator,
    pub autosave_delay: Duration,
    pub position_options: PositionOptions,
}

struct SessionState {
    data: ResponseData,
    errors: FieldErrors,
    response_id: Option<i64>,
    offline_created: bool,
    phase: Phase,
    closed: bool,
}

struct SessionInner {
    template: FormTemplate,
    template_id: i64,
    read_only: bool,
    deps: SessionDeps,
    state: Mutex<SessionState>,
    write_token: tokio::sync::Mutex<()>,
    submit_pending: AtomicBool,
    autosave: Debouncer,
}

pub struct FormSession {
    inner: Arc<SessionInner>,
}

impl FormSession {
    /// Open a session, resuming `existing` when given
    ///
    /// A response that is no longer a draft opens as a finished, read-only session.
    pub fn new(
        template: FormTemplate,
        existing: Option<FormResponse>,
        read_only: bool,
        deps: SessionDeps,
    ) -> DomainResult<Self> {
        let template_id = template
            .id
            .ok_or_else(|| DomainError::InvalidInput("Template has not been saved".to_string()))?;

        let mut state = SessionState {
            data: ResponseData::new(),
            errors: FieldErrors::new(),
            response_id: None,
            offline_created: false,
            phase: Phase::Editing,
            closed: false,
        };

        if let Some(response) = existing {
            if response.form_template_id != template_id {
                return Err(DomainError::InvalidInput(format!(
                    "Response {:?} belongs to template {}, not {}",
                    response.id, response.form_template_id, template_id
                )));
            }
            state.data = response.data;
            state.response_id = response.id;
            state.offline_created = response.offline_created;
            if response.status != ResponseStatus::Draft {
                state.phase = Phase::Submitted;
            }
        }

        let autosave = Debouncer::new(deps.autosave_delay);
        Ok(Self {
            inner: Arc::new(SessionInner {
                template,
                template_id,
                read_only,
                deps,
                state: Mutex::new(state),
                write_token: tokio::sync::Mutex::new(()),
                submit_pending: AtomicBool::new(false),
                autosave,
            }),
        })
    }

    pub fn template(&self) -> &FormTemplate {
        &self.inner.template
    }

    pub fn response_id(&self) -> Option<i64> {
        self.inner.state().response_id
    }

    pub fn phase(&self) -> Phase {
        self.inner.state().phase
    }

    pub fn data(&self) -> ResponseData {
        self.inner.state().data.clone()
    }

    pub fn value(&self, name: &str) -> Option<Value> {
        self.inner.state().data.get(name).cloned()
    }

    pub fn errors(&self) -> FieldErrors {
        self.inner.state().errors.clone()
    }

    /// Read-only sessions and finished submissions accept no edits
    pub fn is_read_only(&self) -> bool {
        self.inner.read_only || self.phase() == Phase::Submitted
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state().closed
    }

    pub fn autosave_pending(&self) -> bool {
        self.inner.autosave.is_pending()
    }

    /// Record an answer and clear that field's error
    ///
    /// Edits are accepted while a save or submit is running.
    pub fn set_value(&self, name: impl Into<String>, value: Value) -> DomainResult<()> {
        let name = name.into();
        {
            let mut state = self.inner.state();
            if state.closed {
                return Err(DomainError::InvalidInput("Session is closed".to_string()));
            }
            if self.inner.read_only || state.phase == Phase::Submitted {
                return Err(DomainError::InvalidInput("Form is read-only".to_string()));
            }
            state.data.insert(name.clone(), value);
            state.errors.remove(&name);
        }

        if self.inner.template.settings.auto_save {
            self.schedule_autosave();
        }
        Ok(())
    }

    fn schedule_autosave(&self) {
        SessionInner::schedule_autosave(&self.inner);
    }

    /// Save the current answers as a draft
    pub async fn save_draft(&self) -> DomainResult<SaveOutcome> {
        SessionInner::save_draft(&self.inner).await
    }

    /// Validate and submit
    pub async fn submit(&self) -> DomainResult<SubmitOutcome> {
        SessionInner::submit(&self.inner).await
    }

    /// Ordered views of every field currently displayed
    pub fn render(&self) -> Vec<FieldView> {
        let state = self.inner.state();
        let read_only = self.inner.read_only || state.phase == Phase::Submitted;
        self.inner
            .template
            .ordered_fields()
            .into_iter()
            .filter(|f| !f.is_hidden() && is_displayed(f, &state.data))
            .map(|f| {
                registry::render(
                    f,
                    state.data.get(&f.name),
                    state.errors.get(&f.name).map(String::as_str),
                    read_only,
                )
            })
            .collect()
    }

    /// Completion percentage
    pub fn progress(&self) -> u8 {
        progress::calculate(&self.inner.template, &self.inner.state().data)
    }

    /// Progress when the template shows a progress bar to someone filling it in
    pub fn progress_bar(&self) -> Option<u8> {
        if self.inner.template.settings.show_progress_bar && !self.inner.read_only {
            Some(self.progress())
        } else {
            None
        }
    }

    /// Cancel pending autosave; the session accepts no further edits or writes
    pub fn close(&self) {
        self.inner.autosave.cancel();
        self.inner.state().closed = true;
    }
}

impl Drop for FormSession {
    fn drop(&mut self) {
        self.inner.autosave.cancel();
    }
}

impl SessionInner {
    fn schedule_autosave(self: &Arc<Self>) {
        let weak: Weak<SessionInner> = Arc::downgrade(self);
        self.autosave.schedule(move || async move {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if inner.state().data.is_empty() {
                return;
            }
            match SessionInner::save_draft(&inner).await {
                Ok(SaveOutcome::Saved(id)) => debug!("Autosaved response {}", id),
                Ok(SaveOutcome::Skipped) => debug!("Autosave skipped"),
                Err(e) => debug!("Autosave failed: {}", e),
            }
        });
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn writable(&self) -> bool {
        let state = self.state();
        !self.read_only && !state.closed && state.phase != Phase::Submitted
    }

    async fn save_draft(self: &Arc<Self>) -> DomainResult<SaveOutcome> {
        if !self.writable() || self.submit_pending.load(Ordering::SeqCst) {
            return Ok(SaveOutcome::Skipped);
        }
        let Ok(_token) = self.write_token.try_lock() else {
            debug!("Draft save skipped: another write is in flight");
            return Ok(SaveOutcome::Skipped);
        };

        let (data, response_id) = {
            let mut state = self.state();
            if state.phase == Phase::Submitted {
                return Ok(SaveOutcome::Skipped);
            }
            state.phase = Phase::Saving;
            (state.data.clone(), state.response_id)
        };

        let result = self.write_draft(data, response_id).await;

        let mut state = self.state();
        if state.phase == Phase::Saving {
            state.phase = Phase::Editing;
        }
        match result {
            Ok((id, offline_created)) => {
                state.response_id = Some(id);
                state.offline_created = offline_created;
                Ok(SaveOutcome::Saved(id))
            }
            Err(e) => {
                error!("Error saving draft: {}", e);
                Err(e)
            }
        }
    }

    async fn write_draft(&self, data: ResponseData, response_id: Option<i64>) -> DomainResult<(i64, bool)> {
        let device_info = self.deps.device.device_info();

        match response_id {
            Some(id) => {
                let patch = ResponsePatch {
                    data: Some(data),
                    device_info: Some(device_info),
                    ..Default::default()
                };
                let updated = self
                    .deps
                    .responses
                    .patch(id, &patch)
                    .await?
                    .ok_or_else(|| DomainError::NotFound(format!("Response {} no longer exists", id)))?;
                Ok((id, updated.offline_created))
            }
            None => {
                let mut draft = FormResponse::draft(self.template_id, data);
                draft.offline_created = self.deps.connectivity.is_offline();
                draft.device_info = Some(device_info);
                let created = self.deps.responses.create(&draft).await?;
                let id = created
                    .id
                    .ok_or_else(|| DomainError::Database("Store returned a response without id".to_string()))?;
                info!("Created draft response {}", id);
                Ok((id, created.offline_created))
            }
        }
    }

    async fn submit(self: &Arc<Self>) -> DomainResult<SubmitOutcome> {
        {
            let state = self.state();
            if self.read_only || state.closed {
                return Err(DomainError::InvalidInput("Form is read-only".to_string()));
            }
            if state.phase == Phase::Submitted {
                return Err(DomainError::Conflict("Form was already submitted".to_string()));
            }
        }
        if self.submit_pending.swap(true, Ordering::SeqCst) {
            return Err(DomainError::Conflict("Submission already in progress".to_string()));
        }
        let result = self.run_submit().await;
        self.submit_pending.store(false, Ordering::SeqCst);
        result
    }

    async fn run_submit(self: &Arc<Self>) -> DomainResult<SubmitOutcome> {
        let data = self.state().data.clone();
        let errors = self.deps.validator.validate(&self.template, &data);
        self.state().errors = errors.clone();

        if !errors.is_empty() && !self.template.settings.allow_incomplete {
            debug!("Submission blocked by {} field error(s)", errors.len());
            return Ok(SubmitOutcome::Rejected(errors));
        }

        // A pending autosave is dropped only once the submission will be written
        self.autosave.cancel();
        // Waits for an in-flight draft save to finish
        let _token = self.write_token.lock().await;

        let (data, response_id, offline_created) = {
            let mut state = self.state();
            if state.phase == Phase::Submitted {
                return Err(DomainError::Conflict("Form was already submitted".to_string()));
            }
            state.phase = Phase::Submitting;
            (state.data.clone(), state.response_id, state.offline_created)
        };

        let result = self.write_submission(data, response_id, offline_created).await;

        let mut state = self.state();
        match result {
            Ok((id, offline_created)) => {
                state.phase = Phase::Submitted;
                state.response_id = Some(id);
                state.offline_created = offline_created;
                info!("Submitted response {}", id);
                Ok(SubmitOutcome::Submitted(id))
            }
            Err(e) => {
                state.phase = Phase::Editing;
                drop(state);
                error!("Error submitting form: {}", e);
                if self.template.settings.auto_save {
                    self.schedule_autosave();
                }
                Err(e)
            }
        }
    }

    async fn write_submission(
        &self,
        data: ResponseData,
        response_id: Option<i64>,
        created_offline: bool,
    ) -> DomainResult<(i64, bool)> {
        let device_info = self.deps.device.device_info();
        let location_data = if self.template.settings.allow_geolocation {
            geolocation::capture(self.deps.geolocation.as_ref(), self.deps.position_options).await
        } else {
            None
        };
        let offline_created = created_offline || self.deps.connectivity.is_offline();
        let now = timestamp::now();

        match response_id {
            Some(id) => {
                let patch = ResponsePatch {
                    data: Some(data),
                    status: Some(ResponseStatus::Submitted),
                    submitted_at: Some(now),
                    offline_created: Some(offline_created),
                    device_info: Some(device_info),
                    location_data,
                    ..Default::default()
                };
                let updated = self
                    .deps
                    .responses
                    .patch(id, &patch)
                    .await?
                    .ok_or_else(|| DomainError::NotFound(format!("Response {} no longer exists", id)))?;
                Ok((id, updated.offline_created))
            }
            None => {
                let mut response = FormResponse::draft(self.template_id, data);
                response.status = ResponseStatus::Submitted;
                response.submitted_at = Some(now);
                response.offline_created = offline_created;
                response.device_info = Some(device_info);
                response.location_data = location_data;
                let created = self.deps.responses.create(&response).await?;
                let id = created
                    .id
                    .ok_or_else(|| DomainError::Database("Store returned a response without id".to_string()))?;
                Ok((id, created.offline_created))
            }
        }
    }
}

impl std::fmt::Debug for FormSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state();
        f.debug_struct("FormSession")
            .field("template_id", &self.inner.template_id)
            .field("response_id", &state.response_id)
            .field("phase", &state.phase)
            .field("read_only", &self.inner.read_only)
            .finish()
    }
}
