//! Application Context
//!
//! Built once at startup and handed to whoever needs the stores, the sync
//! service or a new form session. Lifecycle: `open` → `start` → `dispose`.

use std::sync::Arc;

use log::info;

use crate::config::AppConfig;
use crate::domain::{DomainError, DomainResult, FormResponse};
use crate::repository::{init_db, Repository, ResponseRepository, TemplateRepository};
use crate::runtime::{
    DeviceInfoProvider, FormSession, GeolocationProvider, HostDeviceInfo, NoGeolocation, SessionDeps,
};
use crate::sync::{Connectivity, DeliveryReport, DestinationRegistry, SimulatedUploader, SyncService, Uploader};
use crate::validation::Validator;

const APP_NAME: &str = "offline-forms";

/// Install the rolling file logger described by `config`
pub fn init_logging(config: &AppConfig) -> DomainResult<()> {
    rolling_logger::init_logger_with_retention(&config.log_dir, APP_NAME, config.log_max_files)
        .map_err(DomainError::Unknown)
}

pub struct AppContext {
    config: AppConfig,
    templates: Arc<TemplateRepository>,
    responses: Arc<ResponseRepository>,
    connectivity: Connectivity,
    sync: SyncService,
    device: Arc<dyn DeviceInfoProvider>,
    geolocation: Arc<dyn GeolocationProvider>,
    validator: Validator,
}

impl AppContext {
    /// Open the database and wire every service. Connectivity starts online;
    /// hosts that know better call `connectivity().set_online(false)` before `start`.
    pub async fn open(config: AppConfig) -> DomainResult<Self> {
        let uploader = Arc::new(SimulatedUploader::new(config.sync_upload_delay()));
        Self::open_with_uploader(config, uploader).await
    }

    pub async fn open_with_uploader(config: AppConfig, uploader: Arc<dyn Uploader>) -> DomainResult<Self> {
        let db = init_db(&config.database_path).await?;
        let conn = db.connection();
        let templates = Arc::new(TemplateRepository::new(conn.clone()));
        let responses = Arc::new(ResponseRepository::new(conn));
        let connectivity = Connectivity::new(true);

        let sync = SyncService::new(
            responses.clone(),
            connectivity.clone(),
            uploader,
            DestinationRegistry::with_defaults(config.destination_timeout()),
        );
        let device = Arc::new(HostDeviceInfo::new(config.device_id.clone(), config.app_version.clone()));

        info!("Opened form store at {}", config.database_path.display());
        Ok(Self {
            config,
            templates,
            responses,
            connectivity,
            sync,
            device,
            geolocation: Arc::new(NoGeolocation),
            validator: Validator::new(),
        })
    }

    pub fn with_geolocation(mut self, provider: Arc<dyn GeolocationProvider>) -> Self {
        self.geolocation = provider;
        self
    }

    pub fn with_device_info(mut self, provider: Arc<dyn DeviceInfoProvider>) -> Self {
        self.device = provider;
        self
    }

    /// Validator with the custom checks the host registered
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn templates(&self) -> &Arc<TemplateRepository> {
        &self.templates
    }

    pub fn responses(&self) -> &Arc<ResponseRepository> {
        &self.responses
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn sync(&self) -> &SyncService {
        &self.sync
    }

    pub fn start(&self) {
        self.sync.start();
    }

    pub fn dispose(&self) {
        self.sync.dispose();
    }

    fn session_deps(&self) -> SessionDeps {
        SessionDeps {
            responses: self.responses.clone(),
            connectivity: self.connectivity.clone(),
            device: self.device.clone(),
            geolocation: self.geolocation.clone(),
            validator: self.validator.clone(),
            autosave_delay: self.config.autosave_delay(),
            position_options: self.config.position_options(),
        }
    }

    /// Start filling `template_id`, or resume one of its responses
    pub async fn open_session(
        &self,
        template_id: i64,
        resume_response_id: Option<i64>,
        read_only: bool,
    ) -> DomainResult<FormSession> {
        let template = self
            .templates
            .find_by_id(template_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Template with ID {} not found", template_id)))?;

        let existing = match resume_response_id {
            Some(id) => Some(self.load_response(id).await?),
            None => None,
        };

        FormSession::new(template, existing, read_only, self.session_deps())
    }

    async fn load_response(&self, id: i64) -> DomainResult<FormResponse> {
        self.responses
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Response with ID {} not found", id)))
    }

    /// Forward a stored response to its template's destinations
    pub async fn process_destinations(&self, response_id: i64) -> DomainResult<DeliveryReport> {
        let response = self.load_response(response_id).await?;
        let template = self
            .templates
            .find_by_id(response.form_template_id)
            .await?
            .ok_or_else(|| {
                DomainError::NotFound(format!("Template with ID {} not found", response.form_template_id))
            })?;

        Ok(self
            .sync
            .process_destinations(&response, template.settings.destinations())
            .await)
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("database", &self.config.database_path)
            .field("sync", &self.sync)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        DestinationKind, FieldDefinition, FieldKind, FormDestination, FormSettings, FormTemplate,
        NumberAttrs, ResponseStatus,
    };
    use crate::repository::ResponseStore;
    use crate::runtime::{FixedGeolocation, Phase, SubmitOutcome};
    use serde_json::json;
    use std::path::PathBuf;

    fn memory_config() -> AppConfig {
        AppConfig {
            database_path: PathBuf::from(":memory:"),
            sync_upload_delay_ms: 0,
            ..Default::default()
        }
    }

    fn inspection(settings: FormSettings) -> FormTemplate {
        FormTemplate::new("Inspection", "")
            .with_field(FieldDefinition::new("age", "Age", FieldKind::Number(NumberAttrs::default()), 1).required())
            .with_settings(settings)
    }

    #[tokio::test]
    async fn test_offline_submission_syncs_after_reconnect() {
        let ctx = AppContext::open(memory_config())
            .await
            .unwrap()
            .with_geolocation(Arc::new(FixedGeolocation {
                latitude: 1.0,
                longitude: 2.0,
                accuracy: None,
            }));
        let template = ctx.templates().create(&inspection(FormSettings::default())).await.unwrap();
        ctx.connectivity().set_online(false);

        let session = ctx.open_session(template.id.unwrap(), None, false).await.unwrap();
        session.set_value("age", json!(33)).unwrap();
        let SubmitOutcome::Submitted(id) = session.submit().await.unwrap() else {
            panic!("submission rejected");
        };
        assert_eq!(session.phase(), Phase::Submitted);
        assert_eq!(ctx.responses().list_unsynced().await.unwrap().len(), 1);

        assert_eq!(ctx.sync().sync().await.unwrap(), None);
        ctx.connectivity().set_online(true);
        assert_eq!(ctx.sync().sync().await.unwrap(), Some(1));

        let stored = ctx.responses().find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.status, ResponseStatus::Submitted);
        assert!(stored.synced_at.is_some());
        assert!(ctx.responses().list_unsynced().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resume_draft_session() {
        let ctx = AppContext::open(memory_config()).await.unwrap();
        let template = ctx.templates().create(&inspection(FormSettings::default())).await.unwrap();

        let first = ctx.open_session(template.id.unwrap(), None, false).await.unwrap();
        first.set_value("age", json!(20)).unwrap();
        first.save_draft().await.unwrap();
        let draft_id = first.response_id().unwrap();

        let resumed = ctx.open_session(template.id.unwrap(), Some(draft_id), false).await.unwrap();
        assert_eq!(resumed.value("age"), Some(json!(20)));
        assert_eq!(resumed.phase(), Phase::Editing);
    }

    #[tokio::test]
    async fn test_missing_rows_are_not_found() {
        let ctx = AppContext::open(memory_config()).await.unwrap();
        assert!(matches!(ctx.open_session(5, None, false).await, Err(DomainError::NotFound(_))));

        let template = ctx.templates().create(&inspection(FormSettings::default())).await.unwrap();
        let result = ctx.open_session(template.id.unwrap(), Some(77), false).await;
        assert!(matches!(result, Err(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_submitted_response_goes_to_destinations() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = AppContext::open(memory_config()).await.unwrap();
        let settings = FormSettings {
            destinations: Some(vec![FormDestination::new(
                1,
                "Archive",
                DestinationKind::File,
                json!({"directory": dir.path().to_str().unwrap(), "format": "csv"}),
            )]),
            ..Default::default()
        };
        let template = ctx.templates().create(&inspection(settings)).await.unwrap();

        let session = ctx.open_session(template.id.unwrap(), None, false).await.unwrap();
        session.set_value("age", json!(41)).unwrap();
        let SubmitOutcome::Submitted(id) = session.submit().await.unwrap() else {
            panic!("submission rejected");
        };

        let report = ctx.process_destinations(id).await.unwrap();
        assert_eq!(report.delivered, 1);
        let written = std::fs::read_to_string(dir.path().join(format!("response-{}.csv", id))).unwrap();
        assert_eq!(written, "age\n41\n");
    }
}
