use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use integration_linear::{LinearConfig, LinearDirectoryClient};
use integration_openai::{OpenAiCompletionProvider, OpenAiConfig};
use tracing::info;
use triage_config::{Secrets, TriageConfig};
use triage_core::{
    AssignmentDefaults, AssignmentResolver, AssignmentSelection, BatchSyncEngine,
    CompletionProvider, CoreError, IntakeSession, IssueDirectory, IssueExtractor, TeamId,
    DEFAULT_JPEG_QUALITY,
};

/// The long-lived collaborators every command shares.
#[derive(Clone)]
pub struct Services {
    pub directory: Arc<dyn IssueDirectory>,
    pub provider: Arc<dyn CompletionProvider>,
    pub defaults: AssignmentDefaults,
    pub jpeg_quality: u8,
}

impl fmt::Debug for Services {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Services")
            .field("defaults", &self.defaults)
            .field("jpeg_quality", &self.jpeg_quality)
            .finish_non_exhaustive()
    }
}

impl Services {
    pub fn new(
        directory: Arc<dyn IssueDirectory>,
        provider: Arc<dyn CompletionProvider>,
        defaults: AssignmentDefaults,
    ) -> Self {
        Self {
            directory,
            provider,
            defaults,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    /// Wires the Linear and OpenAI clients from file config plus secrets.
    pub fn from_config(config: &TriageConfig, secrets: &Secrets) -> Result<Self, CoreError> {
        let directory = LinearDirectoryClient::new(linear_config(config, secrets)?)?;
        let provider = OpenAiCompletionProvider::new(openai_config(config, secrets)?)?;
        info!(
            model = provider.model(),
            linear_api = %config.linear.api_url,
            "intake services initialized"
        );

        Ok(Self::new(
            Arc::new(directory),
            Arc::new(provider),
            assignment_defaults(config),
        )
        .with_jpeg_quality(config.ai.jpeg_quality))
    }

    pub fn session(&self, selection: AssignmentSelection) -> IntakeSession {
        let mut session = IntakeSession::new(
            AssignmentResolver::new(Arc::clone(&self.directory), self.defaults.clone()),
            IssueExtractor::new(Arc::clone(&self.provider)).with_jpeg_quality(self.jpeg_quality),
            BatchSyncEngine::new(Arc::clone(&self.directory)),
        );
        *session.selection_mut() = selection;
        session
    }
}

pub fn assignment_defaults(config: &TriageConfig) -> AssignmentDefaults {
    AssignmentDefaults {
        default_team_id: config.linear.default_team_id.clone().map(TeamId::from),
        workflow_state_name: config.linear.default_state_name.clone(),
    }
}

pub fn linear_config(config: &TriageConfig, secrets: &Secrets) -> Result<LinearConfig, CoreError> {
    Ok(LinearConfig {
        api_url: config.linear.api_url.clone(),
        request_timeout: Duration::from_secs(config.linear.timeout_secs),
        listing_cache_ttl: Duration::from_secs(config.linear.listing_cache_ttl_secs),
        detail_cache_ttl: Duration::from_secs(config.linear.detail_cache_ttl_secs),
        ..LinearConfig::new(secrets.linear_api_key.as_str())?
    })
}

pub fn openai_config(config: &TriageConfig, secrets: &Secrets) -> Result<OpenAiConfig, CoreError> {
    Ok(OpenAiConfig {
        model: config.ai.model.clone(),
        base_url: config.ai.base_url.clone(),
        request_timeout: Duration::from_secs(config.ai.timeout_secs),
        ..OpenAiConfig::new(secrets.openai_api_key.as_str())?
    })
}
