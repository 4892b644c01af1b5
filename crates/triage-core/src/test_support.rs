use std::collections::{BTreeMap, VecDeque};
use std::ffi::OsString;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use tokio::sync::Mutex as AsyncMutex;

use crate::directory::{
    CreateIssueRequest, CreatedIssue, IssueDirectory, NameIndex, ProjectDetails,
};
use crate::error::CoreError;
use crate::extraction::{CompletionProvider, CompletionRequest};
use crate::identifiers::{IssueId, ProjectId, TeamId, WorkflowStateId};

static ENV_LOCK: Mutex<()> = Mutex::new(());
static TEST_PATH_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Variables the config and client tests are allowed to touch.
const OVERRIDABLE_ENV_KEYS: &[&str] = &[
    "HOME",
    "USERPROFILE",
    "TRIAGE_CONFIG",
    "OPENAI_API_KEY",
    "OPENAI_MODEL",
    "LINEAR_API_KEY",
    "LINEAR_TEAM_ID",
];

/// Holds the process-wide env lock and puts every saved value back on drop.
struct EnvOverride {
    saved: Vec<(&'static str, Option<OsString>)>,
    _lock: MutexGuard<'static, ()>,
}

impl Drop for EnvOverride {
    fn drop(&mut self) {
        for (key, original) in self.saved.drain(..).rev() {
            match original {
                Some(value) => std::env::set_var(key, value),
                None => std::env::remove_var(key),
            }
        }
    }
}

/// Sets (or removes with `None`) each variable while `run` executes. Calls
/// are serialised across the process and must not nest.
pub fn with_env_vars<R>(vars: &[(&str, Option<&str>)], run: impl FnOnce() -> R) -> R {
    let lock = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let mut scope = EnvOverride {
        saved: Vec::with_capacity(vars.len()),
        _lock: lock,
    };
    for (key, value) in vars {
        let key = OVERRIDABLE_ENV_KEYS
            .iter()
            .copied()
            .find(|known| known == key)
            .unwrap_or_else(|| panic!("`{key}` is not an environment variable triage reads"));
        scope.saved.push((key, std::env::var_os(key)));
        match value {
            Some(value) => std::env::set_var(key, value),
            None => std::env::remove_var(key),
        }
    }
    run()
}

/// A temp path unique to this process and call, removed on drop.
pub struct TestPath {
    path: PathBuf,
}

impl TestPath {
    pub fn new(tag: &str, extension: &str) -> Self {
        let safe_tag: String = tag
            .chars()
            .map(|ch| {
                if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                    ch
                } else {
                    '-'
                }
            })
            .collect();
        let now_nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let counter = TEST_PATH_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self {
            path: std::env::temp_dir().join(format!(
                "triage-{safe_tag}-{}-{now_nanos}-{counter}.{extension}",
                std::process::id(),
            )),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TestPath {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                eprintln!(
                    "warning: failed to remove temporary test file {}: {err}",
                    self.path.display()
                );
            }
        }
    }
}

/// An 8x8 half-transparent PNG, for exercising image normalization.
pub fn png_fixture() -> Vec<u8> {
    let image = RgbaImage::from_pixel(8, 8, Rgba([200, 30, 30, 128]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encode png fixture");
    bytes
}

pub fn created_issue(identifier: &str, title: &str) -> CreatedIssue {
    CreatedIssue {
        id: IssueId::new(format!("issue-{}", identifier.to_ascii_lowercase())),
        identifier: identifier.to_owned(),
        title: title.to_owned(),
        url: None,
        project_name: None,
    }
}

#[derive(Default)]
struct StubDirectoryState {
    projects: NameIndex<ProjectId>,
    project_details: BTreeMap<ProjectId, ProjectDetails>,
    teams: NameIndex<TeamId>,
    workflow_states: BTreeMap<TeamId, NameIndex<WorkflowStateId>>,
    read_calls: Vec<String>,
    create_requests: Vec<CreateIssueRequest>,
    create_results: VecDeque<Result<CreatedIssue, CoreError>>,
}

/// In-memory directory. Reads return whatever was seeded (empty otherwise);
/// creations pop queued results and fall back to a synthetic success.
#[derive(Default)]
pub struct StubDirectory {
    state: AsyncMutex<StubDirectoryState>,
}

impl StubDirectory {
    pub async fn set_projects(&self, projects: NameIndex<ProjectId>) {
        self.state.lock().await.projects = projects;
    }

    pub async fn set_project_details(&self, project_id: &str, details: ProjectDetails) {
        self.state
            .lock()
            .await
            .project_details
            .insert(ProjectId::new(project_id), details);
    }

    pub async fn set_teams(&self, teams: NameIndex<TeamId>) {
        self.state.lock().await.teams = teams;
    }

    pub async fn set_workflow_states(&self, team_id: &str, states: NameIndex<WorkflowStateId>) {
        self.state
            .lock()
            .await
            .workflow_states
            .insert(TeamId::new(team_id), states);
    }

    pub async fn push_create_result(&self, result: Result<CreatedIssue, CoreError>) {
        self.state.lock().await.create_results.push_back(result);
    }

    pub async fn read_calls(&self) -> Vec<String> {
        self.state.lock().await.read_calls.clone()
    }

    pub async fn create_requests(&self) -> Vec<CreateIssueRequest> {
        self.state.lock().await.create_requests.clone()
    }
}

#[async_trait]
impl IssueDirectory for StubDirectory {
    async fn list_projects(&self) -> NameIndex<ProjectId> {
        let mut state = self.state.lock().await;
        state.read_calls.push("list_projects".to_owned());
        state.projects.clone()
    }

    async fn project_details(&self, project_id: &ProjectId) -> ProjectDetails {
        let mut state = self.state.lock().await;
        state.read_calls.push(format!("project_details:{project_id}"));
        state
            .project_details
            .get(project_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn list_teams(&self) -> NameIndex<TeamId> {
        let mut state = self.state.lock().await;
        state.read_calls.push("list_teams".to_owned());
        state.teams.clone()
    }

    async fn list_workflow_states(&self, team_id: &TeamId) -> NameIndex<WorkflowStateId> {
        let mut state = self.state.lock().await;
        state.read_calls.push(format!("list_workflow_states:{team_id}"));
        state
            .workflow_states
            .get(team_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn create_issue(&self, request: CreateIssueRequest) -> Result<CreatedIssue, CoreError> {
        let mut state = self.state.lock().await;
        let sequence = state.create_requests.len() + 1;
        let title = request.submitted_title();
        state.create_requests.push(request);
        state
            .create_results
            .pop_front()
            .unwrap_or_else(|| Ok(created_issue(&format!("STUB-{sequence}"), &title)))
    }
}

/// Completion provider that replays queued responses and records requests.
#[derive(Default)]
pub struct StubCompletion {
    requests: AsyncMutex<Vec<CompletionRequest>>,
    responses: AsyncMutex<VecDeque<Result<String, CoreError>>>,
}

impl StubCompletion {
    pub async fn push_response(&self, response: Result<String, CoreError>) {
        self.responses.lock().await.push_back(response);
    }

    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl CompletionProvider for StubCompletion {
    async fn complete_json(&self, request: CompletionRequest) -> Result<String, CoreError> {
        self.requests.lock().await.push(request);
        self.responses.lock().await.pop_front().unwrap_or_else(|| {
            Err(CoreError::DependencyUnavailable(
                "stub completion has no queued response".to_owned(),
            ))
        })
    }
}
