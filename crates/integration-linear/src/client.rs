use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};
use triage_core::{
    truncate_title, CoreError, CreateIssueRequest, CreatedIssue, IssueDirectory, IssueId,
    MilestoneId, NameIndex, ProjectDetails, ProjectId, TeamId, WorkflowStateId,
};

use crate::cache::TtlCache;
use crate::config::LinearConfig;
use crate::graphql::{GraphqlRequest, GraphqlTransport, ReqwestGraphqlTransport};

const PROJECTS_QUERY: &str = r#"
query Projects {
  projects(first: 250) {
    nodes {
      id
      name
    }
  }
}
"#;

const PROJECT_DETAILS_QUERY: &str = r#"
query ProjectDetails($id: String!) {
  project(id: $id) {
    teams(first: 50) {
      nodes {
        id
        name
      }
    }
    projectMilestones(first: 100) {
      nodes {
        id
        name
      }
    }
  }
}
"#;

const VIEWER_TEAMS_QUERY: &str = r#"
query ViewerTeams {
  viewer {
    teams(first: 100) {
      nodes {
        id
        name
      }
    }
  }
}
"#;

const TEAM_WORKFLOW_STATES_QUERY: &str = r#"
query TeamWorkflowStates($teamId: String!) {
  team(id: $teamId) {
    states(first: 50) {
      nodes {
        id
        name
      }
    }
  }
}
"#;

const ISSUE_CREATE_MUTATION: &str = r#"
mutation IssueCreate($input: IssueCreateInput!) {
  issueCreate(input: $input) {
    success
    issue {
      id
      identifier
      title
      url
      project {
        name
      }
    }
  }
}
"#;

/// [`IssueDirectory`] backed by the Linear GraphQL API.
///
/// Successful listings are cached for their freshness window; failed reads are
/// logged, answered with an empty listing and never cached.
#[derive(Clone)]
pub struct LinearDirectoryClient {
    transport: Arc<dyn GraphqlTransport>,
    projects: TtlCache<(), NameIndex<ProjectId>>,
    teams: TtlCache<(), NameIndex<TeamId>>,
    project_details: TtlCache<ProjectId, ProjectDetails>,
    workflow_states: TtlCache<TeamId, NameIndex<WorkflowStateId>>,
}

impl fmt::Debug for LinearDirectoryClient {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("LinearDirectoryClient")
            .field("listing_cache_ttl", &self.projects.ttl())
            .field("detail_cache_ttl", &self.project_details.ttl())
            .finish_non_exhaustive()
    }
}

impl LinearDirectoryClient {
    pub fn new(config: LinearConfig) -> Result<Self, CoreError> {
        let transport = ReqwestGraphqlTransport::new(
            config.api_url.clone(),
            config.api_key.clone(),
            config.request_timeout,
        )?;
        Ok(Self::with_transport(Arc::new(transport), &config))
    }

    pub fn with_transport(transport: Arc<dyn GraphqlTransport>, config: &LinearConfig) -> Self {
        Self {
            transport,
            projects: TtlCache::new(config.listing_cache_ttl),
            teams: TtlCache::new(config.listing_cache_ttl),
            project_details: TtlCache::new(config.detail_cache_ttl),
            workflow_states: TtlCache::new(config.detail_cache_ttl),
        }
    }

    async fn query<T: DeserializeOwned>(
        &self,
        operation: &str,
        query: &str,
        variables: Value,
    ) -> Result<T, CoreError> {
        let data = self
            .transport
            .execute(GraphqlRequest::new(query, variables))
            .await?;
        serde_json::from_value(data).map_err(|error| {
            CoreError::MalformedResponse(format!(
                "failed to decode Linear {operation} payload: {error}"
            ))
        })
    }
}

#[async_trait]
impl IssueDirectory for LinearDirectoryClient {
    async fn list_projects(&self) -> NameIndex<ProjectId> {
        if let Some(projects) = self.projects.get(&()) {
            return projects;
        }

        match self
            .query::<ProjectsData>("projects", PROJECTS_QUERY, json!({}))
            .await
        {
            Ok(payload) => {
                let projects = payload.projects.into_index();
                debug!(count = projects.len(), "fetched Linear projects");
                self.projects.insert((), projects.clone());
                projects
            }
            Err(error) => {
                warn!(error = %error, "failed to list Linear projects");
                NameIndex::new()
            }
        }
    }

    async fn project_details(&self, project_id: &ProjectId) -> ProjectDetails {
        if let Some(details) = self.project_details.get(project_id) {
            return details;
        }

        match self
            .query::<ProjectDetailsData>(
                "project details",
                PROJECT_DETAILS_QUERY,
                json!({ "id": project_id.as_str() }),
            )
            .await
        {
            Ok(payload) => {
                let Some(project) = payload.project else {
                    warn!(project = %project_id, "Linear returned no project for id");
                    return ProjectDetails::default();
                };
                let details = ProjectDetails {
                    teams: project.teams.into_index(),
                    milestones: project.project_milestones.into_index(),
                };
                debug!(
                    project = %project_id,
                    teams = details.teams.len(),
                    milestones = details.milestones.len(),
                    "fetched Linear project details"
                );
                self.project_details
                    .insert(project_id.clone(), details.clone());
                details
            }
            Err(error) => {
                warn!(
                    project = %project_id,
                    error = %error,
                    "failed to fetch Linear project details"
                );
                ProjectDetails::default()
            }
        }
    }

    async fn list_teams(&self) -> NameIndex<TeamId> {
        if let Some(teams) = self.teams.get(&()) {
            return teams;
        }

        match self
            .query::<ViewerTeamsData>("teams", VIEWER_TEAMS_QUERY, json!({}))
            .await
        {
            Ok(payload) => {
                let teams = payload.viewer.teams.into_index();
                debug!(count = teams.len(), "fetched Linear teams");
                self.teams.insert((), teams.clone());
                teams
            }
            Err(error) => {
                warn!(error = %error, "failed to list Linear teams");
                NameIndex::new()
            }
        }
    }

    async fn list_workflow_states(&self, team_id: &TeamId) -> NameIndex<WorkflowStateId> {
        if let Some(states) = self.workflow_states.get(team_id) {
            return states;
        }

        match self
            .query::<TeamStatesData>(
                "workflow states",
                TEAM_WORKFLOW_STATES_QUERY,
                json!({ "teamId": team_id.as_str() }),
            )
            .await
        {
            Ok(payload) => {
                let Some(team) = payload.team else {
                    warn!(team = %team_id, "Linear returned no team for id");
                    return NameIndex::new();
                };
                let states = team.states.into_index();
                self.workflow_states.insert(team_id.clone(), states.clone());
                states
            }
            Err(error) => {
                warn!(
                    team = %team_id,
                    error = %error,
                    "failed to list Linear workflow states"
                );
                NameIndex::new()
            }
        }
    }

    async fn create_issue(&self, request: CreateIssueRequest) -> Result<CreatedIssue, CoreError> {
        let input = issue_create_input(&request);
        let payload: IssueCreateData = self
            .query(
                "issue create",
                ISSUE_CREATE_MUTATION,
                json!({ "input": input }),
            )
            .await?;

        let result = payload.issue_create;
        let issue = match (result.success, result.issue) {
            (true, Some(issue)) => issue,
            _ => {
                return Err(CoreError::RemoteApplication(format!(
                    "Linear did not create issue `{}`.",
                    request.submitted_title()
                )))
            }
        };

        Ok(CreatedIssue {
            id: IssueId::new(issue.id),
            identifier: issue.identifier,
            title: issue.title,
            url: issue.url,
            project_name: issue.project.map(|project| project.name),
        })
    }
}

/// `IssueCreateInput` with absent fields left out rather than sent as null.
fn issue_create_input(request: &CreateIssueRequest) -> Value {
    let mut input = Map::new();
    input.insert("teamId".to_owned(), json!(request.team_id.as_str()));
    input.insert("title".to_owned(), json!(truncate_title(&request.title)));
    if let Some(description) = request.description.as_deref() {
        input.insert("description".to_owned(), json!(description));
    }
    if let Some(project_id) = request.project_id.as_ref() {
        input.insert("projectId".to_owned(), json!(project_id.as_str()));
    }
    if let Some(milestone_id) = request.milestone_id.as_ref() {
        input.insert("projectMilestoneId".to_owned(), json!(milestone_id.as_str()));
    }
    if let Some(state_id) = request.state_id.as_ref() {
        input.insert("stateId".to_owned(), json!(state_id.as_str()));
    }
    Value::Object(input)
}

#[derive(Debug, Deserialize)]
struct NamedNode {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct NamedNodeConnection {
    nodes: Vec<NamedNode>,
}

impl NamedNodeConnection {
    fn into_index<Id: Clone + PartialEq + From<String>>(self) -> NameIndex<Id> {
        self.nodes
            .into_iter()
            .map(|node| (node.name, Id::from(node.id)))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct ProjectsData {
    projects: NamedNodeConnection,
}

#[derive(Debug, Deserialize)]
struct ProjectDetailsData {
    project: Option<ProjectDetailsNode>,
}

#[derive(Debug, Deserialize)]
struct ProjectDetailsNode {
    teams: NamedNodeConnection,
    #[serde(rename = "projectMilestones")]
    project_milestones: NamedNodeConnection,
}

#[derive(Debug, Deserialize)]
struct ViewerTeamsData {
    viewer: ViewerTeamsNode,
}

#[derive(Debug, Deserialize)]
struct ViewerTeamsNode {
    teams: NamedNodeConnection,
}

#[derive(Debug, Deserialize)]
struct TeamStatesData {
    team: Option<TeamStatesNode>,
}

#[derive(Debug, Deserialize)]
struct TeamStatesNode {
    states: NamedNodeConnection,
}

#[derive(Debug, Deserialize)]
struct IssueCreateData {
    #[serde(rename = "issueCreate")]
    issue_create: IssueCreateResult,
}

#[derive(Debug, Deserialize)]
struct IssueCreateResult {
    success: bool,
    issue: Option<CreatedIssueNode>,
}

#[derive(Debug, Deserialize)]
struct CreatedIssueNode {
    id: String,
    identifier: String,
    title: String,
    url: Option<String>,
    project: Option<ProjectNameNode>,
}

#[derive(Debug, Deserialize)]
struct ProjectNameNode {
    name: String,
}
