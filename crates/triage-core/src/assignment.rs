//! Resolution of the {project, team, milestone, workflow state} tuple an issue
//! is created under.
//!
//! The decision logic is pure: [`resolve_assignment`] works on a
//! [`DirectorySnapshot`] and never touches the network. [`AssignmentResolver`]
//! gathers the snapshot through an [`IssueDirectory`], fetching only the
//! listings the current selection needs.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::directory::{IssueDirectory, NameIndex, NamedEntity, ProjectDetails};
use crate::identifiers::{MilestoneId, ProjectId, TeamId, WorkflowStateId};

pub const DEFAULT_WORKFLOW_STATE_NAME: &str = "Todo";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AssignmentContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<TeamId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub milestone_id: Option<MilestoneId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_id: Option<WorkflowStateId>,
}

impl AssignmentContext {
    /// Creation is allowed only once a team is known.
    pub fn is_complete(&self) -> bool {
        self.team_id.is_some()
    }
}

/// The user's choices, by display name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AssignmentSelection {
    project: Option<String>,
    milestone: Option<String>,
    team: Option<String>,
}

impl AssignmentSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    pub fn milestone(&self) -> Option<&str> {
        self.milestone.as_deref()
    }

    pub fn team(&self) -> Option<&str> {
        self.team.as_deref()
    }

    /// Changing the project (including to none) drops the milestone and team
    /// choices that were made against the previous project.
    pub fn select_project(&mut self, project: Option<String>) {
        let project = normalize_choice(project);
        if project != self.project {
            self.milestone = None;
            self.team = None;
        }
        self.project = project;
    }

    pub fn select_milestone(&mut self, milestone: Option<String>) {
        self.milestone = normalize_choice(milestone);
    }

    pub fn select_team(&mut self, team: Option<String>) {
        self.team = normalize_choice(team);
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.select_project(Some(project.into()));
        self
    }

    pub fn with_milestone(mut self, milestone: impl Into<String>) -> Self {
        self.select_milestone(Some(milestone.into()));
        self
    }

    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.select_team(Some(team.into()));
        self
    }
}

fn normalize_choice(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty() && !value.eq_ignore_ascii_case("none"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentDefaults {
    pub default_team_id: Option<TeamId>,
    pub workflow_state_name: String,
}

impl Default for AssignmentDefaults {
    fn default() -> Self {
        Self {
            default_team_id: None,
            workflow_state_name: DEFAULT_WORKFLOW_STATE_NAME.to_owned(),
        }
    }
}

/// Directory data the resolver decides on. Listings that were never fetched
/// are simply empty.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DirectorySnapshot {
    pub projects: NameIndex<ProjectId>,
    pub project_details: BTreeMap<ProjectId, ProjectDetails>,
    pub teams: NameIndex<TeamId>,
    pub workflow_states: BTreeMap<TeamId, NameIndex<WorkflowStateId>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TeamScope {
    Project,
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TeamSelectionSource {
    ProjectSingleTeam,
    Explicit,
    ConfiguredDefault,
    FirstAlphabetical,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamResolution {
    pub scope: TeamScope,
    pub options: NameIndex<TeamId>,
    pub selected: Option<NamedEntity<TeamId>>,
    pub source: Option<TeamSelectionSource>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NoticeSeverity {
    Info,
    Warning,
    Blocking,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentNotice {
    TeamAutoSelected { team: String },
    ProjectHasNoTeams { project: String },
    UnknownProject { project: String },
    UnknownMilestone { milestone: String },
    MilestoneWithoutProject { milestone: String },
    UnknownTeam { team: String, scope: TeamScope },
    TeamSelectionRequired { project: String, options: usize },
    NoTeamsAvailable,
    WorkflowStateMissing { state: String, team: String },
}

impl AssignmentNotice {
    pub fn severity(&self) -> NoticeSeverity {
        match self {
            Self::TeamAutoSelected { .. } => NoticeSeverity::Info,
            Self::UnknownProject { .. }
            | Self::UnknownTeam { .. }
            | Self::TeamSelectionRequired { .. }
            | Self::NoTeamsAvailable => NoticeSeverity::Blocking,
            _ => NoticeSeverity::Warning,
        }
    }
}

impl fmt::Display for AssignmentNotice {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TeamAutoSelected { team } => write!(formatter, "Auto-selected team: {team}"),
            Self::ProjectHasNoTeams { project } => write!(
                formatter,
                "Project `{project}` has no teams. Select a team from the full team listing."
            ),
            Self::UnknownProject { project } => {
                write!(formatter, "No project named `{project}` was found.")
            }
            Self::UnknownMilestone { milestone } => write!(
                formatter,
                "No milestone named `{milestone}` exists on the selected project."
            ),
            Self::MilestoneWithoutProject { milestone } => write!(
                formatter,
                "Milestone `{milestone}` ignored: milestones require a project."
            ),
            Self::UnknownTeam { team, scope } => match scope {
                TeamScope::Project => write!(
                    formatter,
                    "Team `{team}` is not one of the selected project's teams."
                ),
                TeamScope::Global => write!(formatter, "No team named `{team}` was found."),
            },
            Self::TeamSelectionRequired { project, options } => write!(
                formatter,
                "Project `{project}` has {options} teams. Choose one of them explicitly."
            ),
            Self::NoTeamsAvailable => {
                write!(formatter, "A team is required to create issues.")
            }
            Self::WorkflowStateMissing { state, team } => write!(
                formatter,
                "Could not find '{state}' state for team `{team}`. Issues will be created with the default status."
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentResolution {
    pub context: AssignmentContext,
    pub project: Option<NamedEntity<ProjectId>>,
    pub milestone: Option<NamedEntity<MilestoneId>>,
    pub milestone_options: NameIndex<MilestoneId>,
    pub team: TeamResolution,
    pub workflow_state: Option<NamedEntity<WorkflowStateId>>,
    pub notices: Vec<AssignmentNotice>,
}

impl AssignmentResolution {
    pub fn is_complete(&self) -> bool {
        self.context.is_complete()
    }

    pub fn notices_at_least(&self, severity: NoticeSeverity) -> Vec<&AssignmentNotice> {
        self.notices
            .iter()
            .filter(|notice| notice.severity() >= severity)
            .collect()
    }
}

/// A chosen project together with the teams attached to it.
#[derive(Debug, Clone, Copy)]
pub struct ProjectTeams<'a> {
    pub project: &'a NamedEntity<ProjectId>,
    pub teams: &'a NameIndex<TeamId>,
}

/// Whether team resolution has to fall back to the full team listing.
pub fn needs_global_teams(project_details: Option<&ProjectDetails>) -> bool {
    project_details
        .map(|details| details.teams.is_empty())
        .unwrap_or(true)
}

pub fn resolve_team(
    project: Option<ProjectTeams<'_>>,
    all_teams: &NameIndex<TeamId>,
    chosen_team: Option<&str>,
    default_team_id: Option<&TeamId>,
) -> (TeamResolution, Vec<AssignmentNotice>) {
    let mut notices = Vec::new();

    if let Some(ProjectTeams { project, teams }) = project {
        if let Some(team) = teams.single() {
            notices.push(AssignmentNotice::TeamAutoSelected {
                team: team.name.clone(),
            });
            return (
                TeamResolution {
                    scope: TeamScope::Project,
                    options: teams.clone(),
                    selected: Some(team),
                    source: Some(TeamSelectionSource::ProjectSingleTeam),
                },
                notices,
            );
        }

        if teams.len() > 1 {
            let selected = chosen_team.and_then(|name| teams.entity(name));
            if selected.is_none() {
                if let Some(name) = chosen_team {
                    notices.push(AssignmentNotice::UnknownTeam {
                        team: name.to_owned(),
                        scope: TeamScope::Project,
                    });
                }
                notices.push(AssignmentNotice::TeamSelectionRequired {
                    project: project.name.clone(),
                    options: teams.len(),
                });
            }
            let source = selected.as_ref().map(|_| TeamSelectionSource::Explicit);
            return (
                TeamResolution {
                    scope: TeamScope::Project,
                    options: teams.clone(),
                    selected,
                    source,
                },
                notices,
            );
        }

        notices.push(AssignmentNotice::ProjectHasNoTeams {
            project: project.name.clone(),
        });
    }

    if all_teams.is_empty() {
        notices.push(AssignmentNotice::NoTeamsAvailable);
        return (
            TeamResolution {
                scope: TeamScope::Global,
                options: NameIndex::new(),
                selected: None,
                source: None,
            },
            notices,
        );
    }

    // A named team that is not listed never falls back to another team.
    if let Some(name) = chosen_team {
        let selected = all_teams.entity(name);
        if selected.is_none() {
            notices.push(AssignmentNotice::UnknownTeam {
                team: name.to_owned(),
                scope: TeamScope::Global,
            });
        }
        let source = selected.as_ref().map(|_| TeamSelectionSource::Explicit);
        return (
            TeamResolution {
                scope: TeamScope::Global,
                options: all_teams.clone(),
                selected,
                source,
            },
            notices,
        );
    }

    let configured = default_team_id.and_then(|id| all_teams.entity_for_id(id));
    let (selected, source) = if let Some(team) = configured {
        (Some(team), TeamSelectionSource::ConfiguredDefault)
    } else {
        (all_teams.first(), TeamSelectionSource::FirstAlphabetical)
    };

    (
        TeamResolution {
            scope: TeamScope::Global,
            options: all_teams.clone(),
            source: selected.as_ref().map(|_| source),
            selected,
        },
        notices,
    )
}

pub fn resolve_milestone(
    project_selected: bool,
    milestones: &NameIndex<MilestoneId>,
    chosen_milestone: Option<&str>,
) -> (Option<NamedEntity<MilestoneId>>, Option<AssignmentNotice>) {
    let Some(name) = chosen_milestone else {
        return (None, None);
    };
    if !project_selected {
        return (
            None,
            Some(AssignmentNotice::MilestoneWithoutProject {
                milestone: name.to_owned(),
            }),
        );
    }

    match milestones.entity(name) {
        Some(milestone) => (Some(milestone), None),
        None => (
            None,
            Some(AssignmentNotice::UnknownMilestone {
                milestone: name.to_owned(),
            }),
        ),
    }
}

/// Exact, case-sensitive match of the target state name.
pub fn resolve_workflow_state(
    states: &NameIndex<WorkflowStateId>,
    target_state: &str,
    team_name: &str,
) -> (Option<NamedEntity<WorkflowStateId>>, Option<AssignmentNotice>) {
    match states.entity(target_state) {
        Some(state) => (Some(state), None),
        None => (
            None,
            Some(AssignmentNotice::WorkflowStateMissing {
                state: target_state.to_owned(),
                team: team_name.to_owned(),
            }),
        ),
    }
}

pub fn resolve_assignment(
    selection: &AssignmentSelection,
    snapshot: &DirectorySnapshot,
    defaults: &AssignmentDefaults,
) -> AssignmentResolution {
    let mut notices = Vec::new();

    let project = selection
        .project()
        .and_then(|name| snapshot.projects.entity(name));
    if let (Some(name), None) = (selection.project(), project.as_ref()) {
        // Nothing is created until the named project resolves.
        notices.push(AssignmentNotice::UnknownProject {
            project: name.to_owned(),
        });
        return AssignmentResolution {
            context: AssignmentContext::default(),
            project: None,
            milestone: None,
            milestone_options: NameIndex::new(),
            team: TeamResolution {
                scope: TeamScope::Global,
                options: snapshot.teams.clone(),
                selected: None,
                source: None,
            },
            workflow_state: None,
            notices,
        };
    }

    let empty_details = ProjectDetails::default();
    let details = project
        .as_ref()
        .map(|project| {
            snapshot
                .project_details
                .get(&project.id)
                .unwrap_or(&empty_details)
        });

    let (team, team_notices) = resolve_team(
        project.as_ref().zip(details).map(|(project, details)| ProjectTeams {
            project,
            teams: &details.teams,
        }),
        &snapshot.teams,
        selection.team(),
        defaults.default_team_id.as_ref(),
    );
    notices.extend(team_notices);

    let milestone_options = details
        .map(|details| details.milestones.clone())
        .unwrap_or_default();
    let (milestone, milestone_notice) =
        resolve_milestone(project.is_some(), &milestone_options, selection.milestone());
    notices.extend(milestone_notice);

    let empty_states = NameIndex::new();
    let workflow_state = team.selected.as_ref().and_then(|selected| {
        let states = snapshot
            .workflow_states
            .get(&selected.id)
            .unwrap_or(&empty_states);
        let (state, notice) =
            resolve_workflow_state(states, &defaults.workflow_state_name, &selected.name);
        notices.extend(notice);
        state
    });

    let context = AssignmentContext {
        project_id: project.as_ref().map(|project| project.id.clone()),
        team_id: team.selected.as_ref().map(|team| team.id.clone()),
        milestone_id: milestone.as_ref().map(|milestone| milestone.id.clone()),
        state_id: workflow_state.as_ref().map(|state| state.id.clone()),
    };

    AssignmentResolution {
        context,
        project,
        milestone,
        milestone_options,
        team,
        workflow_state,
        notices,
    }
}

#[derive(Clone)]
pub struct AssignmentResolver {
    directory: Arc<dyn IssueDirectory>,
    defaults: AssignmentDefaults,
}

impl fmt::Debug for AssignmentResolver {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AssignmentResolver")
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

impl AssignmentResolver {
    pub fn new(directory: Arc<dyn IssueDirectory>, defaults: AssignmentDefaults) -> Self {
        Self {
            directory,
            defaults,
        }
    }

    pub fn defaults(&self) -> &AssignmentDefaults {
        &self.defaults
    }

    /// Fetches the listings `selection` depends on, in cascade order.
    pub async fn snapshot(&self, selection: &AssignmentSelection) -> DirectorySnapshot {
        let mut snapshot = DirectorySnapshot {
            projects: self.directory.list_projects().await,
            ..DirectorySnapshot::default()
        };

        let project = selection
            .project()
            .and_then(|name| snapshot.projects.entity(name));
        if let Some(project) = project.as_ref() {
            let details = self.directory.project_details(&project.id).await;
            snapshot.project_details.insert(project.id.clone(), details);
        }
        let project_missing = selection.project().is_some() && project.is_none();

        let details = project
            .as_ref()
            .and_then(|project| snapshot.project_details.get(&project.id));
        if needs_global_teams(details) {
            snapshot.teams = self.directory.list_teams().await;
        }
        if project_missing {
            return snapshot;
        }

        let details = project
            .as_ref()
            .and_then(|project| snapshot.project_details.get(&project.id));
        let (team, _) = resolve_team(
            project.as_ref().zip(details).map(|(project, details)| ProjectTeams {
                project,
                teams: &details.teams,
            }),
            &snapshot.teams,
            selection.team(),
            self.defaults.default_team_id.as_ref(),
        );
        if let Some(team) = team.selected {
            let states = self.directory.list_workflow_states(&team.id).await;
            snapshot.workflow_states.insert(team.id, states);
        }

        snapshot
    }

    pub async fn resolve(&self, selection: &AssignmentSelection) -> AssignmentResolution {
        let snapshot = self.snapshot(selection).await;
        let resolution = resolve_assignment(selection, &snapshot, &self.defaults);
        debug!(
            project = ?resolution.context.project_id,
            team = ?resolution.context.team_id,
            milestone = ?resolution.context.milestone_id,
            state = ?resolution.context.state_id,
            notices = resolution.notices.len(),
            "resolved assignment context"
        );
        resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubDirectory;

    fn index<Id: Clone + PartialEq + From<&'static str>>(
        entries: &[(&'static str, &'static str)],
    ) -> NameIndex<Id> {
        NameIndex::from_entities(
            entries
                .iter()
                .map(|(name, id)| NamedEntity::new(*name, Id::from(*id))),
        )
    }

    fn snapshot_with_project(
        project_teams: &[(&'static str, &'static str)],
        all_teams: &[(&'static str, &'static str)],
    ) -> DirectorySnapshot {
        let mut snapshot = DirectorySnapshot {
            projects: index(&[("Website", "proj-web"), ("Mobile App", "proj-mobile")]),
            teams: index(all_teams),
            ..DirectorySnapshot::default()
        };
        snapshot.project_details.insert(
            ProjectId::new("proj-web"),
            ProjectDetails {
                teams: index(project_teams),
                milestones: index(&[("Beta", "ms-beta"), ("GA", "ms-ga")]),
            },
        );
        snapshot
    }

    #[test]
    fn single_project_team_is_auto_selected_with_info_notice() {
        let snapshot = snapshot_with_project(&[("Frontend", "team-fe")], &[]);
        let selection = AssignmentSelection::new().with_project("Website");

        let resolution = resolve_assignment(&selection, &snapshot, &AssignmentDefaults::default());

        assert_eq!(resolution.context.team_id, Some(TeamId::new("team-fe")));
        assert_eq!(resolution.context.project_id, Some(ProjectId::new("proj-web")));
        assert_eq!(
            resolution.team.source,
            Some(TeamSelectionSource::ProjectSingleTeam)
        );
        assert!(resolution.notices.contains(&AssignmentNotice::TeamAutoSelected {
            team: "Frontend".to_owned()
        }));
        assert!(resolution.notices_at_least(NoticeSeverity::Blocking).is_empty());
    }

    #[test]
    fn multi_team_project_requires_choice_among_its_own_teams() {
        let snapshot = snapshot_with_project(
            &[("Frontend", "team-fe"), ("Backend", "team-be")],
            &[("Ops", "team-ops")],
        );
        let selection = AssignmentSelection::new().with_project("Website");

        let resolution = resolve_assignment(&selection, &snapshot, &AssignmentDefaults::default());

        assert!(!resolution.is_complete());
        assert_eq!(resolution.team.scope, TeamScope::Project);
        assert_eq!(
            resolution.team.options.names().collect::<Vec<_>>(),
            vec!["Backend", "Frontend"]
        );
        assert!(resolution
            .notices
            .contains(&AssignmentNotice::TeamSelectionRequired {
                project: "Website".to_owned(),
                options: 2
            }));
    }

    #[test]
    fn multi_team_project_rejects_team_outside_the_project() {
        let snapshot = snapshot_with_project(
            &[("Frontend", "team-fe"), ("Backend", "team-be")],
            &[("Ops", "team-ops")],
        );
        let mut selection = AssignmentSelection::new().with_project("Website");
        selection.select_team(Some("Ops".to_owned()));

        let resolution = resolve_assignment(&selection, &snapshot, &AssignmentDefaults::default());

        assert_eq!(resolution.context.team_id, None);
        assert!(resolution.notices.contains(&AssignmentNotice::UnknownTeam {
            team: "Ops".to_owned(),
            scope: TeamScope::Project
        }));

        selection.select_team(Some("Backend".to_owned()));
        let resolution = resolve_assignment(&selection, &snapshot, &AssignmentDefaults::default());
        assert_eq!(resolution.context.team_id, Some(TeamId::new("team-be")));
        assert_eq!(resolution.team.source, Some(TeamSelectionSource::Explicit));
    }

    #[test]
    fn teamless_project_falls_back_to_global_listing() {
        let snapshot = snapshot_with_project(&[], &[("Ops", "team-ops"), ("Core", "team-core")]);
        let selection = AssignmentSelection::new().with_project("Website");

        let resolution = resolve_assignment(&selection, &snapshot, &AssignmentDefaults::default());

        assert_eq!(resolution.team.scope, TeamScope::Global);
        assert_eq!(resolution.context.team_id, Some(TeamId::new("team-core")));
        assert_eq!(resolution.context.project_id, Some(ProjectId::new("proj-web")));
        assert!(resolution.notices.contains(&AssignmentNotice::ProjectHasNoTeams {
            project: "Website".to_owned()
        }));
        assert!(resolution.is_complete());
    }

    #[test]
    fn configured_default_team_is_preselected_only_while_still_listed() {
        let snapshot = DirectorySnapshot {
            teams: index(&[("Ops", "team-ops"), ("Core", "team-core")]),
            ..DirectorySnapshot::default()
        };
        let defaults = AssignmentDefaults {
            default_team_id: Some(TeamId::new("team-ops")),
            ..AssignmentDefaults::default()
        };

        let resolution = resolve_assignment(&AssignmentSelection::new(), &snapshot, &defaults);
        assert_eq!(resolution.context.team_id, Some(TeamId::new("team-ops")));
        assert_eq!(
            resolution.team.source,
            Some(TeamSelectionSource::ConfiguredDefault)
        );

        let stale = AssignmentDefaults {
            default_team_id: Some(TeamId::new("team-deleted")),
            ..AssignmentDefaults::default()
        };
        let resolution = resolve_assignment(&AssignmentSelection::new(), &snapshot, &stale);
        assert_eq!(resolution.context.team_id, Some(TeamId::new("team-core")));
        assert_eq!(
            resolution.team.source,
            Some(TeamSelectionSource::FirstAlphabetical)
        );
    }

    #[test]
    fn unlisted_team_name_never_falls_back_to_another_team() {
        let snapshot = DirectorySnapshot {
            teams: index(&[("Ops", "team-ops"), ("Core", "team-core")]),
            ..DirectorySnapshot::default()
        };
        let defaults = AssignmentDefaults {
            default_team_id: Some(TeamId::new("team-ops")),
            ..AssignmentDefaults::default()
        };
        let selection = AssignmentSelection::new().with_team("Opz");

        let resolution = resolve_assignment(&selection, &snapshot, &defaults);

        assert!(!resolution.is_complete());
        assert_eq!(resolution.team.selected, None);
        assert_eq!(resolution.team.source, None);
        assert_eq!(resolution.team.options.len(), 2);
        assert_eq!(
            resolution.notices_at_least(NoticeSeverity::Blocking),
            vec![&AssignmentNotice::UnknownTeam {
                team: "Opz".to_owned(),
                scope: TeamScope::Global
            }]
        );
    }

    #[test]
    fn unlisted_project_name_blocks_creation() {
        let mut snapshot = snapshot_with_project(&[], &[("Core", "team-core")]);
        snapshot
            .workflow_states
            .insert(TeamId::new("team-core"), index(&[("Todo", "state-todo")]));
        let selection = AssignmentSelection::new()
            .with_project("Websit")
            .with_milestone("Beta");

        let resolution = resolve_assignment(&selection, &snapshot, &AssignmentDefaults::default());

        assert!(!resolution.is_complete());
        assert_eq!(resolution.context, AssignmentContext::default());
        assert_eq!(resolution.team.options.names().collect::<Vec<_>>(), vec!["Core"]);
        assert_eq!(
            resolution.notices,
            vec![AssignmentNotice::UnknownProject {
                project: "Websit".to_owned()
            }]
        );
        assert_eq!(resolution.notices[0].severity(), NoticeSeverity::Blocking);
    }

    #[test]
    fn no_teams_at_all_blocks_creation() {
        let resolution = resolve_assignment(
            &AssignmentSelection::new(),
            &DirectorySnapshot::default(),
            &AssignmentDefaults::default(),
        );

        assert!(!resolution.is_complete());
        assert!(resolution.notices.contains(&AssignmentNotice::NoTeamsAvailable));
        assert_eq!(resolution.context, AssignmentContext::default());
    }

    #[test]
    fn milestone_resolves_only_within_selected_project() {
        let snapshot = snapshot_with_project(&[("Frontend", "team-fe")], &[("Ops", "team-ops")]);

        let selection = AssignmentSelection::new()
            .with_project("Website")
            .with_milestone("Beta");
        let resolution = resolve_assignment(&selection, &snapshot, &AssignmentDefaults::default());
        assert_eq!(resolution.context.milestone_id, Some(MilestoneId::new("ms-beta")));

        let selection = AssignmentSelection::new().with_milestone("Beta");
        let resolution = resolve_assignment(&selection, &snapshot, &AssignmentDefaults::default());
        assert_eq!(resolution.context.milestone_id, None);
        assert!(resolution
            .notices
            .contains(&AssignmentNotice::MilestoneWithoutProject {
                milestone: "Beta".to_owned()
            }));
    }

    #[test]
    fn missing_todo_state_is_a_warning_not_a_block() {
        let mut snapshot = DirectorySnapshot {
            teams: index(&[("Core", "team-core")]),
            ..DirectorySnapshot::default()
        };
        snapshot.workflow_states.insert(
            TeamId::new("team-core"),
            index(&[("Backlog", "state-backlog"), ("todo", "state-lower")]),
        );

        let resolution = resolve_assignment(
            &AssignmentSelection::new(),
            &snapshot,
            &AssignmentDefaults::default(),
        );

        assert!(resolution.is_complete());
        assert_eq!(resolution.context.state_id, None);
        let warnings = resolution.notices_at_least(NoticeSeverity::Warning);
        assert_eq!(
            warnings,
            vec![&AssignmentNotice::WorkflowStateMissing {
                state: "Todo".to_owned(),
                team: "Core".to_owned()
            }]
        );
    }

    #[test]
    fn todo_state_resolves_by_exact_name() {
        let mut snapshot = DirectorySnapshot {
            teams: index(&[("Core", "team-core")]),
            ..DirectorySnapshot::default()
        };
        snapshot.workflow_states.insert(
            TeamId::new("team-core"),
            index(&[("Todo", "state-todo"), ("Done", "state-done")]),
        );

        let resolution = resolve_assignment(
            &AssignmentSelection::new(),
            &snapshot,
            &AssignmentDefaults::default(),
        );
        assert_eq!(
            resolution.context.state_id,
            Some(WorkflowStateId::new("state-todo"))
        );
    }

    #[test]
    fn switching_or_clearing_project_drops_project_scoped_choices() {
        let mut selection = AssignmentSelection::new()
            .with_project("Website")
            .with_milestone("Beta")
            .with_team("Frontend");

        selection.select_project(Some("Website".to_owned()));
        assert_eq!(selection.milestone(), Some("Beta"));
        assert_eq!(selection.team(), Some("Frontend"));

        selection.select_project(Some("Mobile App".to_owned()));
        assert_eq!(selection.milestone(), None);
        assert_eq!(selection.team(), None);

        let mut selection = AssignmentSelection::new()
            .with_project("Website")
            .with_milestone("Beta");
        selection.select_project(Some("None".to_owned()));
        assert_eq!(selection.project(), None);
        assert_eq!(selection.milestone(), None);
    }

    #[tokio::test]
    async fn resolver_fetches_only_what_the_selection_needs() {
        let directory = Arc::new(StubDirectory::default());
        directory
            .set_projects(index(&[("Website", "proj-web")]))
            .await;
        directory
            .set_project_details(
                "proj-web",
                ProjectDetails {
                    teams: index(&[("Frontend", "team-fe")]),
                    milestones: NameIndex::new(),
                },
            )
            .await;
        directory
            .set_workflow_states("team-fe", index(&[("Todo", "state-todo")]))
            .await;

        let resolver = AssignmentResolver::new(directory.clone(), AssignmentDefaults::default());
        let resolution = resolver
            .resolve(&AssignmentSelection::new().with_project("Website"))
            .await;

        assert_eq!(
            resolution.context,
            AssignmentContext {
                project_id: Some(ProjectId::new("proj-web")),
                team_id: Some(TeamId::new("team-fe")),
                milestone_id: None,
                state_id: Some(WorkflowStateId::new("state-todo")),
            }
        );
        assert_eq!(
            directory.read_calls().await,
            vec![
                "list_projects".to_owned(),
                "project_details:proj-web".to_owned(),
                "list_workflow_states:team-fe".to_owned(),
            ]
        );
    }

    #[tokio::test]
    async fn resolver_uses_global_listing_without_project() {
        let directory = Arc::new(StubDirectory::default());
        directory
            .set_teams(index(&[("Ops", "team-ops"), ("Core", "team-core")]))
            .await;
        let defaults = AssignmentDefaults {
            default_team_id: Some(TeamId::new("team-ops")),
            ..AssignmentDefaults::default()
        };

        let resolver = AssignmentResolver::new(directory.clone(), defaults);
        let resolution = resolver.resolve(&AssignmentSelection::new()).await;

        assert_eq!(resolution.context.team_id, Some(TeamId::new("team-ops")));
        assert_eq!(resolution.context.project_id, None);
        assert_eq!(
            directory.read_calls().await,
            vec![
                "list_projects".to_owned(),
                "list_teams".to_owned(),
                "list_workflow_states:team-ops".to_owned(),
            ]
        );
    }

    #[tokio::test]
    async fn resolver_stops_at_team_listing_for_unknown_project() {
        let directory = Arc::new(StubDirectory::default());
        directory
            .set_projects(index(&[("Website", "proj-web")]))
            .await;
        directory
            .set_teams(index(&[("Core", "team-core")]))
            .await;

        let resolver = AssignmentResolver::new(directory.clone(), AssignmentDefaults::default());
        let resolution = resolver
            .resolve(&AssignmentSelection::new().with_project("Websit"))
            .await;

        assert_eq!(resolution.context.team_id, None);
        assert_eq!(
            directory.read_calls().await,
            vec!["list_projects".to_owned(), "list_teams".to_owned()]
        );
    }
}
