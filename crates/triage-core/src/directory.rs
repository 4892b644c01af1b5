//! Directory lookups against the tracking service and the issue-creation seam.
//!
//! Reads are fail-open: an implementation absorbs transport and decoding
//! failures and hands back an empty [`NameIndex`]. Creation is fail-loud and
//! returns an explicit `Result`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::identifiers::{IssueId, MilestoneId, ProjectId, TeamId, WorkflowStateId};

/// Hard limit the tracking service enforces on issue titles, in characters.
pub const MAX_TITLE_CHARS: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedEntity<Id> {
    pub name: String,
    pub id: Id,
}

impl<Id> NamedEntity<Id> {
    pub fn new(name: impl Into<String>, id: impl Into<Id>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }
}

/// Name to identifier mapping for one listing scope, ordered by name.
///
/// Names are unique within a listing; when a response repeats a name the last
/// entry wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameIndex<Id> {
    entries: BTreeMap<String, Id>,
}

impl<Id> Default for NameIndex<Id> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<Id: Clone + PartialEq> NameIndex<Id> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entities(entities: impl IntoIterator<Item = NamedEntity<Id>>) -> Self {
        entities
            .into_iter()
            .map(|entity| (entity.name, entity.id))
            .collect()
    }

    pub fn insert(&mut self, name: impl Into<String>, id: Id) {
        self.entries.insert(name.into(), id);
    }

    pub fn id_for(&self, name: &str) -> Option<&Id> {
        self.entries.get(name)
    }

    pub fn name_for(&self, id: &Id) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, candidate)| *candidate == id)
            .map(|(name, _)| name.as_str())
    }

    pub fn contains_id(&self, id: &Id) -> bool {
        self.entries.values().any(|candidate| candidate == id)
    }

    pub fn entity(&self, name: &str) -> Option<NamedEntity<Id>> {
        self.entries.get_key_value(name).map(|(name, id)| NamedEntity {
            name: name.clone(),
            id: id.clone(),
        })
    }

    pub fn entity_for_id(&self, id: &Id) -> Option<NamedEntity<Id>> {
        self.name_for(id).and_then(|name| self.entity(name))
    }

    /// First entry in name order.
    pub fn first(&self) -> Option<NamedEntity<Id>> {
        self.entries.iter().next().map(|(name, id)| NamedEntity {
            name: name.clone(),
            id: id.clone(),
        })
    }

    /// The only entry, when the listing has exactly one.
    pub fn single(&self) -> Option<NamedEntity<Id>> {
        if self.entries.len() == 1 {
            self.first()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entities(&self) -> Vec<NamedEntity<Id>> {
        self.entries
            .iter()
            .map(|(name, id)| NamedEntity {
                name: name.clone(),
                id: id.clone(),
            })
            .collect()
    }
}

impl<Id> FromIterator<(String, Id)> for NameIndex<Id> {
    fn from_iter<T: IntoIterator<Item = (String, Id)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProjectDetails {
    pub teams: NameIndex<TeamId>,
    pub milestones: NameIndex<MilestoneId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateIssueRequest {
    pub team_id: TeamId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub milestone_id: Option<MilestoneId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_id: Option<WorkflowStateId>,
}

impl CreateIssueRequest {
    /// Title as it may be sent to the remote service.
    pub fn submitted_title(&self) -> String {
        truncate_title(&self.title)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedIssue {
    pub id: IssueId,
    pub identifier: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
}

pub fn truncate_title(title: &str) -> String {
    title.chars().take(MAX_TITLE_CHARS).collect()
}

#[async_trait]
pub trait IssueDirectory: Send + Sync {
    async fn list_projects(&self) -> NameIndex<ProjectId>;
    async fn project_details(&self, project_id: &ProjectId) -> ProjectDetails;
    async fn list_teams(&self) -> NameIndex<TeamId>;
    async fn list_workflow_states(&self, team_id: &TeamId) -> NameIndex<WorkflowStateId>;
    async fn create_issue(&self, request: CreateIssueRequest) -> Result<CreatedIssue, CoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn teams() -> NameIndex<TeamId> {
        NameIndex::from_entities([
            NamedEntity::new("Platform", "team-platform"),
            NamedEntity::new("Design", "team-design"),
            NamedEntity::new("Mobile", "team-mobile"),
        ])
    }

    #[test]
    fn name_index_orders_by_name() {
        let index = teams();
        assert_eq!(
            index.names().collect::<Vec<_>>(),
            vec!["Design", "Mobile", "Platform"]
        );
        assert_eq!(
            index.first(),
            Some(NamedEntity::new("Design", "team-design"))
        );
    }

    #[test]
    fn name_index_resolves_in_both_directions() {
        let index = teams();
        assert_eq!(index.id_for("Mobile"), Some(&TeamId::new("team-mobile")));
        assert_eq!(index.name_for(&TeamId::new("team-platform")), Some("Platform"));
        assert!(index.contains_id(&TeamId::new("team-design")));
        assert!(!index.contains_id(&TeamId::new("team-unknown")));
        assert_eq!(index.id_for("mobile"), None);
    }

    #[test]
    fn single_only_returns_sole_entry() {
        assert_eq!(teams().single(), None);
        let one = NameIndex::from_entities([NamedEntity::new("Core", "team-core")]);
        assert_eq!(
            one.single(),
            Some(NamedEntity::<TeamId>::new("Core", "team-core"))
        );
        assert_eq!(NameIndex::<TeamId>::new().single(), None);
    }

    #[test]
    fn truncate_title_counts_characters_not_bytes() {
        let long = "é".repeat(300);
        let truncated = truncate_title(&long);
        assert_eq!(truncated.chars().count(), MAX_TITLE_CHARS);

        let short = "Login fails on Safari";
        assert_eq!(truncate_title(short), short);
    }
}
