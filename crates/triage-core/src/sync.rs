use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::assignment::AssignmentContext;
use crate::directory::{truncate_title, CreateIssueRequest, CreatedIssue, IssueDirectory};
use crate::drafts::IssueDraft;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BatchRejection {
    #[error("Nothing to submit: every draft is marked for deletion.")]
    NothingToSubmit,
    #[error("A team is required to create issues.")]
    MissingTeam,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionResult {
    Created(CreatedIssue),
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    pub draft: IssueDraft,
    pub result: SubmissionResult,
}

impl SubmissionOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self.result, SubmissionResult::Created(_))
    }
}

impl fmt::Display for SubmissionOutcome {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            SubmissionResult::Created(issue) => {
                write!(formatter, "Success: {} - {}", issue.identifier, issue.title)?;
                if let Some(project) = issue.project_name.as_deref() {
                    write!(formatter, " (Project: {project})")?;
                }
                Ok(())
            }
            SubmissionResult::Failed { .. } => {
                write!(formatter, "Failed to create: {}", self.draft.title)
            }
        }
    }
}

/// Interim state handed to the caller after each draft is attempted.
#[derive(Debug, Clone, Copy)]
pub struct SubmissionProgress<'a> {
    pub position: usize,
    pub total: usize,
    pub outcome: &'a SubmissionOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub outcomes: Vec<SubmissionOutcome>,
}

impl BatchReport {
    pub fn created(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.is_created())
            .count()
    }

    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failed(&self) -> impl Iterator<Item = &SubmissionOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.is_created())
    }

    pub fn summary(&self) -> String {
        format!(
            "Process Complete. Created {} of {} issues.",
            self.created(),
            self.attempted()
        )
    }
}

#[derive(Clone)]
pub struct BatchSyncEngine {
    directory: Arc<dyn IssueDirectory>,
}

impl fmt::Debug for BatchSyncEngine {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("BatchSyncEngine").finish_non_exhaustive()
    }
}

impl BatchSyncEngine {
    pub fn new(directory: Arc<dyn IssueDirectory>) -> Self {
        Self { directory }
    }

    /// Creates every surviving draft in order. A failed draft never stops the
    /// run; it is recorded and the next draft is attempted.
    pub async fn submit<F>(
        &self,
        drafts: Vec<IssueDraft>,
        context: &AssignmentContext,
        mut on_outcome: F,
    ) -> Result<BatchReport, BatchRejection>
    where
        F: FnMut(SubmissionProgress<'_>) + Send,
    {
        let surviving: Vec<IssueDraft> = drafts
            .into_iter()
            .filter(|draft| !draft.marked_for_deletion)
            .collect();
        if surviving.is_empty() {
            return Err(BatchRejection::NothingToSubmit);
        }
        let team_id = context.team_id.clone().ok_or(BatchRejection::MissingTeam)?;

        let total = surviving.len();
        let mut report = BatchReport {
            outcomes: Vec::with_capacity(total),
        };
        for (index, draft) in surviving.into_iter().enumerate() {
            let request = CreateIssueRequest {
                team_id: team_id.clone(),
                title: truncate_title(&draft.title),
                // Whitespace-only descriptions are left out of the input rather than sent as "".
                description: Some(draft.description.trim().to_owned())
                    .filter(|description| !description.is_empty()),
                project_id: context.project_id.clone(),
                milestone_id: context.milestone_id.clone(),
                state_id: context.state_id.clone(),
            };

            let result = match self.directory.create_issue(request).await {
                Ok(issue) => {
                    info!(identifier = %issue.identifier, title = %issue.title, "created issue");
                    SubmissionResult::Created(issue)
                }
                Err(error) => {
                    warn!(title = %draft.title, error = %error, "issue creation failed");
                    SubmissionResult::Failed {
                        reason: error.to_string(),
                    }
                }
            };

            report.outcomes.push(SubmissionOutcome { draft, result });
            if let Some(outcome) = report.outcomes.last() {
                on_outcome(SubmissionProgress {
                    position: index + 1,
                    total,
                    outcome,
                });
            }
        }

        info!(
            created = report.created(),
            attempted = report.attempted(),
            "batch submission finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::MAX_TITLE_CHARS;
    use crate::error::CoreError;
    use crate::identifiers::{IssueId, ProjectId, TeamId, WorkflowStateId};
    use crate::test_support::{created_issue, StubDirectory};

    fn context() -> AssignmentContext {
        AssignmentContext {
            team_id: Some(TeamId::new("team-core")),
            ..AssignmentContext::default()
        }
    }

    #[tokio::test]
    async fn failure_in_the_middle_does_not_stop_the_batch() {
        let directory = Arc::new(StubDirectory::default());
        directory.push_create_result(Ok(created_issue("ENG-1", "First"))).await;
        directory
            .push_create_result(Err(CoreError::DependencyUnavailable(
                "request timed out".to_owned(),
            )))
            .await;
        directory.push_create_result(Ok(created_issue("ENG-2", "Third"))).await;

        let engine = BatchSyncEngine::new(directory.clone());
        let mut seen = Vec::new();
        let report = engine
            .submit(
                vec![
                    IssueDraft::new("First", ""),
                    IssueDraft::new("Second", ""),
                    IssueDraft::new("Third", ""),
                ],
                &context(),
                |progress| {
                    seen.push((
                        progress.position,
                        progress.total,
                        progress.outcome.is_created(),
                    ))
                },
            )
            .await
            .expect("batch accepted");

        assert_eq!(directory.create_requests().await.len(), 3);
        assert_eq!(seen, vec![(1, 3, true), (2, 3, false), (3, 3, true)]);
        assert_eq!(report.created(), 2);
        assert_eq!(report.attempted(), 3);
        assert_eq!(report.summary(), "Process Complete. Created 2 of 3 issues.");
        assert_eq!(report.outcomes[1].to_string(), "Failed to create: Second");
    }

    #[tokio::test]
    async fn long_titles_are_truncated_before_the_create_call() {
        let directory = Arc::new(StubDirectory::default());
        let engine = BatchSyncEngine::new(directory.clone());

        engine
            .submit(vec![IssueDraft::new("x".repeat(400), "")], &context(), |_| {})
            .await
            .expect("batch accepted");

        let sent = directory.create_requests().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].title.chars().count(), MAX_TITLE_CHARS);
        assert_eq!(sent[0].title, "x".repeat(MAX_TITLE_CHARS));
    }

    #[tokio::test]
    async fn deleted_drafts_produce_no_outcome() {
        let directory = Arc::new(StubDirectory::default());
        let engine = BatchSyncEngine::new(directory.clone());
        let mut deleted = IssueDraft::new("Duplicate", "");
        deleted.marked_for_deletion = true;

        let report = engine
            .submit(
                vec![deleted.clone(), IssueDraft::new("Keep me", "- detail")],
                &context(),
                |_| {},
            )
            .await
            .expect("batch accepted");

        assert_eq!(report.attempted(), 1);
        assert_eq!(report.outcomes[0].draft.title, "Keep me");
        assert!(report.outcomes.iter().all(|outcome| outcome.draft != deleted));

        let rejection = engine
            .submit(vec![deleted], &context(), |_| {})
            .await
            .expect_err("nothing left to submit");
        assert_eq!(rejection, BatchRejection::NothingToSubmit);
        assert_eq!(directory.create_requests().await.len(), 1);
    }

    #[tokio::test]
    async fn batch_without_team_is_rejected_before_any_call() {
        let directory = Arc::new(StubDirectory::default());
        let engine = BatchSyncEngine::new(directory.clone());

        let rejection = engine
            .submit(
                vec![IssueDraft::new("Title", "")],
                &AssignmentContext::default(),
                |_| {},
            )
            .await
            .expect_err("team required");

        assert_eq!(rejection, BatchRejection::MissingTeam);
        assert!(directory.create_requests().await.is_empty());
    }

    #[tokio::test]
    async fn context_fields_are_forwarded_and_blank_description_omitted() {
        let directory = Arc::new(StubDirectory::default());
        let engine = BatchSyncEngine::new(directory.clone());
        let context = AssignmentContext {
            project_id: Some(ProjectId::new("proj-web")),
            team_id: Some(TeamId::new("team-fe")),
            milestone_id: None,
            state_id: Some(WorkflowStateId::new("state-todo")),
        };

        engine
            .submit(
                vec![IssueDraft::new("Login fails on Safari", "   ")],
                &context,
                |_| {},
            )
            .await
            .expect("batch accepted");

        assert_eq!(
            directory.create_requests().await,
            vec![CreateIssueRequest {
                team_id: TeamId::new("team-fe"),
                title: "Login fails on Safari".to_owned(),
                description: None,
                project_id: Some(ProjectId::new("proj-web")),
                milestone_id: None,
                state_id: Some(WorkflowStateId::new("state-todo")),
            }]
        );
    }

    #[test]
    fn success_line_mentions_project_when_known() {
        let outcome = SubmissionOutcome {
            draft: IssueDraft::new("Login fails", ""),
            result: SubmissionResult::Created(CreatedIssue {
                id: IssueId::new("issue-1"),
                identifier: "WEB-12".to_owned(),
                title: "Login fails".to_owned(),
                url: None,
                project_name: Some("Website".to_owned()),
            }),
        };

        assert_eq!(
            outcome.to_string(),
            "Success: WEB-12 - Login fails (Project: Website)"
        );
    }
}
