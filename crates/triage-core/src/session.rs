//! The intake workflow controller: one selection, one batch of drafts under
//! review, and the collaborators that act on them.

use thiserror::Error;
use tracing::info;

use crate::assignment::{AssignmentResolution, AssignmentResolver, AssignmentSelection};
use crate::drafts::{DraftEditError, DraftReviewStore, IssueDraft};
use crate::extraction::{ExtractionReport, ExtractionRequest, IssueExtractor};
use crate::sync::{BatchRejection, BatchReport, BatchSyncEngine, SubmissionProgress};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Select a team before generating issues.")]
    TeamRequired,
    #[error(transparent)]
    Rejected(#[from] BatchRejection),
    #[error(transparent)]
    Edit(#[from] DraftEditError),
}

#[derive(Debug)]
pub struct IntakeSession {
    selection: AssignmentSelection,
    store: DraftReviewStore,
    resolver: AssignmentResolver,
    extractor: IssueExtractor,
    engine: BatchSyncEngine,
}

impl IntakeSession {
    pub fn new(
        resolver: AssignmentResolver,
        extractor: IssueExtractor,
        engine: BatchSyncEngine,
    ) -> Self {
        Self {
            selection: AssignmentSelection::new(),
            store: DraftReviewStore::new(),
            resolver,
            extractor,
            engine,
        }
    }

    pub fn selection(&self) -> &AssignmentSelection {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut AssignmentSelection {
        &mut self.selection
    }

    pub fn drafts(&self) -> &[IssueDraft] {
        self.store.drafts()
    }

    /// Loads a previously reviewed batch, replacing whatever was held.
    pub fn load_drafts(&mut self, drafts: Vec<IssueDraft>) {
        self.store.replace(drafts);
    }

    pub async fn resolve(&self) -> AssignmentResolution {
        self.resolver.resolve(&self.selection).await
    }

    /// Runs extraction for a new batch. The previous batch is discarded even
    /// when extraction comes back empty.
    pub async fn generate(
        &mut self,
        request: ExtractionRequest,
    ) -> Result<ExtractionReport, SessionError> {
        let resolution = self.resolve().await;
        if !resolution.is_complete() {
            return Err(SessionError::TeamRequired);
        }

        self.store.clear();
        let report = self.extractor.extract(request).await;
        self.store.replace(report.drafts.clone());
        info!(drafts = self.store.len(), "new draft batch ready for review");
        Ok(report)
    }

    pub fn edit_title(
        &mut self,
        index: usize,
        title: impl Into<String>,
    ) -> Result<(), SessionError> {
        Ok(self.store.set_title(index, title)?)
    }

    pub fn edit_description(
        &mut self,
        index: usize,
        description: impl Into<String>,
    ) -> Result<(), SessionError> {
        Ok(self.store.set_description(index, description)?)
    }

    pub fn mark_for_deletion(&mut self, index: usize, marked: bool) -> Result<(), SessionError> {
        Ok(self.store.set_marked_for_deletion(index, marked)?)
    }

    /// Submits the held batch under a freshly resolved context. The store is
    /// empty afterwards whatever the outcome.
    pub async fn submit<F>(&mut self, on_outcome: F) -> Result<BatchReport, SessionError>
    where
        F: FnMut(SubmissionProgress<'_>) + Send,
    {
        let resolution = self.resolve().await;
        let batch = self.store.take_batch();
        Ok(self
            .engine
            .submit(batch, &resolution.context, on_outcome)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::assignment::AssignmentDefaults;
    use crate::directory::{NameIndex, NamedEntity};
    use crate::identifiers::TeamId;
    use crate::test_support::{StubCompletion, StubDirectory};

    async fn session_with_team() -> (IntakeSession, Arc<StubDirectory>, Arc<StubCompletion>) {
        let directory = Arc::new(StubDirectory::default());
        directory
            .set_teams(NameIndex::from_entities([NamedEntity::new("Core", "team-core")]))
            .await;
        let provider = Arc::new(StubCompletion::default());
        let session = IntakeSession::new(
            AssignmentResolver::new(directory.clone(), AssignmentDefaults::default()),
            IssueExtractor::new(provider.clone()),
            BatchSyncEngine::new(directory.clone()),
        );
        (session, directory, provider)
    }

    #[tokio::test]
    async fn generation_is_blocked_without_a_team() {
        let directory = Arc::new(StubDirectory::default());
        let provider = Arc::new(StubCompletion::default());
        let mut session = IntakeSession::new(
            AssignmentResolver::new(directory.clone(), AssignmentDefaults::default()),
            IssueExtractor::new(provider.clone()),
            BatchSyncEngine::new(directory),
        );

        let error = session
            .generate(ExtractionRequest::new("Login fails"))
            .await
            .expect_err("no team available");

        assert_eq!(error, SessionError::TeamRequired);
        assert!(provider.requests().await.is_empty());
    }

    #[tokio::test]
    async fn fresh_generation_replaces_previous_batch() {
        let (mut session, _, provider) = session_with_team().await;
        provider
            .push_response(Ok(r#"{"issues":[{"title":"A"},{"title":"B"}]}"#.to_owned()))
            .await;
        provider.push_response(Ok(r#"{"issues":[]}"#.to_owned())).await;

        session
            .generate(ExtractionRequest::new("first"))
            .await
            .expect("generate");
        assert_eq!(session.drafts().len(), 2);

        session
            .generate(ExtractionRequest::new("second"))
            .await
            .expect("generate");
        assert!(session.drafts().is_empty());
    }

    #[tokio::test]
    async fn submission_empties_the_store_even_on_failure() {
        let (mut session, directory, _) = session_with_team().await;
        directory
            .push_create_result(Err(crate::error::CoreError::RemoteApplication(
                "title too long".to_owned(),
            )))
            .await;
        session.load_drafts(vec![IssueDraft::new("Only draft", "")]);

        let report = session.submit(|_| {}).await.expect("batch accepted");

        assert_eq!(report.created(), 0);
        assert_eq!(report.attempted(), 1);
        assert!(session.drafts().is_empty());
        assert_eq!(
            directory.create_requests().await[0].team_id,
            TeamId::new("team-core")
        );
    }

    #[tokio::test]
    async fn edits_flow_into_submission() {
        let (mut session, directory, _) = session_with_team().await;
        session.load_drafts(vec![
            IssueDraft::new("Draft one", ""),
            IssueDraft::new("Draft two", ""),
        ]);

        session.edit_title(0, "Edited one").expect("edit title");
        session.edit_description(0, "- detail").expect("edit description");
        session.mark_for_deletion(1, true).expect("mark");
        assert!(matches!(
            session.edit_title(7, "x"),
            Err(SessionError::Edit(DraftEditError::OutOfRange { index: 7, len: 2 }))
        ));

        let report = session.submit(|_| {}).await.expect("batch accepted");

        assert_eq!(report.attempted(), 1);
        let sent = directory.create_requests().await;
        assert_eq!(sent[0].title, "Edited one");
        assert_eq!(sent[0].description.as_deref(), Some("- detail"));
    }

    #[tokio::test]
    async fn all_deleted_batch_is_rejected_and_store_cleared() {
        let (mut session, directory, _) = session_with_team().await;
        let mut draft = IssueDraft::new("Gone", "");
        draft.marked_for_deletion = true;
        session.load_drafts(vec![draft]);

        let error = session.submit(|_| {}).await.expect_err("nothing to submit");

        assert_eq!(error, SessionError::Rejected(BatchRejection::NothingToSubmit));
        assert!(session.drafts().is_empty());
        assert!(directory.create_requests().await.is_empty());
    }
}
