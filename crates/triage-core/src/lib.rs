pub mod assignment;
pub mod directory;
pub mod drafts;
pub mod error;
pub mod extraction;
pub mod identifiers;
pub mod images;
pub mod session;
pub mod sync;
pub mod test_support;

pub use assignment::{
    needs_global_teams, resolve_assignment, resolve_milestone, resolve_team,
    resolve_workflow_state, AssignmentContext, AssignmentDefaults, AssignmentNotice,
    AssignmentResolution, AssignmentResolver, AssignmentSelection, DirectorySnapshot,
    NoticeSeverity, ProjectTeams, TeamResolution, TeamScope, TeamSelectionSource,
    DEFAULT_WORKFLOW_STATE_NAME,
};
pub use directory::{
    truncate_title, CreateIssueRequest, CreatedIssue, IssueDirectory, NameIndex, NamedEntity,
    ProjectDetails, MAX_TITLE_CHARS,
};
pub use drafts::{DraftEditError, DraftReviewStore, IssueDraft};
pub use error::{response_excerpt, CoreError};
pub use extraction::{
    parse_extraction_response, CompletionProvider, CompletionRequest, ExtractionReport,
    ExtractionRequest, ExtractionWarning, IssueExtractor, EMPTY_TEXT_PLACEHOLDER,
    EXTRACTION_INSTRUCTION,
};
pub use identifiers::{IssueId, MilestoneId, ProjectId, TeamId, WorkflowStateId};
pub use images::{normalize_image, ImagePayload, NormalizedImage, DEFAULT_JPEG_QUALITY};
pub use session::{IntakeSession, SessionError};
pub use sync::{
    BatchRejection, BatchReport, BatchSyncEngine, SubmissionOutcome, SubmissionProgress,
    SubmissionResult,
};
