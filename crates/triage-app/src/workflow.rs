//! Command bodies. Each one writes its user-facing output to `out` and leaves
//! diagnostics to tracing.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{info, warn};
use triage_core::{
    AssignmentResolution, AssignmentSelection, BatchRejection, BatchReport, DraftReviewStore,
    ExtractionReport, ExtractionRequest, ImagePayload, IntakeSession, IssueDirectory,
    SessionError, SubmissionResult,
};

use crate::drafts_file::DraftsFile;
use crate::render::{draft_lines, listing_lines, resolution_lines, warning_line};

/// Selection flags given on the command line, layered over a recorded selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionOverrides {
    pub project: Option<String>,
    pub milestone: Option<String>,
    pub team: Option<String>,
}

impl SelectionOverrides {
    /// A new project drops the recorded milestone and team, like any other
    /// project change.
    pub fn apply(&self, mut base: AssignmentSelection) -> AssignmentSelection {
        if let Some(project) = &self.project {
            base.select_project(Some(project.clone()));
        }
        if let Some(milestone) = &self.milestone {
            base.select_milestone(Some(milestone.clone()));
        }
        if let Some(team) = &self.team {
            base.select_team(Some(team.clone()));
        }
        base
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftEdit {
    Title { index: usize, title: String },
    Description { index: usize, description: String },
    Delete { index: usize },
    Restore { index: usize },
}

pub async fn show_directory<W: Write>(
    directory: &dyn IssueDirectory,
    project: Option<&str>,
    team: Option<&str>,
    out: &mut W,
) -> Result<()> {
    let projects = directory.list_projects().await;
    let teams = directory.list_teams().await;
    write_lines(out, listing_lines("Projects", &projects))?;
    write_lines(out, listing_lines("Teams", &teams))?;

    let mut project_teams = None;
    if let Some(name) = project {
        let Some(entity) = projects.entity(name) else {
            bail!("No project named `{name}` was found.");
        };
        let details = directory.project_details(&entity.id).await;
        write_lines(
            out,
            listing_lines(&format!("Teams on {}", entity.name), &details.teams),
        )?;
        write_lines(
            out,
            listing_lines(&format!("Milestones on {}", entity.name), &details.milestones),
        )?;
        project_teams = Some(details.teams);
    }

    if let Some(name) = team {
        let entity = project_teams
            .as_ref()
            .and_then(|listing| listing.entity(name))
            .or_else(|| teams.entity(name));
        let Some(entity) = entity else {
            bail!("No team named `{name}` was found.");
        };
        let states = directory.list_workflow_states(&entity.id).await;
        write_lines(
            out,
            listing_lines(&format!("Workflow states for {}", entity.name), &states),
        )?;
    }

    Ok(())
}

pub async fn show_resolution<W: Write>(
    session: &IntakeSession,
    out: &mut W,
) -> Result<AssignmentResolution> {
    let resolution = session.resolve().await;
    write_lines(out, resolution_lines(&resolution))?;
    Ok(resolution)
}

/// Extracts a fresh batch and writes it to `drafts_path` for review. The file
/// is rewritten even when nothing was extracted.
pub async fn generate_drafts<W: Write>(
    session: &mut IntakeSession,
    request: ExtractionRequest,
    drafts_path: &Path,
    out: &mut W,
) -> Result<ExtractionReport> {
    let report = extract_into_session(session, request, out).await?;

    DraftsFile::new(session.selection(), session.drafts().to_vec()).save(drafts_path)?;
    info!(path = %drafts_path.display(), drafts = report.drafts.len(), "drafts saved for review");
    writeln!(
        out,
        "Saved {} draft(s) to {}. Review them, then run `triage submit`.",
        report.drafts.len(),
        drafts_path.display()
    )?;
    Ok(report)
}

/// Applies one edit to the batch held in `drafts_path`.
pub fn apply_draft_edit<W: Write>(drafts_path: &Path, edit: DraftEdit, out: &mut W) -> Result<()> {
    let mut file = DraftsFile::load(drafts_path)?;
    let mut store = DraftReviewStore::from_drafts(std::mem::take(&mut file.drafts));

    match edit {
        DraftEdit::Title { index, title } => store.set_title(index, title),
        DraftEdit::Description { index, description } => {
            store.set_description(index, description)
        }
        DraftEdit::Delete { index } => store.set_marked_for_deletion(index, true),
        DraftEdit::Restore { index } => store.set_marked_for_deletion(index, false),
    }?;

    file.drafts = store.take_batch();
    file.save(drafts_path)?;
    write_lines(out, draft_lines(&file.drafts))?;
    Ok(())
}

/// Submits the batch already loaded into `session`, then empties
/// `drafts_path`. A batch rejected for lack of a team leaves the file as it
/// was so it can be retried with `--team`.
pub async fn submit_drafts<W: Write + Send>(
    session: &mut IntakeSession,
    drafts_path: &Path,
    out: &mut W,
) -> Result<Option<BatchReport>> {
    let outcome = submit_session(session, out).await;
    if !matches!(
        outcome,
        Err(SessionError::Rejected(BatchRejection::MissingTeam))
    ) {
        DraftsFile::new(session.selection(), Vec::new()).save(drafts_path)?;
    }
    finish_submission(outcome, out)
}

/// Extraction straight into submission with no review step.
pub async fn run_intake<W: Write + Send>(
    session: &mut IntakeSession,
    request: ExtractionRequest,
    out: &mut W,
) -> Result<Option<BatchReport>> {
    let report = extract_into_session(session, request, out).await?;
    if report.drafts.is_empty() {
        return Ok(None);
    }

    let outcome = submit_session(session, out).await;
    finish_submission(outcome, out)
}

/// Reads screenshots from disk, labelled by file name.
pub fn read_images(paths: &[PathBuf]) -> Result<Vec<ImagePayload>> {
    paths
        .iter()
        .map(|path| {
            let bytes = std::fs::read(path)
                .with_context(|| format!("failed to read image {}", path.display()))?;
            let label = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            Ok(ImagePayload::new(label, bytes))
        })
        .collect()
}

async fn extract_into_session<W: Write>(
    session: &mut IntakeSession,
    request: ExtractionRequest,
    out: &mut W,
) -> Result<ExtractionReport> {
    show_resolution(session, out).await?;
    let report = session.generate(request).await?;
    for warning in &report.warnings {
        warn!(%warning, "extraction warning");
        writeln!(out, "{}", warning_line(warning))?;
    }
    write_lines(out, draft_lines(session.drafts()))?;
    Ok(report)
}

async fn submit_session<W: Write + Send>(
    session: &mut IntakeSession,
    out: &mut W,
) -> Result<BatchReport, SessionError> {
    let mut write_error = None;
    let outcome = session
        .submit(|progress| {
            let mut line = format!(
                "[{}/{}] {}",
                progress.position, progress.total, progress.outcome
            );
            if let SubmissionResult::Failed { reason } = &progress.outcome.result {
                line.push_str(&format!("\n    {reason}"));
            }
            if let Err(err) = writeln!(out, "{line}") {
                write_error.get_or_insert(err);
            }
        })
        .await;

    if let Some(err) = write_error {
        warn!(error = %err, "failed to write submission progress");
    }
    outcome
}

fn finish_submission<W: Write>(
    outcome: Result<BatchReport, SessionError>,
    out: &mut W,
) -> Result<Option<BatchReport>> {
    match outcome {
        Ok(report) => {
            info!(
                created = report.created(),
                attempted = report.attempted(),
                "batch submission finished"
            );
            writeln!(out, "{}", report.summary())?;
            Ok(Some(report))
        }
        Err(SessionError::Rejected(BatchRejection::NothingToSubmit)) => {
            writeln!(out, "{}", BatchRejection::NothingToSubmit)?;
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

fn write_lines<W: Write>(out: &mut W, lines: Vec<String>) -> Result<()> {
    for line in lines {
        writeln!(out, "{line}")?;
    }
    Ok(())
}
