//! Plain-text rendering for terminal output. Everything here is pure so the
//! exact wording can be asserted in tests.

use triage_core::{
    AssignmentResolution, ExtractionWarning, IssueDraft, NameIndex, NoticeSeverity,
    TeamSelectionSource,
};

const NONE_LABEL: &str = "None";

pub fn resolution_lines(resolution: &AssignmentResolution) -> Vec<String> {
    let mut lines = Vec::new();

    lines.push(format!(
        "Project: {}",
        resolution
            .project
            .as_ref()
            .map_or(NONE_LABEL, |project| project.name.as_str())
    ));

    lines.push(format!(
        "Milestone: {}",
        resolution
            .milestone
            .as_ref()
            .map_or(NONE_LABEL, |milestone| milestone.name.as_str())
    ));
    if resolution.project.is_some() && !resolution.milestone_options.is_empty() {
        lines.push(format!(
            "  available: {}",
            joined_names(&resolution.milestone_options)
        ));
    }

    let team = match (&resolution.team.selected, resolution.team.source) {
        (Some(team), Some(source)) => format!("{} ({})", team.name, source_label(source)),
        (Some(team), None) => team.name.clone(),
        (None, _) => NONE_LABEL.to_owned(),
    };
    lines.push(format!("Team: {team}"));
    if resolution.team.selected.is_none() && !resolution.team.options.is_empty() {
        lines.push(format!(
            "  available: {}",
            joined_names(&resolution.team.options)
        ));
    }

    lines.push(format!(
        "Status: {}",
        resolution
            .workflow_state
            .as_ref()
            .map_or("team default", |state| state.name.as_str())
    ));

    lines.extend(resolution.notices.iter().map(|notice| {
        format!("[{}] {notice}", severity_label(notice.severity()))
    }));
    lines
}

pub fn draft_lines(drafts: &[IssueDraft]) -> Vec<String> {
    if drafts.is_empty() {
        return vec!["No drafts.".to_owned()];
    }

    let mut lines = Vec::new();
    for (index, draft) in drafts.iter().enumerate() {
        let marker = if draft.marked_for_deletion {
            " [delete]"
        } else {
            ""
        };
        lines.push(format!("{index}. {}{marker}", draft.title));
        lines.extend(
            draft
                .description
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(|line| format!("   {line}")),
        );
    }
    lines
}

pub fn warning_line(warning: &ExtractionWarning) -> String {
    format!("warning: {warning}")
}

pub fn listing_lines<Id: Clone + PartialEq>(
    heading: &str,
    index: &NameIndex<Id>,
) -> Vec<String> {
    let mut lines = vec![format!("{heading} ({})", index.len())];
    if index.is_empty() {
        lines.push("  (none)".to_owned());
    } else {
        lines.extend(index.names().map(|name| format!("  {name}")));
    }
    lines
}

fn joined_names<Id: Clone + PartialEq>(index: &NameIndex<Id>) -> String {
    index.names().collect::<Vec<_>>().join(", ")
}

fn source_label(source: TeamSelectionSource) -> &'static str {
    match source {
        TeamSelectionSource::ProjectSingleTeam => "only team on project",
        TeamSelectionSource::Explicit => "selected",
        TeamSelectionSource::ConfiguredDefault => "configured default",
        TeamSelectionSource::FirstAlphabetical => "first available",
    }
}

fn severity_label(severity: NoticeSeverity) -> &'static str {
    match severity {
        NoticeSeverity::Info => "info",
        NoticeSeverity::Warning => "warning",
        NoticeSeverity::Blocking => "blocking",
    }
}
