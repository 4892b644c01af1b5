use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;
use triage_core::{AssignmentSelection, CoreError, IssueDraft};

pub const DEFAULT_DRAFTS_PATH: &str = "triage-drafts.json";

/// A reviewed batch on disk, together with the selection it was generated
/// under so a later `submit` can resolve the same destination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftsFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub milestone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    #[serde(default)]
    pub drafts: Vec<IssueDraft>,
}

impl DraftsFile {
    pub fn new(selection: &AssignmentSelection, drafts: Vec<IssueDraft>) -> Self {
        Self {
            project: selection.project().map(ToOwned::to_owned),
            milestone: selection.milestone().map(ToOwned::to_owned),
            team: selection.team().map(ToOwned::to_owned),
            drafts,
        }
    }

    pub fn selection(&self) -> AssignmentSelection {
        let mut selection = AssignmentSelection::new();
        selection.select_project(self.project.clone());
        selection.select_milestone(self.milestone.clone());
        selection.select_team(self.team.clone());
        selection
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                CoreError::InvalidInput(format!(
                    "No drafts file at {}. Run `triage generate` first.",
                    path.display()
                ))
            } else {
                CoreError::InvalidInput(format!(
                    "Failed to read drafts file {}: {err}",
                    path.display()
                ))
            }
        })?;

        let file: Self = serde_json::from_str(&raw).map_err(|err| {
            CoreError::InvalidInput(format!(
                "Failed to parse drafts file {}: {err}",
                path.display()
            ))
        })?;
        debug!(path = %path.display(), drafts = file.drafts.len(), "loaded drafts file");
        Ok(file)
    }

    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        let rendered = serde_json::to_string_pretty(self).map_err(|err| {
            CoreError::InvalidInput(format!("Failed to serialize drafts: {err}"))
        })?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|err| {
                    CoreError::InvalidInput(format!(
                        "Failed to create directory {} for drafts file: {err}",
                        parent.display()
                    ))
                })?;
            }
        }

        std::fs::write(path, format!("{rendered}\n")).map_err(|err| {
            CoreError::InvalidInput(format!(
                "Failed to write drafts file {}: {err}",
                path.display()
            ))
        })?;
        debug!(path = %path.display(), drafts = self.drafts.len(), "wrote drafts file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_core::test_support::TestPath;

    #[test]
    fn saved_batch_reloads_with_its_selection() {
        let path = TestPath::new("drafts-file", "json");
        let selection = AssignmentSelection::new()
            .with_project("Website")
            .with_team("Frontend");
        let mut removed = IssueDraft::new("Stale", "");
        removed.marked_for_deletion = true;
        let file = DraftsFile::new(
            &selection,
            vec![IssueDraft::new("Login fails on Safari", "- Safari 17"), removed],
        );

        file.save(path.path()).expect("save drafts");
        let reloaded = DraftsFile::load(path.path()).expect("load drafts");

        assert_eq!(reloaded, file);
        assert_eq!(reloaded.selection(), selection);
    }

    #[test]
    fn hand_edited_file_may_omit_optional_fields() {
        let path = TestPath::new("drafts-minimal", "json");
        std::fs::write(path.path(), r#"{"drafts":[{"title":"Only title"}]}"#)
            .expect("write fixture");

        let file = DraftsFile::load(path.path()).expect("load drafts");

        assert_eq!(file.project, None);
        assert_eq!(file.drafts, vec![IssueDraft::new("Only title", "")]);
    }

    #[test]
    fn missing_or_corrupt_file_is_invalid_input() {
        let path = TestPath::new("drafts-missing", "json");
        let error = DraftsFile::load(path.path()).expect_err("missing file");
        assert!(error.to_string().contains("triage generate"));

        std::fs::write(path.path(), "[not json").expect("write fixture");
        let error = DraftsFile::load(path.path()).expect_err("corrupt file");
        assert!(matches!(error, CoreError::InvalidInput(_)));
    }
}
