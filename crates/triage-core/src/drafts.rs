use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub marked_for_deletion: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl IssueDraft {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            marked_for_deletion: false,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DraftEditError {
    #[error("no draft at position {index}; the review set holds {len} drafts")]
    OutOfRange { index: usize, len: usize },
}

/// The one batch of drafts under review between a generation and a submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftReviewStore {
    drafts: Vec<IssueDraft>,
}

impl DraftReviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_drafts(drafts: Vec<IssueDraft>) -> Self {
        Self { drafts }
    }

    /// Replaces the whole working set; nothing from a previous batch survives.
    pub fn replace(&mut self, drafts: Vec<IssueDraft>) {
        self.drafts = drafts;
    }

    pub fn clear(&mut self) {
        self.drafts.clear();
    }

    pub fn drafts(&self) -> &[IssueDraft] {
        &self.drafts
    }

    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }

    pub fn set_title(
        &mut self,
        index: usize,
        title: impl Into<String>,
    ) -> Result<(), DraftEditError> {
        self.draft_mut(index)?.title = title.into();
        Ok(())
    }

    pub fn set_description(
        &mut self,
        index: usize,
        description: impl Into<String>,
    ) -> Result<(), DraftEditError> {
        self.draft_mut(index)?.description = description.into();
        Ok(())
    }

    pub fn set_marked_for_deletion(
        &mut self,
        index: usize,
        marked: bool,
    ) -> Result<(), DraftEditError> {
        self.draft_mut(index)?.marked_for_deletion = marked;
        Ok(())
    }

    /// Hands the reviewed batch to a submission and leaves the store empty.
    pub fn take_batch(&mut self) -> Vec<IssueDraft> {
        std::mem::take(&mut self.drafts)
    }

    fn draft_mut(&mut self, index: usize) -> Result<&mut IssueDraft, DraftEditError> {
        let len = self.drafts.len();
        self.drafts
            .get_mut(index)
            .ok_or(DraftEditError::OutOfRange { index, len })
    }
}
