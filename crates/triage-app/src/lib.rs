//! Command-line front end for issue intake: resolve where issues go, extract
//! drafts from free text and screenshots, review them on disk, then create them.

pub mod bootstrap;
pub mod drafts_file;
pub mod render;
pub mod telemetry;
pub mod workflow;

pub use bootstrap::{assignment_defaults, linear_config, openai_config, Services};
pub use drafts_file::{DraftsFile, DEFAULT_DRAFTS_PATH};
pub use telemetry::{init_tracing, LogFormat};
pub use workflow::{
    apply_draft_edit, generate_drafts, read_images, run_intake, show_directory, show_resolution,
    submit_drafts, DraftEdit, SelectionOverrides,
};
