//! `triage`: turn free-form bug reports and screenshots into Linear issues.
//!
//! - `directory`: list projects, teams, milestones and workflow states
//! - `resolve`: show where issues would be created for a selection
//! - `generate`: extract drafts into a review file
//! - `edit`: change one draft in the review file
//! - `submit`: create the reviewed drafts, then empty the review file
//! - `run`: extract and create in one step, without review

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::Level;
use triage_app::{
    apply_draft_edit, generate_drafts, init_tracing, read_images, run_intake, show_directory,
    show_resolution, submit_drafts, DraftEdit, DraftsFile, LogFormat, SelectionOverrides,
    Services, DEFAULT_DRAFTS_PATH,
};
use triage_config::Secrets;
use triage_core::{AssignmentSelection, CoreError, ExtractionRequest};

#[derive(Parser)]
#[command(name = "triage")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Extract issues from bug reports and screenshots and file them in Linear")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines on stderr
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List projects and teams, optionally a project's milestones or a team's states
    Directory {
        /// Also list this project's teams and milestones
        #[arg(long)]
        project: Option<String>,

        /// Also list this team's workflow states
        #[arg(long)]
        team: Option<String>,
    },

    /// Show the project, milestone, team and status issues would be created under
    Resolve {
        #[command(flatten)]
        selection: SelectionArgs,
    },

    /// Extract drafts from text and screenshots into a review file
    Generate {
        #[command(flatten)]
        selection: SelectionArgs,

        #[command(flatten)]
        input: InputArgs,

        /// Review file to write
        #[arg(long, default_value = DEFAULT_DRAFTS_PATH)]
        drafts: PathBuf,
    },

    /// Edit one draft in the review file
    Edit {
        /// Zero-based draft position, as printed by `generate`
        index: usize,

        /// Replace the title
        #[arg(long)]
        title: Option<String>,

        /// Replace the description
        #[arg(long, conflicts_with = "title")]
        description: Option<String>,

        /// Exclude the draft from submission
        #[arg(long, conflicts_with_all = ["title", "description", "restore"])]
        delete: bool,

        /// Include a previously deleted draft again
        #[arg(long, conflicts_with_all = ["title", "description"])]
        restore: bool,

        /// Review file to edit
        #[arg(long, default_value = DEFAULT_DRAFTS_PATH)]
        drafts: PathBuf,
    },

    /// Create the reviewed drafts in Linear. Selection flags override the
    /// selection recorded by `generate`.
    Submit {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Review file to submit
        #[arg(long, default_value = DEFAULT_DRAFTS_PATH)]
        drafts: PathBuf,
    },

    /// Extract and create issues in one step
    Run {
        #[command(flatten)]
        selection: SelectionArgs,

        #[command(flatten)]
        input: InputArgs,
    },
}

#[derive(Args)]
struct SelectionArgs {
    /// Project name ("none" for no project)
    #[arg(long)]
    project: Option<String>,

    /// Milestone name on the selected project
    #[arg(long)]
    milestone: Option<String>,

    /// Team name
    #[arg(long)]
    team: Option<String>,
}

impl SelectionArgs {
    fn overrides(self) -> SelectionOverrides {
        SelectionOverrides {
            project: self.project,
            milestone: self.milestone,
            team: self.team,
        }
    }
}

#[derive(Args)]
struct InputArgs {
    /// Free-form description of the problem
    #[arg(long)]
    text: Option<String>,

    /// Read the description from a file
    #[arg(long, conflicts_with = "text")]
    text_file: Option<PathBuf>,

    /// Screenshot to include; repeatable
    #[arg(long = "image")]
    images: Vec<PathBuf>,
}

impl InputArgs {
    fn into_request(self) -> Result<ExtractionRequest> {
        let text = match (self.text, self.text_file) {
            (Some(text), _) => text,
            (None, Some(path)) => std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?,
            (None, None) => String::new(),
        };

        Ok(read_images(&self.images)?
            .into_iter()
            .fold(ExtractionRequest::new(text), ExtractionRequest::with_image))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    init_tracing(format, level);

    let mut stdout = std::io::stdout();
    match cli.command {
        Commands::Edit {
            index,
            title,
            description,
            delete,
            restore,
            drafts,
        } => {
            let edit = if delete {
                DraftEdit::Delete { index }
            } else if restore {
                DraftEdit::Restore { index }
            } else if let Some(title) = title {
                DraftEdit::Title { index, title }
            } else if let Some(description) = description {
                DraftEdit::Description { index, description }
            } else {
                anyhow::bail!(
                    "Nothing to edit: pass --title, --description, --delete or --restore."
                );
            };
            apply_draft_edit(&drafts, edit, &mut stdout)
        }
        Commands::Directory { project, team } => {
            let services = load_services()?;
            show_directory(
                services.directory.as_ref(),
                project.as_deref(),
                team.as_deref(),
                &mut stdout,
            )
            .await
        }
        Commands::Resolve { selection } => {
            let services = load_services()?;
            let session =
                services.session(selection.overrides().apply(AssignmentSelection::new()));
            show_resolution(&session, &mut stdout).await.map(|_| ())
        }
        Commands::Generate {
            selection,
            input,
            drafts,
        } => {
            let request = input.into_request()?;
            let services = load_services()?;
            let mut session =
                services.session(selection.overrides().apply(AssignmentSelection::new()));
            generate_drafts(&mut session, request, &drafts, &mut stdout)
                .await
                .map(|_| ())
        }
        Commands::Submit { selection, drafts } => {
            let services = load_services()?;
            submit_reviewed(&services, selection.overrides(), &drafts, &mut stdout).await
        }
        Commands::Run { selection, input } => {
            let request = input.into_request()?;
            let services = load_services()?;
            let mut session =
                services.session(selection.overrides().apply(AssignmentSelection::new()));
            run_intake(&mut session, request, &mut stdout)
                .await
                .map(|_| ())
        }
    }
}

fn load_services() -> Result<Services> {
    let config = triage_config::load_from_env().map_err(CoreError::from)?;
    let secrets = Secrets::from_env().map_err(CoreError::from)?;
    Ok(Services::from_config(&config, &secrets)?)
}

async fn submit_reviewed(
    services: &Services,
    overrides: SelectionOverrides,
    drafts_path: &Path,
    stdout: &mut std::io::Stdout,
) -> Result<()> {
    let file = DraftsFile::load(drafts_path)?;
    let mut session = services.session(overrides.apply(file.selection()));
    session.load_drafts(file.drafts);
    submit_drafts(&mut session, drafts_path, stdout)
        .await
        .map(|_| ())
}
