use std::process::ExitCode;
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use prider_loader::citation::PubmedHttpClient;
use prider_loader::config::{ConfigLoader, ResolvedConfig};
use prider_loader::error::{ErrorKind, LoaderError, SubmissionLoadError};
use prider_loader::loader::SubmissionLoader;
use prider_loader::locator::DirectoryLocator;
use prider_loader::output::{JsonOutput, LoadReport, ProjectView};
use prider_loader::repository::{AssayRepository, FileRepository, ProjectRepository};
use prider_loader::sidecar::SidecarReaderFactory;
use prider_loader::store::ArchiveStore;
use prider_loader::submission::SubmissionParser;
use prider_loader::term_cache::TermCache;

#[derive(Parser)]
#[command(name = "prider-load")]
#[command(about = "Load proteomics dataset submissions into an archive catalog")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Load a submission as one project")]
    Load(LoadArgs),
    #[command(about = "Show a stored project with its assays and files")]
    Show(ShowArgs),
    #[command(about = "Manage submitters")]
    User(UserArgs),
}

#[derive(Args)]
struct LoadArgs {
    #[arg(long)]
    accession: String,

    #[arg(long)]
    doi: Option<String>,

    #[arg(long)]
    submission: Utf8PathBuf,
}

#[derive(Args)]
struct ShowArgs {
    accession: String,
}

#[derive(Args)]
struct UserArgs {
    #[command(subcommand)]
    command: UserCommand,
}

#[derive(Subcommand)]
enum UserCommand {
    #[command(about = "Register a submitter")]
    Add(UserAddArgs),
}

#[derive(Args)]
struct UserAddArgs {
    #[arg(long)]
    email: String,

    #[arg(long, default_value = "")]
    first_name: String,

    #[arg(long, default_value = "")]
    last_name: String,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(load) = report.downcast_ref::<SubmissionLoadError>() {
            return ExitCode::from(map_exit_code(load.kind()));
        }
        if let Some(err) = report.downcast_ref::<LoaderError>() {
            return ExitCode::from(map_exit_code(err.kind()));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::Validation | ErrorKind::NotFound => 2,
        ErrorKind::Citation => 3,
        ErrorKind::Conflict => 4,
        ErrorKind::Scan => 5,
        ErrorKind::Persistence | ErrorKind::Cache | ErrorKind::Io => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let resolved = ConfigLoader::resolve(cli.config.as_deref())?;
    let store = Arc::new(ArchiveStore::open(resolved.archive_root.clone())?);

    match cli.command {
        Commands::Load(args) => run_load(args, &resolved, store),
        Commands::Show(args) => run_show(args, &store),
        Commands::User(UserArgs {
            command: UserCommand::Add(args),
        }) => {
            let user = store.register_user(&args.email, &args.first_name, &args.last_name)?;
            JsonOutput::print_user(&user).into_diagnostic()
        }
    }
}

fn run_load(
    args: LoadArgs,
    resolved: &ResolvedConfig,
    store: Arc<ArchiveStore>,
) -> miette::Result<()> {
    let submission = SubmissionParser::parse(args.submission.as_std_path())?;

    let mut terms = TermCache::new(store.clone());
    terms.initialize()?;
    let locator = DirectoryLocator::new(resolved.submission_root_for(&args.submission))?;
    let readers = SidecarReaderFactory::new(resolved.decoded_root_for(&args.submission));
    let pubmed = if resolved.resolve_citations {
        Some(PubmedHttpClient::with_base_url(&resolved.pubmed_base_url)?)
    } else {
        None
    };

    let mut loader = SubmissionLoader::new(store.as_ref(), &mut terms, &readers, &locator)
        .with_scan_settings(resolved.scan.clone());
    if let Some(client) = &pubmed {
        loader = loader.with_citations(client);
    }
    let project = loader.load(&args.accession, args.doi.as_deref(), &submission)?;

    let (assays, files) = match project.id {
        Some(id) => (
            store.find_assays_by_project_id(id)?,
            store.find_files_by_project_id(id)?,
        ),
        None => (Vec::new(), Vec::new()),
    };
    JsonOutput::print_load(&LoadReport::new(&project, &assays, &files)).into_diagnostic()
}

fn run_show(args: ShowArgs, store: &ArchiveStore) -> miette::Result<()> {
    let project = store
        .find_project_by_accession(args.accession.trim())?
        .ok_or_else(|| LoaderError::Validation(format!("unknown project {}", args.accession)))?;
    let (assays, files) = match project.id {
        Some(id) => (
            store.find_assays_by_project_id(id)?,
            store.find_files_by_project_id(id)?,
        ),
        None => (Vec::new(), Vec::new()),
    };
    JsonOutput::print_project(&ProjectView {
        project,
        assays,
        files,
    })
    .into_diagnostic()
}
