//! Command-line front end for the story analyzer.
//!
//! # Responsibility
//! - Import stories from a text file and print their defects.
//! - Print project severity reports.
//! - Flush queued integration events as JSON lines.

use clap::{Args, Parser, Subcommand};
use log::error;
use rusqlite::Connection;
use std::error::Error;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use storylint_core::repo::defect_repo::DefectQuery;
use storylint_core::repo::story_repo::StoryRepository;
use storylint_core::service::outbox_service::JsonLinesSink;
use storylint_core::{
    default_log_level, init_logging, open_db, AnalysisService, AnalyzerConfig, DefectService,
    LogDestination, OutboxDispatcher, ProjectService, SqliteStore,
};
use uuid::Uuid;

type CliResult<T> = Result<T, Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "storylint")]
#[command(about = "Finds quality defects in user stories")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CommonArgs {
    /// SQLite database file
    #[arg(long, global = true, default_value = "storylint.db")]
    db: PathBuf,

    /// Analyzer config (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// trace|debug|info|warn|error
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Absolute directory for rolling log files; logs go to stderr otherwise
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// External tagger command, overrides the config
    #[arg(long, global = true)]
    tagger_cmd: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Import one story per line into a new project and analyze it
    Analyze {
        /// Text file with one story per line
        file: PathBuf,

        /// Project name; defaults to the file stem
        #[arg(short, long)]
        project: Option<String>,
    },

    /// Print the defect summary of a project
    Report {
        /// Project id
        project: Uuid,
    },

    /// Write pending integration events to stdout as JSON lines
    Events {
        /// Events fetched per round
        #[arg(long, default_value_t = 100)]
        batch_size: u32,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_run module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let level = cli
        .common
        .log_level
        .clone()
        .unwrap_or_else(|| default_log_level().to_string());
    let destination = match &cli.common.log_dir {
        Some(dir) => LogDestination::Directory(dir.clone()),
        None => LogDestination::Stderr,
    };
    init_logging(&level, destination)?;

    let conn = open_connection(&cli.common.db)?;
    match cli.command {
        Commands::Analyze { file, project } => analyze(&cli.common, &conn, &file, project),
        Commands::Report { project } => report(&conn, project),
        Commands::Events { batch_size } => events(&conn, batch_size),
    }
}

fn open_connection(path: &Path) -> CliResult<Connection> {
    Ok(open_db(path)?)
}

fn load_config(common: &CommonArgs) -> CliResult<AnalyzerConfig> {
    let mut config = match &common.config {
        Some(path) => AnalyzerConfig::load(path)?,
        None => AnalyzerConfig::default(),
    };
    if let Some(command) = &common.tagger_cmd {
        config.tagger.command = command.split_whitespace().map(str::to_string).collect();
    }
    Ok(config)
}

fn analyze(
    common: &CommonArgs,
    conn: &Connection,
    file: &Path,
    project_name: Option<String>,
) -> CliResult<()> {
    let analyzer = load_config(common)?.build_analyzer()?;
    let raw = fs::read_to_string(file)?;
    let name = project_name.unwrap_or_else(|| {
        file.file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "stories".to_string())
    });

    let project = ProjectService::new(SqliteStore::new(conn)).create_project(name)?;
    let analysis = AnalysisService::new(SqliteStore::new(conn), &analyzer);
    for line in raw.lines().map(str::trim).filter(|line| !line.is_empty()) {
        analysis.create_story(project.uuid, line, None)?;
    }
    let result = analysis.analyze_project(project.uuid)?;

    println!("project {} ({})", project.name, project.uuid);
    println!("format: {}", result.format);
    let store = SqliteStore::new(conn);
    let defects = DefectService::new(SqliteStore::new(conn));
    for story in store.list_stories(project.uuid)? {
        let found = defects.list_defects(&DefectQuery::open_for_story(story.uuid))?;
        if found.is_empty() {
            continue;
        }
        println!();
        println!("{}", story.text);
        for defect in found {
            println!(
                "  [{}] {}/{}: {}",
                defect.severity, defect.kind, defect.subkind, defect.highlight
            );
        }
    }
    print_report(&defects.project_report(project.uuid)?);
    Ok(())
}

fn report(conn: &Connection, project: Uuid) -> CliResult<()> {
    let project = ProjectService::new(SqliteStore::new(conn)).get_project(project)?;
    let summary = DefectService::new(SqliteStore::new(conn)).project_report(project.uuid)?;
    println!("project {} ({})", project.name, project.uuid);
    println!("format: {}", project.format);
    print_report(&summary);
    Ok(())
}

fn events(conn: &Connection, batch_size: u32) -> CliResult<()> {
    let dispatcher = OutboxDispatcher::new(SqliteStore::new(conn), JsonLinesSink::new(io::stdout()))
        .with_batch_size(batch_size);
    let outcome = dispatcher.dispatch_pending()?;
    if let Some(id) = outcome.failed_event {
        return Err(format!("delivery stopped at event {id}").into());
    }
    Ok(())
}

fn print_report(report: &storylint_core::ProjectReport) {
    println!();
    println!(
        "stories: {} (perfect: {})",
        report.stories, report.perfect_stories
    );
    println!(
        "open defects: {} (high: {}, medium: {}, minor: {})",
        report.open_defects(),
        report.high,
        report.medium,
        report.minor
    );
    println!("false positives: {}", report.false_positives);
}
