//! `bk`: command-line front end for outline projects.

use anyhow::{bail, Context, Result};
use bk_compile::{transform_tree, Compiler, EbookExport, Transform};
use bk_core::config::BookConfig;
use bk_outline::paths::OUTLINE_DIR;
use bk_outline::{auto_rename, Node, NodeKind, NodeOptions, Project, ProjectStats};
use bk_session::{GitSnapshotter, Session, SessionThresholds};
use clap::{ArgAction, ArgGroup, Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "bk", version, about = "Outline, count and compile long-form writing projects")]
struct Cli {
    /// Config file (default: config.yaml in the project directory)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a project, or a folder/scene inside one
    New {
        path: PathBuf,
        /// Adopt an existing file or directory
        #[arg(long)]
        convert: bool,
    },
    /// Word counts per scene (or folder) and totals
    Stats {
        path: PathBuf,
        #[arg(long)]
        folders: bool,
        #[arg(long)]
        json: bool,
    },
    /// Renumber order prefixes and sync filenames with titles
    Rename {
        path: PathBuf,
        #[arg(long)]
        dry_run: bool,
        /// Apply without asking
        #[arg(long, short)]
        yes: bool,
    },
    /// Rewrite paragraph spacing of every body
    #[command(group(ArgGroup::new("mode").required(true).args(["soft_crlf", "hard_crlf"])))]
    Transform {
        path: PathBuf,
        /// Double every newline
        #[arg(long)]
        soft_crlf: bool,
        /// Collapse newline runs to one
        #[arg(long)]
        hard_crlf: bool,
    },
    /// Compile the manuscript and convert it to epub
    Compile {
        path: PathBuf,
        #[arg(long, value_name = "DIR")]
        build_dir: Option<PathBuf>,
        /// Leave out nodes whose compile flag is off
        #[arg(long)]
        only_compiled: bool,
        /// Write the markdown manuscript only
        #[arg(long)]
        no_epub: bool,
    },
    /// Track words written and snapshot to git until Ctrl-C
    Session {
        path: PathBuf,
        #[arg(long)]
        goal: Option<u64>,
        #[arg(long)]
        start: Option<u64>,
    },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn load_config(explicit: Option<&Path>, path: &Path) -> Result<BookConfig> {
    let source = match explicit {
        Some(file) => Some(file.to_path_buf()),
        None => Project::find(path),
    };
    match source {
        Some(source) => BookConfig::load(&source)
            .with_context(|| format!("loading config from {}", source.display())),
        None => Ok(BookConfig::default()),
    }
}

/// Outline root for a project directory or an outline directory.
fn open_outline(path: &Path, options: NodeOptions) -> Node {
    let root = if Project::is_project(path) {
        path.join(OUTLINE_DIR)
    } else {
        path.to_path_buf()
    };
    debug!(root = %root.display(), "opening outline");
    Node::open(NodeKind::Root, root, options)
}

fn format_order(order: Option<f64>) -> String {
    match order {
        Some(o) if o.fract() == 0.0 => format!("{:02}", o as i64),
        Some(o) => format!("{o}"),
        None => "--".into(),
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn cmd_new(path: &Path, convert: bool, options: NodeOptions) -> Result<()> {
    match Project::find(path) {
        None => {
            Project::create_with(path, convert, options)
                .with_context(|| format!("creating project {}", path.display()))?;
            println!("new project: {}", path.display());
        }
        Some(root) => {
            if path.exists() && !convert {
                bail!("{} already exists (use --convert to adopt it)", path.display());
            }
            let project = Project::open_with(&root, options)?;
            let node = project
                .new_entry(path, convert)
                .with_context(|| format!("creating {}", path.display()))?;
            println!(
                "new {} {} in project {} (ID {})",
                node.kind(),
                path.display(),
                root.display(),
                node.primary_key()
            );
        }
    }
    Ok(())
}

fn cmd_stats(path: &Path, folders: bool, json: bool, options: NodeOptions) -> Result<()> {
    let outline = open_outline(path, options);
    outline
        .reload_dir()
        .with_context(|| format!("reading outline {}", outline.path().display()))?;
    let stats = ProjectStats::collect(&outline, folders);
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }
    for row in &stats.rows {
        println!("{}, {:>5}, {}", format_order(row.order), row.count, row.title);
    }
    println!("count = {}", stats.total);
    println!("max pk = {}", stats.max_primary_key);
    Ok(())
}

fn cmd_rename(path: &Path, dry_run: bool, yes: bool, options: NodeOptions) -> Result<()> {
    let outline = open_outline(path, options);
    let preview = auto_rename(&outline, true)?;
    let pending: Vec<_> = preview.iter().filter(|op| !op.is_noop()).collect();
    if pending.is_empty() {
        println!("Nothing to rename.");
        return Ok(());
    }
    for op in &pending {
        println!("----{}", op.from.display());
        println!("++++{}", op.to.display());
    }
    if dry_run {
        return Ok(());
    }
    if !yes && !confirm("Rename these files?")? {
        return Ok(());
    }
    auto_rename(&outline, false).context("renaming files")?;
    println!("Files renamed.");
    Ok(())
}

fn cmd_transform(path: &Path, transform: Transform, options: NodeOptions) -> Result<()> {
    let outline = open_outline(path, options);
    let report = transform_tree(&outline, transform)?;
    for file in &report.skipped {
        println!("skipped (missing): {}", file.display());
    }
    println!(
        "{} nodes visited, {} rewritten",
        report.visited,
        report.rewritten.len()
    );
    Ok(())
}

fn cmd_compile(
    path: &Path,
    build_dir: Option<PathBuf>,
    only_compiled: bool,
    no_epub: bool,
    config: &BookConfig,
    options: NodeOptions,
) -> Result<()> {
    let project = Project::open_with(path, options)?;
    let text = Compiler::new()
        .only_compiled(only_compiled)
        .compile_project(&project);
    let mut export = EbookExport::from_config(&config.export);
    if let Some(dir) = build_dir {
        export = export.with_build_dir(dir);
    }
    let out = export
        .export(project.path(), &text, no_epub)
        .context("exporting manuscript")?;
    println!("wrote {}", out.display());
    Ok(())
}

async fn cmd_session(
    path: &Path,
    goal: Option<u64>,
    start: Option<u64>,
    config: &BookConfig,
    options: NodeOptions,
) -> Result<()> {
    let project = Project::open_with(path, options)?;
    let outline = project.outline();
    let snapshotter = GitSnapshotter::new(project.path()).with_push(config.session.push);
    let mut session = Session::new(outline, snapshotter, Some(goal.unwrap_or(config.session.goal)), start)
        .with_thresholds(SessionThresholds::from_config(&config.session));

    let mut interval = tokio::time::interval(Duration::from_secs(config.session.poll_interval_secs.max(1)));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                match session.tick(outline) {
                    Ok(status) => {
                        print!("\r{status}                ");
                        io::stdout().flush()?;
                        if status.snapshot_taken {
                            println!("\nsnapshot committed");
                        }
                    }
                    Err(e) => warn!(error = %e, "session snapshot failed"),
                }
            }
            _ = &mut ctrl_c => {
                println!();
                break;
            }
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let target = match &cli.command {
        Commands::New { path, .. }
        | Commands::Stats { path, .. }
        | Commands::Rename { path, .. }
        | Commands::Transform { path, .. }
        | Commands::Compile { path, .. }
        | Commands::Session { path, .. } => path.clone(),
    };
    let config = load_config(cli.config.as_deref(), &target)?;
    let options = NodeOptions::from_config(&config);

    match cli.command {
        Commands::New { path, convert } => cmd_new(&path, convert, options),
        Commands::Stats { path, folders, json } => cmd_stats(&path, folders, json, options),
        Commands::Rename { path, dry_run, yes } => cmd_rename(&path, dry_run, yes, options),
        Commands::Transform { path, soft_crlf, .. } => {
            let transform = if soft_crlf {
                Transform::SoftCrlf
            } else {
                Transform::HardCrlf
            };
            cmd_transform(&path, transform, options)
        }
        Commands::Compile {
            path,
            build_dir,
            only_compiled,
            no_epub,
        } => cmd_compile(&path, build_dir, only_compiled, no_epub, &config, options),
        Commands::Session { path, goal, start } => {
            cmd_session(&path, goal, start, &config, options).await
        }
    }
}
