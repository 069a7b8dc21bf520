use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use mvli::config::Config;
use mvli::navigation::{NavigationGraph, ResolverOptions, RouteResolver};

#[derive(Parser, Debug)]
#[command(name = "mvli", about = "Inspect navigation graphs")]
struct Cli {
    /// Config file (defaults to ~/.config/mvli/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log resolver decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every leaf with its full path
    Routes { graph: PathBuf },
    /// Resolve a path against a graph
    Resolve { graph: PathBuf, path: String },
    /// Build the route index and report problems
    Check {
        graph: PathBuf,
        /// Treat ambiguous bare routes as errors
        #[arg(long)]
        strict: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if std::env::var_os(mvli::logging::LOG_ENV).is_some() {
        mvli::logging::init_tracing();
    } else {
        mvli::logging::init_stderr(cli.verbose);
    }

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let mut options = ResolverOptions::from(&config.navigation);

    match cli.command {
        Command::Routes { graph } => {
            let resolver = build(&graph, options)?;
            for target in resolver.targets() {
                let title = target.destination.title().unwrap_or("-");
                println!(
                    "{:<40} {:<7} graph={} title={}",
                    display_path(&target.full_path),
                    kind_label(target.destination.is_modal()),
                    target.graph_id,
                    title
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Resolve { graph, path } => {
            let resolver = build(&graph, options)?;
            let Some(resolution) = resolver.resolve(&path) else {
                println!("{} -> unresolved", display_path(&path));
                return Ok(ExitCode::FAILURE);
            };
            println!("path:        {}", display_path(&resolution.path));
            println!("kind:        {:?}", resolution.kind);
            println!("full path:   {}", display_path(&resolution.full_path));
            println!("graph:       {}", resolution.graph_id);
            println!("destination: {}", kind_label(resolution.destination.is_modal()));
            for (name, value) in &resolution.params {
                println!("param:       {}={}", name, value);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Check { graph, strict } => {
            options.strict_bare_routes |= strict;
            let resolver = build(&graph, options)?;
            for (route, count) in resolver.ambiguous_bare_routes() {
                println!("warning: bare route '{}' matches {} destinations", route, count);
            }
            println!(
                "ok: {} destinations, {} nested graphs",
                resolver.targets().len(),
                resolver.graph_paths().len()
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build(path: &Path, options: ResolverOptions) -> anyhow::Result<RouteResolver> {
    let graph = NavigationGraph::load(path)?;
    RouteResolver::with_options(&graph, options)
        .with_context(|| format!("invalid graph '{}'", path.display()))
}

fn display_path(path: &str) -> String {
    format!("/{}", path.trim_matches('/'))
}

fn kind_label(modal: bool) -> &'static str {
    if modal {
        "modal"
    } else {
        "screen"
    }
}
