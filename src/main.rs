//! layerpipe - command line entry point
//!
//! Runs or renders a graph declared in a TOML/JSON file.
//!
//! ```text
//! layerpipe [--log-level <filter>] run <graph> [--input <json>] [--trace-nodes]
//! layerpipe [--log-level <filter>] render <graph> [--format dot|mermaid|json]
//! ```

use anyhow::{bail, Context};
use layerpipe::config::GraphConfig;
use layerpipe::pipeline::{Payload, TopologyExporter, TracingObserver};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const USAGE: &str = "\
Usage:
  layerpipe [--log-level <filter>] run <graph> [--input <json>] [--trace-nodes]
  layerpipe [--log-level <filter>] render <graph> [--format dot|mermaid|json]";

#[derive(Debug, PartialEq)]
struct Cli {
    log_level: Option<String>,
    command: Command,
}

#[derive(Debug, PartialEq)]
enum Command {
    Run {
        config: PathBuf,
        input: Option<String>,
        trace_nodes: bool,
    },
    Render {
        config: PathBuf,
        format: RenderFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum RenderFormat {
    Dot,
    Mermaid,
    Json,
}

impl std::str::FromStr for RenderFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "dot" => Ok(RenderFormat::Dot),
            "mermaid" => Ok(RenderFormat::Mermaid),
            "json" => Ok(RenderFormat::Json),
            other => bail!("unknown format '{}' (expected dot, mermaid or json)", other),
        }
    }
}

fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<Cli> {
    let mut args = args.into_iter().skip(1);
    let mut log_level = None;
    let mut subcommand = None;
    let mut config = None;
    let mut input = None;
    let mut trace_nodes = false;
    let mut format = RenderFormat::Dot;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--log-level" => log_level = Some(value_of(&mut args, "--log-level")?),
            "--input" => input = Some(value_of(&mut args, "--input")?),
            "--format" => format = value_of(&mut args, "--format")?.parse()?,
            "--trace-nodes" => trace_nodes = true,
            flag if flag.starts_with("--") => bail!("unknown option '{}'", flag),
            _ if subcommand.is_none() => subcommand = Some(arg),
            _ if config.is_none() => config = Some(PathBuf::from(arg)),
            _ => bail!("unexpected argument '{}'", arg),
        }
    }

    let Some(config) = config else {
        bail!("missing graph file");
    };
    let command = match subcommand.as_deref() {
        Some("run") => Command::Run {
            config,
            input,
            trace_nodes,
        },
        Some("render") => Command::Render { config, format },
        Some(other) => bail!("unknown command '{}'", other),
        None => bail!("missing command"),
    };

    Ok(Cli { log_level, command })
}

fn value_of(args: &mut impl Iterator<Item = String>, flag: &str) -> anyhow::Result<String> {
    args.next()
        .with_context(|| format!("{} needs a value", flag))
}

fn main() -> anyhow::Result<()> {
    let cli = match parse_args(std::env::args()) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("error: {}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };

    // Initialize logging
    let filter = match &cli.log_level {
        Some(level) => EnvFilter::try_new(level).context("Invalid --log-level filter")?,
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,layerpipe=debug")),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Command::Run {
            config,
            input,
            trace_nodes,
        } => run(&config, input.as_deref(), trace_nodes),
        Command::Render { config, format } => render(&config, format),
    }
}

fn run(path: &Path, input: Option<&str>, trace_nodes: bool) -> anyhow::Result<()> {
    let config = GraphConfig::load(path)?;
    let mut built = config
        .build()
        .with_context(|| format!("Failed to build graph from {:?}", path))?;

    if trace_nodes {
        built.set_observer(Box::new(TracingObserver));
    }

    let input = match input {
        Some(json) => Some(
            serde_json::from_str::<Payload>(json).context("--input must be a JSON object")?,
        ),
        None => built.input.clone(),
    };

    tracing::info!("Running graph '{}'", built.name);
    let report = built.run_with_input(input)?;
    println!("{}", serde_json::to_string_pretty(&report.outputs)?);
    Ok(())
}

fn render(path: &Path, format: RenderFormat) -> anyhow::Result<()> {
    let built = GraphConfig::load(path)?.build()?;
    let topology = built.graph.topology();
    let output = match format {
        RenderFormat::Dot => topology.to_dot(),
        RenderFormat::Mermaid => topology.to_mermaid(),
        RenderFormat::Json => topology.to_json()?,
    };
    print!("{}", output);
    Ok(())
}
