use crate::config::load_config;
use crate::document::{Document, TreeView};
use crate::layout_dump::write_layout_dump_to;
use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "flowtree",
    version,
    about = "Load a declarative flow tree, lay it out and print the result"
)]
pub struct Args {
    /// Input file (JSON or JSON5 node list) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Config JSON file
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Layout strategy, overrides the config file
    #[arg(short = 'l', long = "layout")]
    pub layout: Option<String>,

    /// Print the origin tree listing instead of the geometry dump
    #[arg(long = "listing")]
    pub listing: bool,

    /// With --listing, print the render projection instead
    #[arg(long = "render")]
    pub render: bool,

    /// With --listing, append each node's kind
    #[arg(long = "kinds")]
    pub kinds: bool,

    /// Straighten splits with a single live branch
    #[arg(long = "refineBranches")]
    pub refine_branches: bool,
}

pub fn run() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())
        .with_context(|| "failed to load config file")?;
    if let Some(layout) = &args.layout {
        config.layout = layout.clone();
    }
    if args.refine_branches {
        config.refine_branches = true;
    }

    let input = read_input(args.input.as_deref())?;
    let mut document = Document::with_config(config)?;
    document.from_json_str(&input)?;
    document.refresh()?;

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("cannot create {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    };
    if args.listing {
        let view = if args.render {
            TreeView::Render
        } else {
            TreeView::Origin
        };
        writeln!(out, "{}", document.to_listing(view, args.kinds)?)?;
    } else {
        write_layout_dump_to(&mut out, &document)?;
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        return std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()));
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}
