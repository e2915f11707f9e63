use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, ValueEnum};
use log::{debug, error, info};

use flowsvg::FlowsvgError;
use flowsvg::cli::{init_logging, is_stdin, read_input};
use flowsvg::config::load_config;
use flowsvg::host::{DocumentKind, HostOptions, convert_document};

/// Inline Mermaid flowcharts in HTML and Markdown documents as static SVG
#[derive(Parser, Debug)]
#[command(name = "flowsvg")]
#[command(version)]
#[command(about = "Replace Mermaid diagram blocks with self-contained inline SVG", long_about = None)]
struct Args {
    /// Documents to convert (use "-" for stdin)
    #[arg(value_name = "INPUT", required = true)]
    inputs: Vec<PathBuf>,

    /// Write the result here instead of rewriting the input (single input only)
    #[arg(short, long, value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Document kind; inferred from the extension when omitted
    #[arg(long, value_enum)]
    kind: Option<KindArg>,

    /// Canvas width in pixels (overrides the configuration file)
    #[arg(short, long)]
    width: Option<f32>,

    /// Path to configuration file (TOML or YAML)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Leave Mermaid runtime scripts in converted HTML
    #[arg(long)]
    keep_scripts: bool,

    /// Copy each rewritten document to <name>.bak first
    #[arg(long)]
    backup: bool,

    /// Report what would change without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    Html,
    Markdown,
}

impl From<KindArg> for DocumentKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Html => DocumentKind::Html,
            KindArg::Markdown => DocumentKind::Markdown,
        }
    }
}

fn main() {
    let args = Args::parse();
    init_logging(&args.log_level);
    debug!(args:?; "Parsed arguments");

    match run(&args) {
        Ok(0) => {}
        Ok(failed) => {
            error!(failed = failed, total = args.inputs.len(); "Some documents could not be converted");
            process::exit(1);
        }
        Err(err) => {
            error!("{err}");
            process::exit(1);
        }
    }
}

/// Convert every input, returning how many failed.
fn run(args: &Args) -> Result<usize, FlowsvgError> {
    if args.output.is_some() && args.inputs.len() > 1 {
        return Err(FlowsvgError::usage("--output can only be used with a single input"));
    }

    let config = load_config(args.config.as_ref())?;
    let mut options = HostOptions {
        render: config.render.options(),
        host: config.host,
    };
    if let Some(width) = args.width {
        options.render.canvas_width = width;
    }
    if args.keep_scripts {
        options.host.remove_scripts = false;
    }

    let mut failed = 0;
    for input in &args.inputs {
        if let Err(err) = process_document(input, args, &options) {
            error!(path = input.display().to_string(), error = err.to_string(); "Failed to convert document");
            failed += 1;
        }
    }
    Ok(failed)
}

fn process_document(input: &Path, args: &Args, options: &HostOptions) -> Result<(), FlowsvgError> {
    let kind = match (args.kind, DocumentKind::from_path(input)) {
        (Some(kind), _) => kind.into(),
        (None, Some(kind)) => kind,
        (None, None) if is_stdin(input) => DocumentKind::Html,
        (None, None) => {
            return Err(FlowsvgError::usage(format!(
                "Cannot tell the document kind of {}; pass --kind",
                input.display()
            )));
        }
    };

    let content = read_input(input)?;
    let conversion = convert_document(&content, kind, options);
    let report = conversion.report;

    if args.dry_run {
        info!(
            path = input.display().to_string(),
            blocks = report.blocks_found,
            placeholders = report.placeholders,
            scripts = report.scripts_removed;
            "Dry run, nothing written"
        );
        return Ok(());
    }

    match (&args.output, is_stdin(input)) {
        (Some(output), _) => {
            fs::write(output, &conversion.content)?;
            info!(path = output.display().to_string(), converted = report.converted; "Document saved");
        }
        (None, true) => {
            std::io::stdout().write_all(conversion.content.as_bytes())?;
        }
        (None, false) if !report.changed() => {
            info!(path = input.display().to_string(); "No diagram blocks, left untouched");
        }
        (None, false) => {
            if args.backup {
                let backup = backup_path(input);
                fs::copy(input, &backup)?;
                debug!(path = backup.display().to_string(); "Backup written");
            }
            fs::write(input, &conversion.content)?;
            info!(path = input.display().to_string(), converted = report.converted; "Document rewritten");
        }
    }

    Ok(())
}

fn backup_path(input: &Path) -> PathBuf {
    let mut name = OsString::from(input.as_os_str());
    name.push(".bak");
    PathBuf::from(name)
}
