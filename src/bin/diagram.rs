use std::path::PathBuf;
use std::process;

use clap::Parser;
use log::{debug, error, info};

use flowsvg::FlowsvgError;
use flowsvg::cli::{init_logging, read_input};
use flowsvg::config::load_config;
use flowsvg::export::{ExportFormat, export};
use flowsvg::mermaid::render_diagram_with_outcome;

/// Standalone flowchart renderer (SVG/PNG/PDF)
#[derive(Parser, Debug)]
#[command(name = "flowsvg-diagram")]
#[command(version)]
#[command(about = "Render a Mermaid flowchart to SVG, PNG or PDF", long_about = None)]
struct Args {
    /// Input .mmd file (use "-" for stdin)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output file path (extension determines format: .svg, .png or .pdf)
    #[arg(short, long, value_name = "OUTPUT")]
    output: PathBuf,

    /// Canvas width in pixels (overrides the configuration file)
    #[arg(short, long)]
    width: Option<f32>,

    /// Path to configuration file (TOML or YAML)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Raster scale multiplier for PNG output
    #[arg(long, default_value_t = 1.0)]
    png_scale: f32,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let args = Args::parse();
    init_logging(&args.log_level);
    debug!(args:?; "Parsed arguments");

    if let Err(err) = run(&args) {
        error!("{err}");
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), FlowsvgError> {
    // Fail on a bad extension before doing any work
    let format = ExportFormat::from_path(&args.output)?;

    let config = load_config(args.config.as_ref())?;
    let mut options = config.render.options();
    if let Some(width) = args.width {
        options.canvas_width = width;
    }

    let source = read_input(&args.input)?;
    let (svg, outcome) = render_diagram_with_outcome(&source, &options);
    debug!(outcome:?; "Rendered diagram");

    let bytes = export(&svg, format, args.png_scale)?;
    std::fs::write(&args.output, bytes)?;
    info!(path = args.output.display().to_string(), format:?; "Diagram saved");

    Ok(())
}
