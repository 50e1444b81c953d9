//! cwlgen CLI Entry Point
//!
//! Provides the command-line interface for document generation.
//!
//! # Usage
//!
//! ```bash
//! # Generate tools, workflow and packed workflow into ./out/cli
//! cwlgen generate --config pipeline.yaml --output out \
//!     --docker-url-base ghcr.io/owner/repo --docker-tag main
//!
//! # Use a custom bootstrap template and skip cwltool validation
//! cwlgen generate --config pipeline.yaml --output out \
//!     --docker-url-base ghcr.io/owner/repo --docker-tag main \
//!     --tool-template tool.sh.hbs --skip-validation
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use log::{error, info};

use cwlgen::environment::bootstrap::load_template;
use cwlgen::execution::tools::DEFAULT_CWLTOOL;
use cwlgen::execution::{CwlTool, GenerationReport, Generator};
use cwlgen::{load_workflow_spec, APP_NAME, VERSION};

#[derive(Parser, Debug)]
#[command(name = "cwlgen")]
#[command(version = VERSION)]
#[command(about = "Generate CWL workflows and CommandLineTools from a pipeline description")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(
        about = "Generate every document for a pipeline",
        after_help = concat!(
            "Example:\n    cwlgen generate --config pipeline.yaml --output out ",
            "--docker-url-base ghcr.io/owner/repo --docker-tag main"
        )
    )]
    Generate(GenerateArgs),
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Pipeline description (YAML)
    #[arg(long = "config", value_name = "FILE")]
    config_path: PathBuf,

    /// Output root; documents are written below <OUTPUT>/cli
    #[arg(long = "output", value_name = "DIR")]
    output_path: PathBuf,

    /// Base of the docker registry url, e.g. ghcr.io/owner/repo. Combined with
    /// --docker-tag into the pull url of each script-based step
    #[arg(long)]
    docker_url_base: String,

    /// Image tag used by the generated tools to pull their images, e.g. `main`
    #[arg(long)]
    docker_tag: String,

    /// Handlebars template replacing the built-in tool bootstrap script
    #[arg(long, value_name = "FILE")]
    tool_template: Option<PathBuf>,

    /// Do not run `cwltool --validate` on the packed workflow
    #[arg(long)]
    skip_validation: bool,

    /// cwltool binary used to pack and validate
    #[arg(long, env = "CWLTOOL_BIN", default_value = DEFAULT_CWLTOOL, hide = true)]
    cwltool: PathBuf,

    /// GitHub Actions step-output file
    #[arg(long, env = "GITHUB_OUTPUT", hide = true)]
    github_output: Option<PathBuf>,
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME.bold(), VERSION);
    println!("CWL Workflow Generator");
    println!();
}

fn print_summary(report: &GenerationReport) {
    println!();
    println!("{}", "Generation complete".green().bold());
    for tool in &report.tools {
        println!("  {} {}", "tool".cyan(), tool.display());
    }
    println!("  {} {}", "workflow".cyan(), report.workflow.display());
    println!("  {} {}", "packed".cyan(), report.packed.display());
    if !report.validated {
        println!("  {}", "validation skipped".yellow());
    }
}

fn generate(args: GenerateArgs) -> Result<(), Box<dyn std::error::Error>> {
    info!("Loading pipeline: {}", args.config_path.display());
    let spec = load_workflow_spec(&args.config_path).map_err(|e| {
        error!("Failed to load pipeline: {}", e);
        e
    })?;

    let mut generator = Generator::new(spec, CwlTool::new(&args.cwltool));
    generator.set_output_dir(&args.output_path);
    generator.set_docker_url_base(&args.docker_url_base);
    generator.set_docker_tag(&args.docker_tag);
    generator.set_skip_validation(args.skip_validation);

    if let Some(path) = &args.tool_template {
        info!("Bootstrap template: {}", path.display());
        generator.set_tool_template(load_template(path)?);
    }

    if let Some(path) = &args.github_output {
        generator.set_action_output(path);
    }

    let report = generator.run()?;
    print_summary(&report);
    Ok(())
}

/// Main application entry point.
fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);
    print_banner();

    match cli.command {
        Command::Generate(args) => generate(args),
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
