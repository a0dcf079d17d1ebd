use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

use nbgen::config::{parse_assignment, GeneratorConfig};
use nbgen::{ContextStore, NotebookGenerator};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log debug output (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a notebook next to each script
    Generate {
        #[arg(required = true)]
        scripts: Vec<PathBuf>,
        /// Config file (defaults to nbgen.yml in the working directory)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Context value as key=value; the value is read as JSON or a plain string
        #[arg(short, long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
        /// Convert each generated notebook afterwards
        #[arg(long)]
        convert: bool,
        /// Conversion target format, implies --convert
        #[arg(long, value_name = "FORMAT")]
        to: Option<String>,
    },
    /// Convert an existing notebook
    Convert {
        notebook: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long, value_name = "FORMAT")]
        to: Option<String>,
        /// Converter option as key=value
        #[arg(short, long = "option", value_name = "KEY=VALUE")]
        option: Vec<String>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<GeneratorConfig> {
    match path {
        Some(path) => GeneratorConfig::from_path(path),
        None => GeneratorConfig::discover(env::current_dir()?),
    }
}

fn convert(config: &GeneratorConfig, notebook: &std::path::Path) -> anyhow::Result<()> {
    let status = config
        .convert
        .run(notebook)
        .with_context(|| format!("could not run {}", config.convert.command))?;
    if !status.success() {
        return Err(anyhow!(
            "{} exited with {} for {}",
            config.convert.command,
            status,
            notebook.display()
        ));
    }
    println!("{} {}", style("Converted").green().bold(), notebook.display());
    Ok(())
}

/// Reports an error and its causes, returning `None` on failure.
fn print_err<T>(res: anyhow::Result<T>) -> Option<T> {
    match res {
        Ok(s) => Some(s),
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            e.chain()
                .skip(1)
                .for_each(|cause| eprintln!(" {} {}", style("caused by:").bold(), cause));
            None
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Generate {
            scripts,
            config,
            set,
            convert: do_convert,
            to,
        } => {
            let mut config = load_config(config).context("Error loading configuration:")?;
            for assignment in &set {
                config.set(assignment)?;
            }
            if let Some(to) = &to {
                config
                    .convert
                    .options
                    .insert("to".to_string(), serde_json::Value::String(to.clone()));
            }

            // One store for the whole invocation, so later scripts see earlier values.
            let mut store = ContextStore::new();
            let mut failed = 0;
            for script in &scripts {
                let generator = NotebookGenerator::new(script, config.context_values());
                let generated = generator
                    .generate(&mut store)
                    .with_context(|| format!("could not generate {}", generator.path().display()));
                let Some(output) = print_err(generated) else {
                    failed += 1;
                    continue;
                };
                println!(
                    "{} {} -> {}",
                    style("Generated").green().bold(),
                    generator.path().display(),
                    output.display()
                );
                if (do_convert || to.is_some()) && print_err(convert(&config, &output)).is_none() {
                    failed += 1;
                }
            }
            if failed > 0 {
                return Err(anyhow!("{failed} of {} scripts failed", scripts.len()));
            }
            Ok(())
        }
        Commands::Convert {
            notebook,
            config,
            to,
            option,
        } => {
            let mut config = load_config(config).context("Error loading configuration:")?;
            for assignment in &option {
                let (key, value) = parse_assignment(assignment)?;
                config.convert.options.insert(key, value);
            }
            if let Some(to) = to {
                config
                    .convert
                    .options
                    .insert("to".to_string(), serde_json::Value::String(to));
            }
            convert(&config, &notebook)
        }
    }
}
