use std::path::PathBuf;
use std::sync::Arc;

use actix_web::web;
use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use student_success::enhancer::{enhance_or_fallback, HfEnhancer, InsightEnhancer, OllamaEnhancer};
use student_success::server::{self, AppState};
use student_success::{EnhancerConfig, HfConfig, Pipeline, PipelineConfig, Tables};

#[derive(Parser)]
#[command(name = "student-success")]
#[command(about = "Academic risk and remediation guidance from exam records", long_about = None)]
struct Cli {
    /// Directory holding students.csv, subjects.csv and performance.csv
    #[arg(long, default_value = "data", global = true)]
    data_dir: PathBuf,

    /// Optional TOML file overriding pipeline settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Generative-text backend used by --enhance and the API
    #[arg(long, value_enum, default_value_t = Backend::Ollama, global = true)]
    backend: Backend,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    /// Local Ollama server (OLLAMA_URL, OLLAMA_MODEL)
    Ollama,
    /// Hugging Face inference API (HF_API_KEY, HF_API_URL)
    Hf,
}

impl Backend {
    fn enhancer(self) -> anyhow::Result<Arc<dyn InsightEnhancer>> {
        let enhancer: Arc<dyn InsightEnhancer> = match self {
            Backend::Ollama => Arc::new(OllamaEnhancer::new(EnhancerConfig::from_env())?),
            Backend::Hf => {
                let config = HfConfig::from_env().context("Hugging Face backend needs HF_API_KEY")?;
                Arc::new(HfEnhancer::new(config)?)
            }
        };
        Ok(enhancer)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the mentorship report for one student
    Report {
        #[arg(long)]
        student: String,
        /// Pass the report through the generative-text enhancer
        #[arg(long)]
        enhance: bool,
    },
    /// Write guidance for every student as JSON
    Export {
        #[arg(long, default_value = "guidance.json")]
        out: PathBuf,
    },
    /// Serve the JSON API
    Serve {
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: String,
        /// Disable the generative-text enhancer
        #[arg(long)]
        no_enhancer: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => PipelineConfig::load_from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    let tables = Tables::load_dir(&cli.data_dir)
        .with_context(|| format!("failed to load tables from {}", cli.data_dir.display()))?;
    let pipeline = Pipeline::new(&config);

    match cli.command {
        Commands::Report { student, enhance } => {
            let output = pipeline.run(&tables).context("pipeline run failed")?;
            let guidance = pipeline.guidance(&tables, &output, &student);
            if guidance.student.is_none() {
                tracing::warn!(student_id = %student, "student not found in students table");
            }

            if enhance {
                let enhancer = cli.backend.enhancer()?;
                let result = enhance_or_fallback(enhancer.as_ref(), &guidance.report);
                if !result.enhanced {
                    println!("Mentor service unavailable, using local insights.\n");
                }
                println!("{}", result.text);
            } else {
                println!("{}", guidance.report);
            }
        }
        Commands::Export { out } => {
            let output = pipeline.run(&tables).context("pipeline run failed")?;
            let guidance = pipeline.all_guidance(&tables, &output);
            let json = serde_json::to_string_pretty(&guidance)?;
            std::fs::write(&out, json)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Guidance for {} students written to {}.", guidance.len(), out.display());
        }
        Commands::Serve { bind, no_enhancer } => {
            // The blocking HTTP client must be built outside the async runtime.
            let enhancer: Option<Arc<dyn InsightEnhancer>> = if no_enhancer {
                None
            } else {
                Some(cli.backend.enhancer()?)
            };
            let state = web::Data::new(AppState {
                tables,
                pipeline,
                enhancer,
            });
            // Keep a handle so the enhancer client is dropped after the runtime stops.
            let handle = state.clone();
            actix_web::rt::System::new()
                .block_on(server::start_api(state, &bind))
                .context("API server failed")?;
            drop(handle);
        }
    }

    Ok(())
}
