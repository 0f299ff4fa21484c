use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod dashboard;
mod error;
mod fixture;
mod kpi;
mod models;
mod prediction;
mod report;
mod source;

use api::ApiClient;
use config::{Config, KpiEndpoint, SourceKind};
use error::DashboardError;
use fixture::FixtureSource;
use prediction::{AgeBand, Gender, LabelStyle, ModelKind, PredictionForm, PredictionRequest};
use source::DashboardSource;

#[derive(Parser)]
#[command(name = "learning-analytics")]
#[command(about = "KPI and predictive-model dashboard for student learning analytics", long_about = None)]
struct Cli {
    /// Analytics backend base URL
    #[arg(
        long,
        global = true,
        env = "LEARNING_ANALYTICS_API_URL",
        default_value = config::DEFAULT_BASE_URL
    )]
    base_url: String,
    #[arg(long, global = true, value_enum, default_value_t = SourceKind::Live)]
    source: SourceKind,
    /// CSV of KPI records for fixture mode
    #[arg(long, global = true)]
    fixture_csv: Option<PathBuf>,
    #[arg(long, global = true, value_enum, default_value_t = KpiEndpoint::Metrics)]
    kpi_endpoint: KpiEndpoint,
    /// JSON object of KPI name to target value, replacing the built-in table
    #[arg(long, global = true)]
    targets: Option<PathBuf>,
    #[arg(long, global = true, default_value_t = config::DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show KPIs grouped by category with target progress
    Kpi {
        #[arg(long)]
        json: bool,
    },
    /// Show predictive model status
    Models {
        #[arg(long)]
        json: bool,
    },
    /// Show the prediction series of one model
    ModelPredictions { model_id: String },
    /// Ask the backend to retrain a model
    Retrain { model_id: String },
    /// Submit student features (or a known student id) to a classifier
    Predict {
        #[arg(long, value_enum, default_value_t = ModelKind::FinalResult)]
        model: ModelKind,
        #[arg(long, conflicts_with_all = [
            "gender", "age_band", "studied_credits",
            "num_of_prev_attempts", "total_clicks", "avg_assessment_score",
        ])]
        student_id: Option<u64>,
        #[arg(long, value_enum, default_value_t = Gender::F)]
        gender: Gender,
        #[arg(long, value_enum, default_value_t = AgeBand::UpTo35)]
        age_band: AgeBand,
        #[arg(long, default_value = "60", allow_hyphen_values = true)]
        studied_credits: String,
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        num_of_prev_attempts: String,
        #[arg(long, default_value = "1000", allow_hyphen_values = true)]
        total_clicks: String,
        #[arg(long, default_value = "70", allow_hyphen_values = true)]
        avg_assessment_score: String,
        #[arg(long, value_enum, default_value_t = LabelStyle::Short)]
        style: LabelStyle,
        #[arg(long)]
        json: bool,
    },
    /// Write a markdown report of KPIs and model status
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = Config::new(
        &cli.base_url,
        cli.source,
        cli.fixture_csv,
        cli.kpi_endpoint,
        cli.targets.as_deref(),
        cli.timeout_secs,
    )?;

    let result = match config.source {
        SourceKind::Live => {
            let client = ApiClient::from_config(&config).context("failed to build HTTP client")?;
            run_live(&client, cli.command, &config).await
        }
        SourceKind::Fixture => {
            let now = Utc::now();
            let fixture = match &config.fixture_csv {
                Some(path) => FixtureSource::from_csv(now, path)?,
                None => FixtureSource::new(now),
            };
            tracing::warn!("Using fixture data, not the live backend");
            run_dashboard(&fixture, cli.command, &config).await
        }
    };

    if let Err(err) = &result {
        if let Some(dashboard_err) = err.downcast_ref::<DashboardError>() {
            if dashboard_err.is_bad_data() {
                eprintln!("The backend sent KPI data that could not be read; nothing was rendered.");
            } else if dashboard_err.is_client_status() {
                eprintln!(
                    "The backend rejected the request. Check --base-url and --kpi-endpoint, then retry."
                );
            } else if dashboard_err.is_retryable() {
                eprintln!("The backend could not be reached or failed. Retry the command.");
            }
        }
    }

    result
}

async fn run_live(client: &ApiClient, command: Commands, config: &Config) -> anyhow::Result<()> {
    match command {
        Commands::ModelPredictions { model_id } => {
            let points = client.fetch_model_predictions(&model_id).await?;
            print!("{}", report::render_predictions(&model_id, &points));
        }
        Commands::Retrain { model_id } => {
            let message = client.retrain_model(&model_id).await?;
            println!(
                "{}",
                message.unwrap_or_else(|| format!("Retraining requested for {model_id}."))
            );
        }
        Commands::Predict {
            model,
            student_id,
            gender,
            age_band,
            studied_credits,
            num_of_prev_attempts,
            total_clicks,
            avg_assessment_score,
            style,
            json,
        } => {
            let result = match student_id {
                Some(id) => client.predict_by_id(model, id, style).await?,
                None => {
                    let form = PredictionForm {
                        gender,
                        age_band,
                        studied_credits,
                        num_of_prev_attempts,
                        total_clicks,
                        avg_assessment_score,
                    };
                    let request = PredictionRequest::from(&form);
                    tracing::debug!(?request, "Submitting prediction request");
                    client.predict(model, &request, style).await?
                }
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print!("{}", report::render_prediction(&result));
            }
        }
        other => run_dashboard(client, other, config).await?,
    }

    Ok(())
}

async fn run_dashboard<S: DashboardSource>(
    source: &S,
    command: Commands,
    config: &Config,
) -> anyhow::Result<()> {
    match command {
        Commands::Kpi { json } => {
            let dashboard =
                dashboard::load_kpi_dashboard(source, &config.targets, Utc::now()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&dashboard)?);
            } else {
                print!("{}", report::render_kpis(&dashboard));
            }
        }
        Commands::Models { json } => {
            let status = source.fetch_model_status().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print!("{}", report::render_models(&status));
            }
        }
        Commands::ModelPredictions { model_id } => {
            let status = source.fetch_model_status().await?;
            let model = status
                .models
                .iter()
                .find(|m| m.id == model_id)
                .with_context(|| format!("no model with id {model_id} in {}", source.describe()))?;
            print!("{}", report::render_predictions(&model_id, &model.predictions));
        }
        Commands::Report { out } => {
            let (dashboard, status) =
                dashboard::load_overview(source, &config.targets, Utc::now()).await?;
            let report = report::build_report(&dashboard, Some(&status));
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Retrain { .. } | Commands::Predict { .. } => {
            anyhow::bail!(
                "this command needs the live backend; {} cannot serve it",
                source.describe()
            );
        }
    }

    Ok(())
}
