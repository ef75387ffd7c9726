use anyhow::Result;
use clap::Parser;
use factory_analyst::backend::{DatasetBackend, QueryBackend, SqliteBackend};
use factory_analyst::charts::CsvChartWriter;
use factory_analyst::engine::{EngineStatus, FactoryAnalyst};
use factory_analyst::llm::LlmClient;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "factory-analyst")]
#[command(about = "Natural-language query assistant for factory operations data")]
struct Args {
    /// One-shot question; omit for an interactive session
    question: Option<String>,

    /// Path to a SQLite database of factory data
    #[arg(long)]
    database: Option<PathBuf>,

    /// Directory of CSV tables (used when no database is given)
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// Directory for chart artifacts
    #[arg(long, default_value = "charts")]
    charts_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let model = Arc::new(LlmClient::from_env()?);

    let mut engine = if let Some(database) = &args.database {
        info!(database = %database.display(), "using SQLite backend");
        let backend: Arc<dyn QueryBackend> = Arc::new(SqliteBackend::new(database.clone()));
        FactoryAnalyst::new(model, backend)
    } else {
        info!(data_dir = %args.data_dir.display(), "using dataset backend");
        let dataset = Arc::new(DatasetBackend::from_dir(&args.data_dir)?);
        let backend: Arc<dyn QueryBackend> = dataset.clone();
        FactoryAnalyst::new(model, backend)
            .with_charts(dataset, Box::new(CsvChartWriter::new(args.charts_dir.clone())))
    };

    if let EngineStatus::Error(detail) = engine.status() {
        eprintln!("Startup problem: {}", detail);
    }

    if let Some(question) = &args.question {
        let answer = engine.ask(question).await;
        println!("{}", answer.text);
        if let Some(chart) = answer.chart {
            println!("Chart: {}", chart);
        }
        return Ok(());
    }

    println!("Factory Analyst is ready. Type 'exit' or 'quit' to end the session.");
    let stdin = std::io::stdin();
    loop {
        print!("Ask a question: ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question.to_lowercase().as_str(), "exit" | "quit") {
            break;
        }

        let answer = engine.ask(question).await;
        println!("\n{}", answer.text);
        if let Some(chart) = answer.chart {
            println!("Chart: {}", chart);
        }
        println!();
    }

    println!("Goodbye!");
    Ok(())
}
