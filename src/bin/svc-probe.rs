use clap::{Parser, Subcommand};
use rust_service::http::handlers::HealthResponse;

#[derive(Parser)]
#[command(name = "svc-probe")]
#[command(about = "Smoke-check a running instrumented service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the root banner
    Root,
    /// Check service health
    Health,
    /// Dump exposition-format metrics
    Metrics {
        /// Only print lines starting with this prefix
        #[arg(short, long)]
        filter: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Root => {
            let res = client.get(format!("{base}/")).send().await?;
            if let Some(body) = check_status(res).await? {
                println!("{body}");
            }
        }
        Commands::Health => {
            let res = client.get(format!("{base}/health")).send().await?;
            if let Some(body) = check_status(res).await? {
                let health: HealthResponse = serde_json::from_str(&body)?;
                println!("{}: {}", health.service, health.status);
            }
        }
        Commands::Metrics { filter } => {
            let res = client.get(format!("{base}/metrics")).send().await?;
            if let Some(body) = check_status(res).await? {
                body.lines()
                    .filter(|line| filter.as_deref().map_or(true, |prefix| line.starts_with(prefix)))
                    .for_each(|line| println!("{line}"));
            }
        }
    }

    Ok(())
}

async fn check_status(res: reqwest::Response) -> Result<Option<String>, Box<dyn std::error::Error>> {
    let status = res.status();
    let body = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: service returned status {}", status);
        eprintln!("Response: {}", body);
        return Ok(None);
    }
    Ok(Some(body))
}
