use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Command-line client for the Prompt Gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8000")]
    url: String,

    /// API key sent with /api requests.
    #[arg(short, long, env = "GATEWAY_API_KEY")]
    key: Option<String>,

    #[arg(long, default_value = "X-API-Key")]
    key_header: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway liveness
    Health,
    /// List models available on the backend
    Models,
    /// Submit a prompt for generation
    Generate {
        prompt: String,

        #[arg(short, long)]
        model: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(
            HeaderName::from_bytes(cli.key_header.as_bytes())?,
            HeaderValue::from_str(key)?,
        );
    }

    let res = match cli.command {
        Commands::Health => client.get(format!("{base}/health")).send().await?,
        Commands::Models => {
            client
                .get(format!("{base}/api/models"))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Generate { prompt, model } => {
            let mut body = json!({ "prompt": prompt });
            if let Some(model) = model {
                body["model"] = Value::String(model);
            }
            client
                .post(format!("{base}/api/generate"))
                .headers(headers)
                .json(&body)
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        eprintln!("Response: {}", text);
        std::process::exit(1);
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
