use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

use gateway_config::apply::DirCertificateStore;
use gateway_config::compiler::{compile, validate};
use gateway_config::config::load_domain_file;
use gateway_config::gateway::parse;
use gateway_config::layout::{layout, Graph, LayoutOptions};
use gateway_config::model::DomainConfig;
use gateway_config::render::{render_plan, RenderOptions};

#[derive(Parser)]
#[command(name = "gatewayctl")]
#[command(about = "Management CLI for the gateway configuration daemon", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:9091")]
    url: String,

    #[arg(short, long, default_value = "")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check daemon status
    Status,
    /// List loaded domains and their compile status
    Domains,
    /// Validate a domain file against the daemon
    Validate { file: PathBuf },
    /// Compile a domain file against the daemon
    Compile { file: PathBuf },
    /// Lay out the loaded domains, or the given domain files
    Layout { files: Vec<PathBuf> },
    /// Lay out the daemon's live gateway file, or a local one with --file
    GatewayLayout {
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Validate, compile and render a domain file locally
    Check {
        file: PathBuf,
        /// Directory searched for `<domain>.pem` bundles
        #[arg(long, default_value = "certs")]
        certs: PathBuf,
        /// Backend name the system sentinel renders as
        #[arg(long, default_value = "web_backend")]
        system_backend: String,
        /// System backend for SSL passthrough domains
        #[arg(long, default_value = "web_backend_tls")]
        system_tls_backend: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if !cli.key.is_empty() {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
        );
    }

    let res = match cli.command {
        Commands::Status => {
            client
                .get(format!("{}/admin/status", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Domains => {
            client
                .get(format!("{}/admin/domains", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Validate { file } => {
            client
                .post(format!("{}/admin/validate", cli.url))
                .headers(headers)
                .json(&load_domain_file(&file)?)
                .send()
                .await?
        }
        Commands::Compile { file } => {
            client
                .post(format!("{}/admin/compile", cli.url))
                .headers(headers)
                .json(&load_domain_file(&file)?)
                .send()
                .await?
        }
        Commands::Layout { files } if files.is_empty() => {
            client
                .get(format!("{}/admin/layout", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Layout { files } => {
            let configs = files
                .iter()
                .map(|f| load_domain_file(f))
                .collect::<Result<Vec<DomainConfig>, _>>()?;
            client
                .post(format!("{}/admin/layout", cli.url))
                .headers(headers)
                .json(&configs)
                .send()
                .await?
        }
        Commands::GatewayLayout { file: None } => {
            client
                .get(format!("{}/admin/layout/gateway", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::GatewayLayout { file: Some(file) } => {
            let parsed = parse(&std::fs::read_to_string(&file)?)?;
            let graph = Graph::from_gateway(&parsed, &[]);
            let placed = layout(&graph, &LayoutOptions::default());
            println!("{}", serde_json::to_string_pretty(&placed)?);
            return Ok(());
        }
        Commands::Check {
            file,
            certs,
            system_backend,
            system_tls_backend,
        } => {
            let opts = RenderOptions::default()
                .with_system_backend(system_backend)
                .with_system_tls_backend(system_tls_backend);
            if !check(&file, &certs, &opts)? {
                std::process::exit(1);
            }
            return Ok(());
        }
    };
    print_response(res).await?;

    Ok(())
}

/// Offline check. Returns false when the file would be rejected.
fn check(file: &Path, certs: &Path, opts: &RenderOptions) -> Result<bool, Box<dyn std::error::Error>> {
    let config = load_domain_file(file)?;
    let certs = DirCertificateStore::new(certs);

    let report = validate(&config, &certs);
    for finding in &report.findings {
        eprintln!("{}", finding);
    }

    match compile(&config, &certs) {
        Ok(plan) => {
            print!("{}", render_plan(&plan, opts));
            Ok(true)
        }
        Err(_) => {
            eprintln!("{}: rejected", config.domain());
            Ok(false)
        }
    }
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
