use anyhow::Result;
use axum::Router;
use clap::Parser;
use searchindex::Language;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};
use server::{build_app, ServerConfig};
use tokio::net::TcpListener;

#[derive(Parser)]
struct Args {
    /// searchindex.js file or compiled snapshot directory
    #[arg(long, default_value = "./searchindex.js")]
    index: String,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Search language the index was built with
    #[arg(long, default_value_t = Language::English)]
    language: Language,
    /// Directory of page sources (`<filename>.txt`) for result snippets
    #[arg(long)]
    sources: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let config = ServerConfig { index: args.index, language: args.language, sources: args.sources };
    let app: Router = build_app(config)?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
