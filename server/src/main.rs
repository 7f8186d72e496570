use anyhow::Result;
use axum::Router;
use clap::Parser;
use routecache::{CacheFormat, RouteCacheConfig};
use routecache_server::{build_app, AppOptions};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// JSON file with route cache settings
    #[arg(long)]
    config: Option<PathBuf>,
    /// JSON site file (domains, cultures, content nodes)
    #[arg(long, default_value = "./site.json")]
    site: PathBuf,
    /// Route cache file (overrides the config file)
    #[arg(long)]
    cache: Option<PathBuf>,
    /// Cache file format: json or bincode
    #[arg(long)]
    format: Option<CacheFormat>,
    /// Strip a leading xx-xx culture segment from request paths
    #[arg(long, default_value_t = false)]
    culture_in_path: bool,
    /// Strip unknown culture segments instead of answering 404
    #[arg(long, default_value_t = false)]
    allow_unknown_culture: bool,
    /// Match stored routes by containment (legacy sites)
    #[arg(long, default_value_t = false)]
    compat: bool,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

fn load_config(args: &Args) -> Result<RouteCacheConfig> {
    let mut config = match &args.config {
        Some(path) => RouteCacheConfig::load(path)?,
        None => RouteCacheConfig::default(),
    };
    if let Some(cache) = &args.cache {
        config.cache_file = cache.clone();
    }
    if let Some(format) = args.format {
        config.format = format;
    }
    config.culture_in_path |= args.culture_in_path;
    config.compatibility_match |= args.compat;
    if args.allow_unknown_culture {
        config.culture_404 = false;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let config = load_config(&args)?;
    tracing::info!(cache = %config.cache_file.display(), site = %args.site.display(), "starting route cache server");

    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    let app: Router = build_app(AppOptions { config, site_file: args.site.clone(), admin_token })?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
