//! imagetools - generate, cache and serve image variants.
//!
//! `serve` runs the dev server; `build` processes image ids, emits the
//! variants into an output directory, prints the resulting modules and
//! sweeps the cache.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use imagetools::{
    config::{BuildConfig, Cli, Command, ServeConfig},
    server::{create_router, RouterConfig},
    FsEmitter, ImageTools,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Build(config) => run_build(config).await,
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.pipeline.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let tools = match ImageTools::new(config.to_plugin_config()) {
        Ok(tools) => Arc::new(tools),
        Err(e) => {
            error!("Failed to start: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Configuration:");
    info!("  Root: {}", config.pipeline.root.display());
    if config.pipeline.no_cache {
        warn!("  Cache: DISABLED - variants are kept in memory only");
    } else {
        info!("  Cache: {}", config.pipeline.cache_dir.display());
    }
    info!("  Variant route: {}", tools.base_path());

    let router = create_router(tools, build_router_config(&config));

    let addr = config.bind_address();
    info!("");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!("    curl 'http://{}/@load/<image>?w=400;800&format=webp'", addr);
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Build RouterConfig from the ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new().with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}

// =============================================================================
// Build Command
// =============================================================================

async fn run_build(config: BuildConfig) -> ExitCode {
    init_logging(config.pipeline.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let emitter = Arc::new(FsEmitter::new(&config.out_dir));
    let tools = match ImageTools::new(config.to_plugin_config()) {
        Ok(tools) => tools.with_emitter(emitter.clone()),
        Err(e) => {
            error!("Failed to start: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let public_base = config.public_base();
    let mut failed = false;

    for id in &config.requests {
        match tools.load(id).await {
            Ok(Some(code)) => {
                let code = emitter.resolve_tokens(&code, &public_base).await;
                println!("// {}", id);
                println!("{}", code);
            }
            Ok(None) => warn!("Skipping {}: not an image request", id),
            Err(e) => {
                error!("Failed to load {}: {}", id, e);
                failed = true;
            }
        }
    }

    if let Some(report) = tools.build_end(failed).await {
        info!(
            "Cache sweep: {} deleted, {} kept, {} failed",
            report.deleted, report.kept, report.failed
        );
    }

    let files = emitter.files().await;
    info!(
        "Emitted {} file(s) to {}",
        files.len(),
        emitter.out_dir().display()
    );

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "imagetools=debug,tower_http=debug"
    } else {
        "imagetools=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
