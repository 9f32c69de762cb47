use std::{process, sync::Arc};

use fragcache::{
    cache::{CacheConfig, Dependency, MemoryStore, RenderCache},
    config,
    error::AppError,
    infra::telemetry,
    render::{MarkupGenerator, RenderTree, Renderer},
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging)?;

    match cli_args.command {
        config::Command::Render(args) => run_render(settings, args).await,
    }
}

async fn run_render(settings: config::Settings, args: config::RenderArgs) -> Result<(), AppError> {
    let source = tokio::fs::read_to_string(&args.tree)
        .await
        .map_err(fragcache::infra::error::InfraError::from)?;
    let tree = RenderTree::from_toml(&source).map_err(|err| AppError::tree(&args.tree, err))?;

    let cache_config = CacheConfig::from(&settings.cache);
    let store = Arc::new(MemoryStore::new(&cache_config));
    let cache = RenderCache::new(store.clone(), cache_config);
    let renderer = Renderer::new(cache, MarkupGenerator);

    info!(
        target = "fragcache::render",
        tree = %args.tree.display(),
        passes = args.passes.get(),
        enabled = settings.cache.enabled,
        diagnostic = settings.cache.diagnostic_mode,
        "Starting render"
    );

    for pass in 1..=args.passes.get() {
        let report = renderer.render_with_report(&tree.root).await?;
        info!(
            target = "fragcache::render",
            pass,
            hits = report.stats.hits,
            misses = report.stats.misses,
            unavailable = report.stats.unavailable,
            writes = report.stats.writes,
            write_failures = report.stats.write_failures,
            "pass complete"
        );
        println!("{}", report.output);

        if pass == 1 {
            for dependency in &args.invalidate {
                let dropped = store.invalidate_dependency(&Dependency::new(dependency.as_str()));
                info!(
                    target = "fragcache::render",
                    dependency = dependency.as_str(),
                    dropped,
                    "invalidated dependency"
                );
            }
        }
    }

    Ok(())
}
