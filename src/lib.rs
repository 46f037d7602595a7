pub mod api;
pub mod config;
pub mod db;
pub mod departments;
pub mod models;
pub mod pipeline;
pub mod retrieval;

mod log_audit;

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use crate::api::ApiContext;
use crate::config::AppConfig;
use crate::pipeline::llm::AzureOpenAiClient;
use crate::pipeline::redaction::PatternRedactor;
use crate::pipeline::{AdmissionProcessor, SqliteLetterStore};

/// Load configuration, open the store and serve the API until Ctrl-C.
pub fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = Arc::new(AppConfig::from_env().context("invalid configuration")?);
    tracing::info!(
        environment = %config.environment,
        deployment = %config.llm.deployment,
        db_path = %config.db_path.display(),
        departments = ?config.departments.codes(),
        "Configuration loaded"
    );

    let store = Arc::new(
        SqliteLetterStore::open(&config.db_path)
            .with_context(|| format!("cannot open letter database at {}", config.db_path.display()))?,
    );
    let redactor = Arc::new(
        PatternRedactor::new(&config.pipeline.redact_names, &config.pipeline.redact_locations)
            .context("invalid redaction term list")?,
    );
    // Built before the runtime: the blocking client may not be created or
    // dropped on an async worker thread.
    let client = Arc::new(AzureOpenAiClient::new(&config.llm).context("cannot build model client")?);
    let processor = Arc::new(AdmissionProcessor::new(
        config.clone(),
        redactor,
        client.clone(),
        store.clone(),
    ));
    let ctx = ApiContext::new(config.clone(), processor, store);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("cannot start async runtime")?;
    let served = runtime.block_on(api::serve_until_ctrl_c(ctx, &config.bind_addr));
    drop(runtime);
    drop(client);

    served.with_context(|| format!("API server on {} failed", config.bind_addr))?;
    tracing::info!("{} stopped", config::APP_NAME);
    Ok(())
}
