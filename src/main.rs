mod app;
mod completion;
mod config;
mod embedding;
mod error;
mod models;
mod parser;
mod rag;
mod routes;
mod sql;
mod storage;
mod vector_store;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use app::AppState;
use completion::openai::OpenAICompletionModel;
use config::{load_settings_from_path, Settings, DEFAULT_CONFIG_PATH};
use embedding::openai::OpenAIEmbeddingModel;
use embedding::EmbeddingModel;
use parser::DocumentParser;
use rag::RagService;
use sql::approval::ApprovalStore;
use sql::executor::PostgresExecutor;
use sql::generator::LlmSqlGenerator;
use sql::training::{golden_examples, ECOMMERCE_DOCUMENTATION};
use storage::local::LocalStorage;
use vector_store::pinecone::PineconeStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting ragsql server...");

    // Load configuration.
    let config_path =
        std::env::var("RAGSQL_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let settings = load_settings_from_path(&config_path)?;
    info!(
        "Configuration loaded from {config_path}: environment={}, host={}, port={}",
        settings.environment, settings.host, settings.port
    );

    // Initialize storage.
    let storage: Arc<dyn storage::Storage> = Arc::new(LocalStorage::new(&settings.upload_dir));
    info!(
        "Storage initialized: {} ({})",
        storage.provider_name(),
        settings.upload_dir
    );

    let rag = if settings.rag_enabled() {
        match init_rag(&settings).await {
            Ok(service) => {
                info!("Document RAG services initialized");
                Some(Arc::new(service))
            }
            Err(e) => {
                warn!("Failed to initialize RAG services: {e:#}. Document RAG features will be unavailable.");
                None
            }
        }
    } else {
        warn!("OpenAI/Pinecone API keys not configured. Document RAG features will be unavailable.");
        None
    };

    let sql = if settings.sql_enabled() {
        match init_sql(&settings).await {
            Ok(store) => {
                info!("Text-to-SQL service initialized and trained");
                Some(Arc::new(store))
            }
            Err(e) => {
                warn!("Failed to initialize SQL service: {e:#}. Text-to-SQL features will be unavailable.");
                None
            }
        }
    } else {
        warn!("DATABASE_URL or OPENAI_API_KEY not configured. Text-to-SQL features will be unavailable.");
        None
    };

    // Build application state.
    let state = Arc::new(AppState {
        settings: settings.clone(),
        storage,
        rag,
        sql,
    });

    // Build router.
    let app = routes::build_router(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    // Start server.
    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port).parse()?;
    info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn openai_key(settings: &Settings) -> anyhow::Result<&str> {
    settings
        .openai_api_key
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY is not set"))
}

async fn init_rag(settings: &Settings) -> anyhow::Result<RagService> {
    let openai_api_key = openai_key(settings)?;
    let pinecone_api_key = settings
        .pinecone_api_key
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("PINECONE_API_KEY is not set"))?;

    let embedding_model = Arc::new(OpenAIEmbeddingModel::new(
        &settings.embedding_model,
        openai_api_key,
        &settings.openai_base_url,
        settings.vector_dimensions,
        settings.embedding_batch_size,
    ));
    info!("Embedding model initialized: {}", settings.embedding_model);

    let vector_store = match &settings.index_host {
        Some(host) => PineconeStore::new(pinecone_api_key, host),
        None => {
            let (store, description) = PineconeStore::connect(
                pinecone_api_key,
                &settings.index_name,
                &settings.pinecone_control_plane_url,
            )
            .await?;
            if description.dimension != embedding_model.dimensions() {
                anyhow::bail!(
                    "Pinecone index {} has dimension {}, embedding model produces {}",
                    description.name,
                    description.dimension,
                    embedding_model.dimensions()
                );
            }
            store
        }
    };
    info!("Vector store initialized: pinecone/{}", settings.index_name);

    let completion_model = Arc::new(OpenAICompletionModel::new(
        &settings.completion_model,
        openai_api_key,
        &settings.openai_base_url,
        settings.default_max_tokens,
        settings.default_temperature,
    ));
    info!("Completion model initialized: {}", settings.completion_model);

    let parser = DocumentParser::new(
        settings.parser_api_endpoints.clone(),
        settings.chunk_size,
        settings.chunk_overlap,
    );
    info!(
        "Parser initialized (mode={})",
        if settings.parser_api_endpoints.is_empty() { "local" } else { "api" }
    );

    Ok(RagService::new(
        parser,
        embedding_model,
        Arc::new(vector_store),
        completion_model,
    ))
}

async fn init_sql(settings: &Settings) -> anyhow::Result<ApprovalStore> {
    let openai_api_key = openai_key(settings)?;
    let database_url = settings
        .database_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is not set"))?;

    let executor = Arc::new(PostgresExecutor::new(database_url, settings.sql_pool_size).await?);
    info!("SQL executor connected");

    // Temperature 0 for SQL generation.
    let completion_model = Arc::new(OpenAICompletionModel::new(
        &settings.sql_model,
        openai_api_key,
        &settings.openai_base_url,
        settings.default_max_tokens,
        0.0,
    ));
    let generator = Arc::new(LlmSqlGenerator::new(
        completion_model,
        settings.max_training_examples,
    ));

    info!("Training SQL generator on database schema and examples...");
    generator
        .complete_training(executor.as_ref(), ECOMMERCE_DOCUMENTATION, golden_examples())
        .await;

    Ok(ApprovalStore::new(
        generator,
        executor,
        Duration::from_secs(settings.sql_timeout_secs),
    ))
}
