use axum::{
    extract::State,
    routing::get,
    Router,
    Json,
    http::Method,
};
use std::sync::Arc;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::TraceLayer;

use crate::{
    AppState,
    error::AppError,
    models::{AnalysisDescription, AnalyzeRequest, AnalyzeResponse},
    services::summary::{run_analysis, AnalysisKind},
};

pub fn routes() -> Router<Arc<AppState>> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/analyses", get(list_analyses).post(analyze_workbook))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn list_analyses() -> Json<Vec<AnalysisDescription>> {
    Json(AnalysisKind::ALL.iter().copied().map(AnalysisDescription::for_kind).collect())
}

pub async fn analyze_workbook(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let start = std::time::Instant::now();
    tracing::info!(
        "Received {} request for {}",
        request.analysis.display_name(),
        request.input_path.display()
    );

    let metadata = tokio::fs::metadata(&request.input_path).await.map_err(|e| {
        tracing::error!("Cannot stat {}: {}", request.input_path.display(), e);
        AppError::NotFound(format!("{}: {}", request.input_path.display(), e))
    })?;

    if metadata.len() > state.config.max_file_size {
        return Err(AppError::InvalidInput(format!(
            "File is {} bytes, limit is {} bytes",
            metadata.len(),
            state.config.max_file_size
        )));
    }

    let kind = request.analysis;
    let path = request.input_path;
    let outcome = tokio::task::spawn_blocking(move || run_analysis(kind, &path))
        .await
        .map_err(|e| AppError::Internal(format!("Analysis task failed: {}", e)))??;

    tracing::info!("Request completed in {:?}", start.elapsed());
    Ok(Json(AnalyzeResponse::new(kind, outcome)))
}
