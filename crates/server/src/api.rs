//! HTTP API for predictions, model information, health checks and metrics

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use iris_core::{
    predictor::OutputFormatter, FeatureName, InferencePipeline, IrisError, ModelMetadata,
    Prediction, Species, StructuredLogger,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<InferencePipeline>,
    pub metadata: ModelMetadata,
    pub logger: StructuredLogger,
    started_at: i64,
}

impl AppState {
    pub fn new(
        pipeline: Arc<InferencePipeline>,
        metadata: ModelMetadata,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            pipeline,
            metadata,
            logger,
            started_at: chrono::Utc::now().timestamp(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub instances: Vec<Vec<f64>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub predictions: Vec<PredictionBody>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassProbability {
    pub species: Species,
    pub probability: f64,
}

/// One prediction as returned over HTTP
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionBody {
    pub species: Species,
    pub class_index: usize,
    pub probabilities: Vec<ClassProbability>,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub out_of_range: Vec<FeatureName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub model_version: String,
}

impl PredictionBody {
    fn from_prediction(prediction: &Prediction, formatter: &OutputFormatter) -> Self {
        Self {
            species: prediction.species,
            class_index: prediction.species.index(),
            probabilities: Species::ALL
                .iter()
                .map(|&species| ClassProbability {
                    species,
                    probability: prediction.probabilities.get(species),
                })
                .collect(),
            confidence: prediction.confidence,
            out_of_range: prediction.out_of_range.clone(),
            warning: formatter.low_confidence_reason(prediction),
            model_version: prediction.model_version.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeatureWeight {
    pub feature: FeatureName,
    pub importance: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelInfo {
    pub version: String,
    pub trained_at: i64,
    pub n_samples: usize,
    pub training_accuracy: f64,
    pub n_estimators: usize,
    pub seed: u64,
    pub feature_names: Vec<String>,
    pub class_names: Vec<String>,
    /// Sorted by descending importance
    pub feature_importance: Vec<FeatureWeight>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_version: String,
    pub uptime_secs: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: String,
}

/// Error response carrying a status code and a machine-readable kind
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    fn invalid_input(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "invalid_input",
            message: message.into(),
        }
    }
}

impl From<IrisError> for ApiError {
    fn from(e: IrisError) -> Self {
        let status = match e {
            IrisError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::invalid_input(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
            kind: self.kind.to_string(),
        };
        (self.status, Json(body)).into_response()
    }
}

async fn predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let request = payload
        .map(|Json(request)| request)
        .map_err(ApiError::from)
        .inspect_err(|e| state.logger.log_invalid_input(&e.message))?;

    if request.instances.is_empty() {
        let e = ApiError::invalid_input("instances must not be empty");
        state.logger.log_invalid_input(&e.message);
        return Err(e);
    }

    let predictions = state
        .pipeline
        .predict_batch(&request.instances)
        .inspect_err(|e| state.logger.log_invalid_input(&e.to_string()))?;

    let formatter = state.pipeline.output_formatter();
    let body = predictions
        .iter()
        .inspect(|p| state.logger.log_prediction(p))
        .map(|p| PredictionBody::from_prediction(p, formatter))
        .collect();

    Ok(Json(PredictResponse { predictions: body }))
}

async fn model_info(State(state): State<Arc<AppState>>) -> Json<ModelInfo> {
    let metadata = &state.metadata;
    let feature_importance = state
        .pipeline
        .feature_importance()
        .ranked()
        .into_iter()
        .map(|(feature, importance)| FeatureWeight { feature, importance })
        .collect();

    Json(ModelInfo {
        version: metadata.version.clone(),
        trained_at: metadata.trained_at,
        n_samples: metadata.n_samples,
        training_accuracy: metadata.training_accuracy,
        n_estimators: metadata.config.n_estimators,
        seed: metadata.config.seed,
        feature_names: metadata.feature_names.clone(),
        class_names: metadata.class_names.clone(),
        feature_importance,
    })
}

/// Liveness; the model is loaded before the router exists, so always healthy
async fn healthz(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        model_version: state.pipeline.model_version().to_string(),
        uptime_secs: chrono::Utc::now().timestamp() - state.started_at,
    })
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "ready": true,
            "model_version": state.pipeline.model_version(),
        })),
    )
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/predict", post(predict))
        .route("/v1/model", get(model_info))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server, returning once `shutdown` resolves
pub async fn serve(
    addr: &str,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
