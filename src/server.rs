use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::feedback::{self, FeedbackStore};
use crate::model::{round2, Pipeline};
use crate::types::{
    FeatureRecord, FeedbackRecord, FeedbackSubmission, PredictionOut, TimeOfDay, TrafficLevel,
    VehicleType, Weather, ACTUAL_TIME_MAX, ACTUAL_TIME_MIN, DISTANCE_KM_DEFAULT, DISTANCE_KM_MAX,
    DISTANCE_KM_MIN, DISTANCE_KM_STEP, EXPERIENCE_YRS_DEFAULT, EXPERIENCE_YRS_MAX,
    EXPERIENCE_YRS_MIN, EXPERIENCE_YRS_STEP, PREP_TIME_DEFAULT, PREP_TIME_MAX, PREP_TIME_MIN,
    RATING_MAX, RATING_MIN,
};

// ---------- Server state ----------

// The pipeline is loaded once at startup; None means load failed and
// prediction requests are rejected while everything else keeps working.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Option<Arc<Pipeline>>,
    pub store: Arc<FeedbackStore>,
    pub logo_path: Arc<PathBuf>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(info))
        .route("/schema", get(schema))
        .route("/predict", post(predict))
        .route("/feedback", post(submit_feedback).get(feedback_table))
        .route("/feedback/export", get(export_feedback))
        .route("/logo", get(logo))
        .with_state(state)
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, msg: impl ToString) -> ApiError {
    (status, Json(json!({ "error": msg.to_string() })))
}

// ---------- Handlers ----------

async fn info(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "service": "Prediksi Waktu Pengantaran Makanan",
        "model": "linear_regression",
        "pipeline_loaded": state.pipeline.is_some(),
        "caption": "Aplikasi Prediksi Waktu Pengantaran Makanan (Regresi Linear)",
    }))
}

// Declared input domains, so a client can render the same form the
// original presented (min/max/step/default per numeric input, fixed
// options per selector).
async fn schema() -> Json<serde_json::Value> {
    Json(json!({
        "numeric": {
            "Distance_km": {
                "min": DISTANCE_KM_MIN, "max": DISTANCE_KM_MAX,
                "step": DISTANCE_KM_STEP, "default": DISTANCE_KM_DEFAULT,
            },
            "Preparation_Time_min": {
                "min": PREP_TIME_MIN, "max": PREP_TIME_MAX,
                "step": 1, "default": PREP_TIME_DEFAULT,
            },
            "Courier_Experience_yrs": {
                "min": EXPERIENCE_YRS_MIN, "max": EXPERIENCE_YRS_MAX,
                "step": EXPERIENCE_YRS_STEP, "default": EXPERIENCE_YRS_DEFAULT,
            },
        },
        "categorical": {
            "Weather": Weather::ALL.iter().map(Weather::as_str).collect::<Vec<_>>(),
            "Traffic_Level": TrafficLevel::ALL.iter().map(TrafficLevel::as_str).collect::<Vec<_>>(),
            "Time_of_Day": TimeOfDay::ALL.iter().map(TimeOfDay::as_str).collect::<Vec<_>>(),
            "Vehicle_Type": VehicleType::ALL.iter().map(VehicleType::as_str).collect::<Vec<_>>(),
        },
        "feedback": {
            "Actual_Time_min": { "min": ACTUAL_TIME_MIN, "max": ACTUAL_TIME_MAX },
            "Rating_Kurir": { "min": RATING_MIN, "max": RATING_MAX },
        },
    }))
}

async fn predict(
    State(state): State<AppState>,
    Json(features): Json<FeatureRecord>,
) -> Result<Json<PredictionOut>, ApiError> {
    features
        .validate()
        .map_err(|e| api_error(StatusCode::UNPROCESSABLE_ENTITY, e))?;

    let pipeline = state.pipeline.as_ref().ok_or_else(|| {
        api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "model unavailable: pipeline was not loaded",
        )
    })?;

    let predicted_time_min = pipeline
        .predict(&features)
        .map_err(|e| api_error(StatusCode::UNPROCESSABLE_ENTITY, e))?;

    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64;
    Ok(Json(PredictionOut {
        predicted_time_min,
        ts_ms: now_ms,
    }))
}

async fn submit_feedback(
    State(state): State<AppState>,
    Json(submission): Json<FeedbackSubmission>,
) -> Result<Json<FeedbackRecord>, ApiError> {
    // Reject out-of-domain values before the store is touched.
    submission
        .validate()
        .map_err(|e| api_error(StatusCode::UNPROCESSABLE_ENTITY, e))?;

    let record = FeedbackRecord {
        timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        predicted_time_min: round2(submission.predicted_time_min),
        actual_time_min: submission.actual_time_min,
        rating_kurir: submission.rating_kurir,
        komentar: submission.komentar,
        features: submission.features,
    };

    state
        .store
        .append(record.clone())
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e))?;

    Ok(Json(record))
}

async fn feedback_table(
    State(state): State<AppState>,
) -> Result<Json<Vec<FeedbackRecord>>, ApiError> {
    let rows = state
        .store
        .load_all()
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e))?;
    Ok(Json(rows))
}

async fn export_feedback(State(state): State<AppState>) -> Result<Response, ApiError> {
    let rows = state
        .store
        .load_all()
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e))?;
    let bytes = feedback::export_bytes(&rows)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e))?;

    let headers = [
        (header::CONTENT_TYPE, feedback::EXPORT_MIME.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", feedback::EXPORT_FILENAME),
        ),
    ];
    Ok((headers, bytes).into_response())
}

async fn logo(State(state): State<AppState>) -> Result<Response, ApiError> {
    let bytes = tokio::fs::read(state.logo_path.as_ref())
        .await
        .map_err(|_| api_error(StatusCode::NOT_FOUND, "logo asset not available"))?;

    let mime = match state.logo_path.extension().and_then(|e| e.to_str()) {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        _ => "image/png",
    };
    Ok(([(header::CONTENT_TYPE, mime)], bytes).into_response())
}
