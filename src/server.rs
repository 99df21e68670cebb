//! JSON API over the analytics pipeline.

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{web, App, HttpResponse, HttpServer, ResponseError};
use serde::{Deserialize, Serialize};

use crate::data::Tables;
use crate::enhancer::{enhance_or_fallback, EnhancedInsight, InsightEnhancer};
use crate::error::AnalyticsError;
use crate::pipeline::{Pipeline, PipelineOutput, StudentGuidance};

pub struct AppState {
    pub tables: Tables,
    pub pipeline: Pipeline,
    pub enhancer: Option<Arc<dyn InsightEnhancer>>,
}

#[derive(Deserialize)]
struct GuidanceQuery {
    #[serde(default)]
    enhance: bool,
}

#[derive(Serialize)]
struct GuidanceResponse {
    #[serde(flatten)]
    guidance: StudentGuidance,
    #[serde(skip_serializing_if = "Option::is_none")]
    enhanced: Option<EnhancedInsight>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ResponseError for AnalyticsError {
    fn status_code(&self) -> StatusCode {
        match self {
            AnalyticsError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.to_string(),
        })
    }
}

/// Runs the pipeline on the blocking pool; the first run trains the forest.
async fn run_pipeline(state: &web::Data<AppState>) -> Result<PipelineOutput, AnalyticsError> {
    let state = state.clone();
    web::block(move || state.pipeline.run(&state.tables))
        .await
        .map_err(|e| AnalyticsError::ServiceUnavailable(e.to_string()))?
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().body("Student Success API is running!")
}

async fn list_students(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(&state.tables.students)
}

async fn risk_overview(state: web::Data<AppState>) -> Result<HttpResponse, AnalyticsError> {
    let output = run_pipeline(&state).await?;
    Ok(HttpResponse::Ok().json(output.risk))
}

async fn model_info(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.pipeline.classifier().info())
}

async fn student_guidance(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<GuidanceQuery>,
) -> Result<HttpResponse, AnalyticsError> {
    let student_id = path.into_inner();
    let known = state.tables.student(&student_id).is_some()
        || state.tables.performance.iter().any(|p| p.student_id == student_id);
    if !known {
        return Ok(HttpResponse::NotFound().json(ErrorBody {
            error: format!("unknown student {student_id}"),
        }));
    }

    let output = run_pipeline(&state).await?;
    let guidance = state.pipeline.guidance(&state.tables, &output, &student_id);

    let enhanced = match (query.enhance, state.enhancer.clone()) {
        (true, Some(enhancer)) => {
            let report = guidance.report.clone();
            let fallback = report.clone();
            let result = web::block(move || enhance_or_fallback(enhancer.as_ref(), &report)).await;
            Some(result.unwrap_or_else(|e| {
                tracing::warn!(error = %e, "enhancement task failed, using local insight");
                EnhancedInsight {
                    text: fallback,
                    enhanced: false,
                }
            }))
        }
        (true, None) => Some(EnhancedInsight {
            text: guidance.report.clone(),
            enhanced: false,
        }),
        (false, _) => None,
    };

    Ok(HttpResponse::Ok().json(GuidanceResponse { guidance, enhanced }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/students", web::get().to(list_students))
        .route("/students/{id}/guidance", web::get().to(student_guidance))
        .route("/risk", web::get().to(risk_overview))
        .route("/model/info", web::get().to(model_info));
}

pub async fn start_api(state: web::Data<AppState>, bind: &str) -> std::io::Result<()> {
    tracing::info!("starting Student Success API on http://{bind}");
    HttpServer::new(move || App::new().app_data(state.clone()).configure(configure))
        .bind(bind)?
        .run()
        .await
}
