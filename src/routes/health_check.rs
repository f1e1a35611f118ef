use actix_web::HttpResponse;

/// Liveness check. It never touches the store or the email provider.
#[tracing::instrument(name = "Health check")]
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().finish()
}
