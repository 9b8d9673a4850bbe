use crate::domain::DomainError;
use crate::infrastructure::oidc::TokenValidator;
use crate::presentation::http_handlers::error_to_response;
use actix_web::error::InternalError;
use actix_web::{dev::ServiceRequest, web, Error, HttpMessage};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use std::sync::Arc;

/// Validates the bearer token and attaches the resulting `Principal` to the request.
pub async fn bearer_validator(
    req: ServiceRequest,
    credentials: BearerAuth,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    let validator = match req.app_data::<web::Data<Arc<TokenValidator>>>() {
        Some(validator) => validator.get_ref().clone(),
        None => {
            let err = DomainError::InternalError("Token validator not configured".to_string());
            return Err((rejection(err), req));
        }
    };

    // Проверяем токен и сохраняем Principal в extensions запроса
    match validator.validate(credentials.token()).await {
        Ok(principal) => {
            req.extensions_mut().insert(principal);
            Ok(req)
        }
        Err(err) => {
            tracing::warn!("Rejected token on {} {}: {}", req.method(), req.path(), err);
            Err((rejection(err), req))
        }
    }
}

fn rejection(err: DomainError) -> Error {
    let message = err.to_string();
    InternalError::from_response(message, error_to_response(err)).into()
}
