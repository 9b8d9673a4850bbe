use crate::application::{PostService, UserService};
use crate::data::Database;
use crate::domain::DomainError;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::obo::OnBehalfOfClient;
use crate::infrastructure::oidc::TokenValidator;
use crate::presentation::http_handlers::{self, error_to_response};
use crate::presentation::middleware::bearer_validator;
use actix_web::body::{BodySize, MessageBody};
use actix_web::dev::ServiceResponse;
use actix_web::error::InternalError;
use actix_web::http::{header, StatusCode};
use actix_web::middleware::{ErrorHandlerResponse, ErrorHandlers};
use actix_web::web;
use actix_web_httpauth::middleware::HttpAuthentication;
use std::fmt::Display;
use std::sync::Arc;

/// Everything the handlers need, cloned into each worker.
#[derive(Clone)]
pub struct AppState {
    pub config: web::Data<AppConfig>,
    pub db: Arc<dyn Database>,
    pub user_service: Arc<UserService>,
    pub post_service: Arc<PostService>,
    pub token_validator: Arc<TokenValidator>,
    pub obo_client: Arc<OnBehalfOfClient>,
}

fn bad_request(err: impl Display) -> actix_web::Error {
    let message = err.to_string();
    let response = error_to_response(DomainError::ValidationError(message.clone()));
    InternalError::from_response(message, response).into()
}

/// A request without credentials is answered with an empty 401; give it the
/// same `{"error": ...}` body as every other rejection.
fn fill_unauthorized<B: MessageBody>(
    res: ServiceResponse<B>,
) -> actix_web::Result<ErrorHandlerResponse<B>> {
    if !matches!(res.response().body().size(), BodySize::None | BodySize::Sized(0)) {
        return Ok(ErrorHandlerResponse::Response(res.map_into_left_body()));
    }

    let challenge = res.headers().get(header::WWW_AUTHENTICATE).cloned();
    let (req, _) = res.into_parts();
    let mut response =
        error_to_response(DomainError::Unauthorized("Missing bearer token".to_string()));
    if let Some(challenge) = challenge {
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, challenge);
    }

    Ok(ErrorHandlerResponse::Response(
        ServiceResponse::new(req, response).map_into_right_body(),
    ))
}

pub fn configure(state: AppState) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg: &mut web::ServiceConfig| {
        let auth = HttpAuthentication::bearer(bearer_validator);
        let prefix = state.config.api_prefix.clone();

        cfg.app_data(state.config.clone())
            .app_data(web::Data::new(state.db))
            .app_data(web::Data::new(state.user_service))
            .app_data(web::Data::new(state.post_service))
            .app_data(web::Data::new(state.token_validator))
            .app_data(web::Data::new(state.obo_client))
            .app_data(web::JsonConfig::default().error_handler(|err, _req| bad_request(err)))
            .app_data(web::QueryConfig::default().error_handler(|err, _req| bad_request(err)))
            .app_data(web::PathConfig::default().error_handler(|err, _req| bad_request(err)))
            .service(
                web::scope(&prefix)
                    .wrap(ErrorHandlers::new().handler(StatusCode::UNAUTHORIZED, fill_unauthorized))
                    // Public endpoints
                    .route("/health", web::get().to(http_handlers::health))
                    .route("/hello/{name}", web::get().to(http_handlers::say_hello))
                    // Protected endpoints
                    .service(
                        web::resource("/")
                            .wrap(auth.clone())
                            .route(web::get().to(http_handlers::root)),
                    )
                    .service(
                        web::resource("/hello")
                            .wrap(auth.clone())
                            .route(web::get().to(http_handlers::hello)),
                    )
                    .service(
                        web::resource("/hello-graph")
                            .wrap(auth.clone())
                            .route(web::get().to(http_handlers::hello_graph)),
                    )
                    .service(
                        web::scope("/users")
                            .wrap(auth.clone())
                            .route("", web::get().to(http_handlers::list_users))
                            .route("", web::post().to(http_handlers::create_user))
                            .route(
                                "/email/{email}",
                                web::get().to(http_handlers::get_user_by_email),
                            )
                            .route("/{id}", web::get().to(http_handlers::get_user))
                            .route("/{id}", web::put().to(http_handlers::update_user))
                            .route("/{id}", web::delete().to(http_handlers::delete_user)),
                    )
                    .service(
                        web::scope("/posts")
                            .wrap(auth)
                            .route("", web::get().to(http_handlers::list_posts))
                            .route("", web::post().to(http_handlers::create_post))
                            .route("/{id}", web::get().to(http_handlers::get_post))
                            .route("/{id}", web::put().to(http_handlers::update_post))
                            .route("/{id}", web::delete().to(http_handlers::delete_post)),
                    ),
            );
    }
}
