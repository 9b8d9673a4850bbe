use crate::application::{PostService, UserService};
use crate::data::{complete, Database};
use crate::domain::post::{CreatePostRequest, UpdatePostRequest};
use crate::domain::user::{CreateUserRequest, UpdateUserRequest};
use crate::domain::{DomainError, PageRequest};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::obo::{GraphEnrichment, OnBehalfOfClient};
use crate::infrastructure::oidc::Principal;
use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;

type Db = web::Data<Arc<dyn Database>>;

// Структура для пагинации
#[derive(Deserialize)]
pub struct PaginationQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

// Посты всегда запрашиваются по автору
#[derive(Deserialize)]
pub struct PostsQuery {
    pub author_id: i64,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

// Структура для ответа /health
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    environment: String,
    database: DatabaseHealth,
}

#[derive(Serialize)]
struct DatabaseHealth {
    status: &'static str,
    connection: String,
}

#[derive(Serialize)]
struct GraphHelloResponse<'a> {
    claims: &'a Map<String, Value>,
    graph: GraphEnrichment,
}

/// Maps a domain failure onto the `{"error": ...}` body used by every endpoint.
pub fn error_to_response(err: DomainError) -> HttpResponse {
    let status_code = err.to_status_code();
    let message = err.to_string();

    match status_code {
        400 => HttpResponse::BadRequest().json(json!({ "error": message })),
        401 => HttpResponse::Unauthorized().json(json!({ "error": message })),
        404 => HttpResponse::NotFound().json(json!({ "error": message })),
        409 => HttpResponse::Conflict().json(json!({ "error": message })),
        502 => HttpResponse::BadGateway().json(json!({ "error": message })),
        _ => {
            tracing::error!("Request failed: {}", message);
            HttpResponse::InternalServerError().json(json!({ "error": "Internal server error" }))
        }
    }
}

// ============== Service Handlers ==============

pub async fn health(db: Db, config: web::Data<AppConfig>) -> impl Responder {
    let connection = config.database.masked_url();
    let environment = config.environment.to_string();

    match db.ping().await {
        Ok(()) => HttpResponse::Ok().json(HealthResponse {
            status: "UP",
            environment,
            database: DatabaseHealth {
                status: "UP",
                connection,
            },
        }),
        Err(err) => {
            tracing::error!("Health check failed: {}", err);
            HttpResponse::ServiceUnavailable().json(HealthResponse {
                status: "DOWN",
                environment,
                database: DatabaseHealth {
                    status: "DOWN",
                    connection,
                },
            })
        }
    }
}

pub async fn say_hello(path: web::Path<String>) -> impl Responder {
    let name = path.into_inner();
    HttpResponse::Ok().json(json!({ "message": format!("Hello {}", name) }))
}

pub async fn root() -> impl Responder {
    HttpResponse::Ok().json(json!({ "message": "Hello World" }))
}

pub async fn hello(principal: web::ReqData<Principal>) -> impl Responder {
    HttpResponse::Ok().json(json!({ "hello": "world", "user": &*principal }))
}

pub async fn hello_graph(
    principal: web::ReqData<Principal>,
    obo: web::Data<Arc<OnBehalfOfClient>>,
) -> impl Responder {
    let graph = obo.enrich(&principal).await;
    HttpResponse::Ok().json(GraphHelloResponse {
        claims: &principal.claims,
        graph,
    })
}

// ============== User Handlers ==============

pub async fn list_users(
    db: Db,
    user_service: web::Data<Arc<UserService>>,
    query: web::Query<PaginationQuery>,
) -> impl Responder {
    let page = PageRequest::new(query.skip, query.limit);

    tracing::info!("Listing users with skip={}, limit={}", page.skip, page.limit);

    let mut uow = match db.begin().await {
        Ok(uow) => uow,
        Err(err) => return error_to_response(err),
    };
    let result = user_service.list_users(uow.as_mut(), page).await;

    match complete(uow, result).await {
        Ok(users) => HttpResponse::Ok().json(users),
        Err(err) => error_to_response(err),
    }
}

pub async fn create_user(
    db: Db,
    user_service: web::Data<Arc<UserService>>,
    user_data: web::Json<CreateUserRequest>,
) -> impl Responder {
    let mut uow = match db.begin().await {
        Ok(uow) => uow,
        Err(err) => return error_to_response(err),
    };
    let result = user_service
        .create_user(uow.as_mut(), user_data.into_inner())
        .await;

    match complete(uow, result).await {
        Ok(user) => HttpResponse::Created().json(user),
        Err(err) => error_to_response(err),
    }
}

pub async fn get_user(
    db: Db,
    user_service: web::Data<Arc<UserService>>,
    path: web::Path<i64>,
) -> impl Responder {
    let user_id = path.into_inner();

    tracing::info!("Getting user with id={}", user_id);

    let mut uow = match db.begin().await {
        Ok(uow) => uow,
        Err(err) => return error_to_response(err),
    };
    let result = user_service.get_user(uow.as_mut(), user_id).await;

    match complete(uow, result).await {
        Ok(user) => HttpResponse::Ok().json(user),
        Err(err) => error_to_response(err),
    }
}

pub async fn get_user_by_email(
    db: Db,
    user_service: web::Data<Arc<UserService>>,
    path: web::Path<String>,
) -> impl Responder {
    let email = path.into_inner();

    let mut uow = match db.begin().await {
        Ok(uow) => uow,
        Err(err) => return error_to_response(err),
    };
    let result = user_service.get_user_by_email(uow.as_mut(), &email).await;

    match complete(uow, result).await {
        Ok(user) => HttpResponse::Ok().json(user),
        Err(err) => error_to_response(err),
    }
}

pub async fn update_user(
    db: Db,
    user_service: web::Data<Arc<UserService>>,
    path: web::Path<i64>,
    user_data: web::Json<UpdateUserRequest>,
) -> impl Responder {
    let user_id = path.into_inner();

    let mut uow = match db.begin().await {
        Ok(uow) => uow,
        Err(err) => return error_to_response(err),
    };
    let result = user_service
        .update_user(uow.as_mut(), user_id, user_data.into_inner())
        .await;

    match complete(uow, result).await {
        Ok(user) => HttpResponse::Ok().json(user),
        Err(err) => error_to_response(err),
    }
}

pub async fn delete_user(
    db: Db,
    user_service: web::Data<Arc<UserService>>,
    path: web::Path<i64>,
) -> impl Responder {
    let user_id = path.into_inner();

    let mut uow = match db.begin().await {
        Ok(uow) => uow,
        Err(err) => return error_to_response(err),
    };
    let result = user_service.delete_user(uow.as_mut(), user_id).await;

    match complete(uow, result).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(err) => error_to_response(err),
    }
}

// ============== Post Handlers ==============

pub async fn list_posts(
    db: Db,
    post_service: web::Data<Arc<PostService>>,
    query: web::Query<PostsQuery>,
) -> impl Responder {
    let page = PageRequest::new(query.skip, query.limit);

    tracing::info!(
        "Listing posts of author {} with skip={}, limit={}",
        query.author_id,
        page.skip,
        page.limit
    );

    let mut uow = match db.begin().await {
        Ok(uow) => uow,
        Err(err) => return error_to_response(err),
    };
    let result = post_service
        .list_posts(uow.as_mut(), query.author_id, page)
        .await;

    match complete(uow, result).await {
        Ok(posts) => HttpResponse::Ok().json(posts),
        Err(err) => error_to_response(err),
    }
}

pub async fn create_post(
    db: Db,
    post_service: web::Data<Arc<PostService>>,
    post_data: web::Json<CreatePostRequest>,
) -> impl Responder {
    let mut uow = match db.begin().await {
        Ok(uow) => uow,
        Err(err) => return error_to_response(err),
    };
    let result = post_service
        .create_post(uow.as_mut(), post_data.into_inner())
        .await;

    match complete(uow, result).await {
        Ok(post) => HttpResponse::Created().json(post),
        Err(err) => error_to_response(err),
    }
}

pub async fn get_post(
    db: Db,
    post_service: web::Data<Arc<PostService>>,
    path: web::Path<i64>,
) -> impl Responder {
    let post_id = path.into_inner();

    tracing::info!("Getting post with id={}", post_id);

    let mut uow = match db.begin().await {
        Ok(uow) => uow,
        Err(err) => return error_to_response(err),
    };
    let result = post_service.get_post(uow.as_mut(), post_id).await;

    match complete(uow, result).await {
        Ok(post) => HttpResponse::Ok().json(post),
        Err(err) => error_to_response(err),
    }
}

pub async fn update_post(
    db: Db,
    post_service: web::Data<Arc<PostService>>,
    path: web::Path<i64>,
    post_data: web::Json<UpdatePostRequest>,
) -> impl Responder {
    let post_id = path.into_inner();

    let mut uow = match db.begin().await {
        Ok(uow) => uow,
        Err(err) => return error_to_response(err),
    };
    let result = post_service
        .update_post(uow.as_mut(), post_id, post_data.into_inner())
        .await;

    match complete(uow, result).await {
        Ok(post) => HttpResponse::Ok().json(post),
        Err(err) => error_to_response(err),
    }
}

pub async fn delete_post(
    db: Db,
    post_service: web::Data<Arc<PostService>>,
    path: web::Path<i64>,
) -> impl Responder {
    let post_id = path.into_inner();

    let mut uow = match db.begin().await {
        Ok(uow) => uow,
        Err(err) => return error_to_response(err),
    };
    let result = post_service.delete_post(uow.as_mut(), post_id).await;

    match complete(uow, result).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(err) => error_to_response(err),
    }
}
