use actix_web::{guard, web, HttpResponse};

use crate::error::{AppError, AppResult};
use crate::middleware::AdminMiddleware;
use crate::models::{TagForm, TagUpdateForm};
use crate::services::TagService;
use crate::AppState;

pub fn create_routes(cfg: &mut web::ServiceConfig) {
    // Admin-only methods get their own guarded resources so that reads stay public
    cfg.service(
        web::resource("")
            .guard(guard::Post())
            .wrap(AdminMiddleware)
            .route(web::post().to(create_tag)),
    )
    .service(web::resource("").route(web::get().to(list_tags)))
    .service(
        web::resource("/{id}")
            .guard(guard::Any(guard::Patch()).or(guard::Delete()))
            .wrap(AdminMiddleware)
            .route(web::patch().to(update_tag))
            .route(web::delete().to(delete_tag)),
    )
    .service(web::resource("/{id}").route(web::get().to(get_tag)));
}

async fn list_tags(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let tags = TagService::new(&state.db).list_tags().await?;
    Ok(HttpResponse::Ok().json(tags))
}

async fn get_tag(state: web::Data<AppState>, id: web::Path<i64>) -> AppResult<HttpResponse> {
    let tag = TagService::new(&state.db)
        .get_tag_by_id(id.into_inner())
        .await?
        .ok_or_else(|| AppError::NotFound("Tag not found".to_string()))?;

    Ok(HttpResponse::Ok().json(tag))
}

async fn create_tag(
    state: web::Data<AppState>,
    form: web::Json<TagForm>,
) -> AppResult<HttpResponse> {
    let tag = TagService::new(&state.db).create_tag(&form).await?;
    Ok(HttpResponse::Created().json(tag))
}

async fn update_tag(
    state: web::Data<AppState>,
    id: web::Path<i64>,
    form: web::Json<TagUpdateForm>,
) -> AppResult<HttpResponse> {
    let tag = TagService::new(&state.db)
        .update_tag(id.into_inner(), &form)
        .await?;

    Ok(HttpResponse::Ok().json(tag))
}

async fn delete_tag(state: web::Data<AppState>, id: web::Path<i64>) -> AppResult<HttpResponse> {
    TagService::new(&state.db).delete_tag(id.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
