use actix_web::{guard, web, HttpResponse};

use crate::error::{AppError, AppResult};
use crate::middleware::AdminMiddleware;
use crate::models::{IngredientForm, IngredientSearchQuery, IngredientUpdateForm};
use crate::services::IngredientService;
use crate::AppState;

pub fn create_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("")
            .guard(guard::Post())
            .wrap(AdminMiddleware)
            .route(web::post().to(create_ingredient)),
    )
    .service(web::resource("").route(web::get().to(list_ingredients)))
    .service(
        web::resource("/{id}")
            .guard(guard::Any(guard::Patch()).or(guard::Delete()))
            .wrap(AdminMiddleware)
            .route(web::patch().to(update_ingredient))
            .route(web::delete().to(delete_ingredient)),
    )
    .service(web::resource("/{id}").route(web::get().to(get_ingredient)));
}

/// GET /ingredients?name=<prefix>
async fn list_ingredients(
    state: web::Data<AppState>,
    query: web::Query<IngredientSearchQuery>,
) -> AppResult<HttpResponse> {
    let ingredients = IngredientService::new(&state.db)
        .list_ingredients(query.name.as_deref())
        .await?;

    Ok(HttpResponse::Ok().json(ingredients))
}

async fn get_ingredient(
    state: web::Data<AppState>,
    id: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let ingredient = IngredientService::new(&state.db)
        .get_ingredient_by_id(id.into_inner())
        .await?
        .ok_or_else(|| AppError::NotFound("Ingredient not found".to_string()))?;

    Ok(HttpResponse::Ok().json(ingredient))
}

async fn create_ingredient(
    state: web::Data<AppState>,
    form: web::Json<IngredientForm>,
) -> AppResult<HttpResponse> {
    let ingredient = IngredientService::new(&state.db)
        .create_ingredient(&form)
        .await?;

    Ok(HttpResponse::Created().json(ingredient))
}

async fn update_ingredient(
    state: web::Data<AppState>,
    id: web::Path<i64>,
    form: web::Json<IngredientUpdateForm>,
) -> AppResult<HttpResponse> {
    let ingredient = IngredientService::new(&state.db)
        .update_ingredient(id.into_inner(), &form)
        .await?;

    Ok(HttpResponse::Ok().json(ingredient))
}

async fn delete_ingredient(
    state: web::Data<AppState>,
    id: web::Path<i64>,
) -> AppResult<HttpResponse> {
    IngredientService::new(&state.db)
        .delete_ingredient(id.into_inner())
        .await?;

    Ok(HttpResponse::NoContent().finish())
}
