use actix_web::{
    http::header::{ContentDisposition, DispositionParam, DispositionType},
    web, HttpRequest, HttpResponse,
};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::{AuthMiddleware, AuthUser, OptionalAuthMiddleware};
use crate::models::{
    validate_ingredient_amounts, Identity, RecipeFilter, RecipeForm, RecipeUpdateForm,
    SHOPPING_LIST_FILENAME,
};
use crate::services::{
    RecipeCollection, RecipeCollectionService, RecipeService, ShoppingListService,
};
use crate::utils::access_control::ensure_author_or_admin;
use crate::utils::media::resolve_recipe_image;
use crate::utils::pagination::{Page, PageParams};
use crate::AppState;

pub fn create_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("")
            .wrap(OptionalAuthMiddleware)
            .route(web::get().to(list_recipes))
            .route(web::post().to(create_recipe)),
    )
    .service(
        web::resource("/download_shopping_cart")
            .wrap(AuthMiddleware)
            .route(web::get().to(download_shopping_cart)),
    )
    .service(
        web::resource("/{id}")
            .wrap(OptionalAuthMiddleware)
            .route(web::get().to(get_recipe))
            .route(web::patch().to(update_recipe))
            .route(web::delete().to(delete_recipe)),
    )
    .service(
        web::resource("/{id}/favorite")
            .wrap(AuthMiddleware)
            .route(web::post().to(add_favorite))
            .route(web::delete().to(remove_favorite)),
    )
    .service(
        web::resource("/{id}/shopping_cart")
            .wrap(AuthMiddleware)
            .route(web::post().to(add_to_shopping_cart))
            .route(web::delete().to(remove_from_shopping_cart)),
    );
}

/// GET /recipes - newest first, filtered by `tags`, `author`, `is_favorited`
/// and `is_in_shopping_cart`
async fn list_recipes(
    state: web::Data<AppState>,
    identity: Identity,
    req: HttpRequest,
) -> AppResult<HttpResponse> {
    let params = PageParams::from_query_string(req.query_string(), &state.config)?;
    let filter = RecipeFilter::from_query_string(req.query_string())?;

    let (results, count) = RecipeService::new(&state.db)
        .list_recipes(&identity, &filter, params)
        .await?;

    let page = Page::new(results, count, params, req.path(), req.query_string())?;
    Ok(HttpResponse::Ok().json(page))
}

async fn get_recipe(
    state: web::Data<AppState>,
    identity: Identity,
    id: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let recipe = RecipeService::new(&state.db)
        .get_recipe_response(&identity, id.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(recipe))
}

async fn create_recipe(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    form: web::Json<RecipeForm>,
) -> AppResult<HttpResponse> {
    let mut form = form.into_inner();

    // Reject bad payloads before anything is written to the media root
    form.validate()?;
    validate_ingredient_amounts(&form.ingredients)?;
    form.image = resolve_recipe_image(&state.config, &form.image).await?;

    let service = RecipeService::new(&state.db);
    let recipe = service.create_recipe(&auth_user.user, form).await?;

    let identity = Identity::from(auth_user.user.clone());
    let response = service.get_recipe_response(&identity, recipe.id).await?;
    Ok(HttpResponse::Created().json(response))
}

async fn update_recipe(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    id: web::Path<i64>,
    form: web::Json<RecipeUpdateForm>,
) -> AppResult<HttpResponse> {
    let id = id.into_inner();
    let mut form = form.into_inner();
    let service = RecipeService::new(&state.db);

    let recipe = service
        .get_recipe_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Recipe not found".to_string()))?;
    ensure_author_or_admin(&auth_user.user, recipe.author_id)?;

    form.validate()?;
    if let Some(image) = form.image.take() {
        form.image = Some(resolve_recipe_image(&state.config, &image).await?);
    }

    service.update_recipe(&auth_user.user, id, form).await?;

    let identity = Identity::from(auth_user.user.clone());
    let response = service.get_recipe_response(&identity, id).await?;
    Ok(HttpResponse::Ok().json(response))
}

async fn delete_recipe(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    id: web::Path<i64>,
) -> AppResult<HttpResponse> {
    RecipeService::new(&state.db)
        .delete_recipe(&auth_user.user, id.into_inner())
        .await?;

    Ok(HttpResponse::NoContent().finish())
}

async fn add_to_collection(
    state: &AppState,
    auth_user: &AuthUser,
    recipe_id: i64,
    collection: RecipeCollection,
) -> AppResult<HttpResponse> {
    let recipe = RecipeCollectionService::new(&state.db)
        .add(auth_user.id, recipe_id, collection)
        .await?;

    Ok(HttpResponse::Created().json(recipe))
}

async fn remove_from_collection(
    state: &AppState,
    auth_user: &AuthUser,
    recipe_id: i64,
    collection: RecipeCollection,
) -> AppResult<HttpResponse> {
    RecipeCollectionService::new(&state.db)
        .remove(auth_user.id, recipe_id, collection)
        .await?;

    Ok(HttpResponse::NoContent().finish())
}

async fn add_favorite(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    id: web::Path<i64>,
) -> AppResult<HttpResponse> {
    add_to_collection(&state, &auth_user, id.into_inner(), RecipeCollection::Favorites).await
}

async fn remove_favorite(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    id: web::Path<i64>,
) -> AppResult<HttpResponse> {
    remove_from_collection(&state, &auth_user, id.into_inner(), RecipeCollection::Favorites).await
}

async fn add_to_shopping_cart(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    id: web::Path<i64>,
) -> AppResult<HttpResponse> {
    add_to_collection(&state, &auth_user, id.into_inner(), RecipeCollection::ShoppingCart).await
}

async fn remove_from_shopping_cart(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    id: web::Path<i64>,
) -> AppResult<HttpResponse> {
    remove_from_collection(&state, &auth_user, id.into_inner(), RecipeCollection::ShoppingCart)
        .await
}

/// GET /recipes/download_shopping_cart - the aggregated shopping list as a
/// text attachment
async fn download_shopping_cart(
    state: web::Data<AppState>,
    auth_user: AuthUser,
) -> AppResult<HttpResponse> {
    let report = ShoppingListService::new(&state.db)
        .build_report(auth_user.id, &state.config.shopping_list_header)
        .await?;

    tracing::info!(
        "User {} downloaded a shopping list of {} items",
        auth_user.id,
        report.items.len()
    );

    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(
                SHOPPING_LIST_FILENAME.to_string(),
            )],
        })
        .body(report.render()))
}
