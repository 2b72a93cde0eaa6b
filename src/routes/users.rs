use actix_web::{web, HttpRequest, HttpResponse};

use crate::error::{AppError, AppResult};
use crate::middleware::{AuthMiddleware, AuthUser, OptionalAuthMiddleware};
use crate::models::{
    Identity, RecipesLimitQuery, SetPasswordRequest, SignupRequest, UserCreatedResponse,
};
use crate::services::{AuthService, SubscriptionService, UserService};
use crate::utils::pagination::{Page, PageParams};
use crate::AppState;

pub fn create_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("")
            .wrap(OptionalAuthMiddleware)
            .route(web::get().to(list_users))
            .route(web::post().to(signup)),
    )
    .service(
        web::resource("/me")
            .wrap(AuthMiddleware)
            .route(web::get().to(get_me)),
    )
    .service(
        web::resource("/set_password")
            .wrap(AuthMiddleware)
            .route(web::post().to(set_password)),
    )
    .service(
        web::resource("/subscriptions")
            .wrap(AuthMiddleware)
            .route(web::get().to(list_subscriptions)),
    )
    .service(
        web::resource("/{id}")
            .wrap(OptionalAuthMiddleware)
            .route(web::get().to(get_user)),
    )
    .service(
        web::resource("/{id}/subscribe")
            .wrap(AuthMiddleware)
            .route(web::post().to(subscribe))
            .route(web::delete().to(unsubscribe)),
    );
}

/// GET /users - paginated profiles
async fn list_users(
    state: web::Data<AppState>,
    identity: Identity,
    req: HttpRequest,
) -> AppResult<HttpResponse> {
    let params = PageParams::from_query_string(req.query_string(), &state.config)?;
    let user_service = UserService::new(&state.db);

    let count = user_service.count_users().await?;
    let users = user_service.list_users(params.offset(), params.limit).await?;
    let profiles = user_service.profiles(&identity, &users).await?;

    let page = Page::new(profiles, count, params, req.path(), req.query_string())?;
    Ok(HttpResponse::Ok().json(page))
}

/// POST /users - sign up
async fn signup(
    state: web::Data<AppState>,
    form: web::Json<SignupRequest>,
) -> AppResult<HttpResponse> {
    let user = AuthService::new(&state.db).signup(&form).await?;
    Ok(HttpResponse::Created().json(UserCreatedResponse::from(user)))
}

async fn get_me(state: web::Data<AppState>, auth_user: AuthUser) -> AppResult<HttpResponse> {
    let identity = Identity::from(auth_user.user.clone());
    let profile = UserService::new(&state.db)
        .profile(&identity, &auth_user.user)
        .await?;

    Ok(HttpResponse::Ok().json(profile))
}

async fn get_user(
    state: web::Data<AppState>,
    identity: Identity,
    id: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let user_service = UserService::new(&state.db);
    let user = user_service
        .get_user_by_id(id.into_inner())
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let profile = user_service.profile(&identity, &user).await?;
    Ok(HttpResponse::Ok().json(profile))
}

async fn set_password(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    form: web::Json<SetPasswordRequest>,
) -> AppResult<HttpResponse> {
    AuthService::new(&state.db)
        .set_password(&auth_user.user, &form)
        .await?;

    Ok(HttpResponse::NoContent().finish())
}

/// GET /users/subscriptions - authors the caller follows, with a preview of
/// their recipes
async fn list_subscriptions(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    req: HttpRequest,
    query: web::Query<RecipesLimitQuery>,
) -> AppResult<HttpResponse> {
    let params = PageParams::from_query_string(req.query_string(), &state.config)?;
    let recipes_limit = query.parse()?;

    let (results, count) = SubscriptionService::new(&state.db)
        .list_subscriptions(&auth_user.user, params, recipes_limit)
        .await?;

    let page = Page::new(results, count, params, req.path(), req.query_string())?;
    Ok(HttpResponse::Ok().json(page))
}

async fn subscribe(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    id: web::Path<i64>,
    query: web::Query<RecipesLimitQuery>,
) -> AppResult<HttpResponse> {
    let recipes_limit = query.parse()?;
    let subscription = SubscriptionService::new(&state.db)
        .subscribe(&auth_user.user, id.into_inner(), recipes_limit)
        .await?;

    Ok(HttpResponse::Created().json(subscription))
}

async fn unsubscribe(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    id: web::Path<i64>,
) -> AppResult<HttpResponse> {
    SubscriptionService::new(&state.db)
        .unsubscribe(&auth_user.user, id.into_inner())
        .await?;

    Ok(HttpResponse::NoContent().finish())
}
