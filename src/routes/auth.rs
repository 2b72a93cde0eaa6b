use actix_web::{
    cookie::{Cookie, SameSite},
    http::header,
    web, HttpResponse,
};
use validator::Validate;

use crate::error::AppResult;
use crate::middleware::{AuthMiddleware, AuthUser};
use crate::models::{SigninRequest, TokenResponse};
use crate::services::AuthService;
use crate::utils::auth::create_jwt;
use crate::AppState;

pub fn create_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/login").route(web::post().to(signin)))
        .service(
            web::resource("/logout")
                .wrap(AuthMiddleware)
                .route(web::post().to(signout)),
        );
}

fn session_cookie(token: String) -> Cookie<'static> {
    let mut cookie = Cookie::new("token", token);
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_path("/");
    cookie
}

/// POST /auth/token/login - exchange email and password for a token
async fn signin(
    state: web::Data<AppState>,
    form: web::Json<SigninRequest>,
) -> AppResult<HttpResponse> {
    form.validate()?;

    let user = AuthService::new(&state.db)
        .authenticate(&form.email, &form.password)
        .await?;

    let (token, exp) = create_jwt(user.id, &state.config.secret_key, &state.config.jwt_expires_in)?;
    tracing::info!("User {} signed in", user.id);

    let mut cookie = session_cookie(token.clone());
    cookie.set_expires(time::OffsetDateTime::from_unix_timestamp(exp).ok());

    Ok(HttpResponse::Ok()
        .append_header((header::SET_COOKIE, cookie.to_string()))
        .json(TokenResponse { auth_token: token }))
}

/// POST /auth/token/logout - drop the session cookie
async fn signout(auth_user: AuthUser) -> AppResult<HttpResponse> {
    tracing::info!("User {} signed out", auth_user.id);

    let mut cookie = session_cookie(String::new());
    cookie.set_max_age(time::Duration::seconds(-1));

    Ok(HttpResponse::NoContent()
        .append_header((header::SET_COOKIE, cookie.to_string()))
        .finish())
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{create_user, init_app, send_request, test_state, TEST_PASSWORD};
    use actix_web::{http::StatusCode, test};
    use serde_json::{json, Value};

    #[actix_web::test]
    async fn test_login_and_logout() {
        let state = test_state().await;
        create_user(&state.db, "cook").await;
        let app = init_app!(state).await;

        let req = test::TestRequest::post()
            .uri("/api/auth/token/login/")
            .set_json(json!({"email": "cook@example.com", "password": TEST_PASSWORD}));
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp
            .response()
            .cookies()
            .any(|c| c.name() == "token" && c.http_only() == Some(true)));
        let body: Value = test::read_body_json(resp).await;
        let token = body["auth_token"].as_str().unwrap().to_string();

        let (status, _) = send_request!(
            app,
            test::TestRequest::post()
                .uri("/api/auth/token/logout/")
                .insert_header(("Authorization", format!("Token {}", token)))
        );
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send_request!(
            app,
            test::TestRequest::post().uri("/api/auth/token/logout/")
        );
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_wrong_password_is_bad_request() {
        let state = test_state().await;
        create_user(&state.db, "cook").await;
        let app = init_app!(state).await;

        let (status, body) = send_request!(
            app,
            test::TestRequest::post()
                .uri("/api/auth/token/login/")
                .set_json(json!({"email": "cook@example.com", "password": "nope-nope"}))
        );
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["detail"], "Invalid credentials");
    }
}
