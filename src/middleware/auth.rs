use crate::error::AppError;
use crate::models::{Identity, User};
use crate::services::UserService;
use crate::utils::auth::{extract_token, verify_jwt};
use crate::AppState;
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::Error as ActixError,
    http::header,
    web, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;

#[derive(Clone)]
pub struct AuthUser {
    pub user: User,
}

impl std::ops::Deref for AuthUser {
    type Target = User;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

// Extractor for AuthUser from request extensions
impl actix_web::FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &actix_web::HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        let result = req
            .extensions()
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("Not authenticated".to_string()));

        ready(result)
    }
}

// The caller as seen by read endpoints; never fails
impl actix_web::FromRequest for Identity {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &actix_web::HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        let identity = match req.extensions().get::<AuthUser>() {
            Some(auth_user) => Identity::User(auth_user.user.clone()),
            None => Identity::Anonymous,
        };

        ready(Ok(identity))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthMode {
    /// A valid token is mandatory.
    Required,
    /// A valid token identifies the caller, anything else is anonymous.
    Optional,
    /// A valid token of an administrator is mandatory.
    Admin,
}

/// Rejects requests without a valid token with 401.
pub struct AuthMiddleware;

/// Identifies the caller when it can and lets everyone through.
pub struct OptionalAuthMiddleware;

/// Like [`AuthMiddleware`], and additionally rejects non-administrators with 403.
pub struct AdminMiddleware;

macro_rules! auth_transform {
    ($factory:ty, $mode:expr) => {
        impl<S, B> Transform<S, ServiceRequest> for $factory
        where
            S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError> + 'static,
            S::Future: 'static,
            B: 'static,
        {
            type Response = ServiceResponse<B>;
            type Error = ActixError;
            type InitError = ();
            type Transform = AuthMiddlewareService<S>;
            type Future = Ready<Result<Self::Transform, Self::InitError>>;

            fn new_transform(&self, service: S) -> Self::Future {
                ready(Ok(AuthMiddlewareService {
                    service: Rc::new(service),
                    mode: $mode,
                }))
            }
        }
    };
}

auth_transform!(AuthMiddleware, AuthMode::Required);
auth_transform!(OptionalAuthMiddleware, AuthMode::Optional);
auth_transform!(AdminMiddleware, AuthMode::Admin);

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
    mode: AuthMode,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = ActixError;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let mode = self.mode;

        Box::pin(async move {
            let state = req
                .app_data::<web::Data<AppState>>()
                .cloned()
                .ok_or_else(|| AppError::InternalServerError("App state not found".to_string()))?;

            let user = match (authenticate(&req, &state).await, mode) {
                (Ok(user), _) => Some(user),
                (Err(e), AuthMode::Optional) => {
                    tracing::debug!("Treating request as anonymous: {}", e);
                    None
                }
                (Err(e), _) => return Err(e.into()),
            };

            if mode == AuthMode::Admin && !user.as_ref().map(User::is_admin).unwrap_or(false) {
                return Err(AppError::Forbidden("Admin access required".to_string()).into());
            }

            if let Some(user) = user {
                req.extensions_mut().insert(AuthUser { user });
            }

            let res = service.call(req).await?;
            Ok(res)
        })
    }
}

/// Resolves the caller from the `Authorization` header (`Bearer` or `Token`
/// scheme) or, failing that, the `token` cookie.
async fn authenticate(req: &ServiceRequest, state: &AppState) -> Result<User, AppError> {
    let header_token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(extract_token)
        .map(str::to_string);

    let token = header_token
        .or_else(|| req.cookie("token").map(|c| c.value().to_string()))
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization token".to_string()))?;

    let claims = verify_jwt(&token, &state.config.secret_key).map_err(|e| {
        tracing::debug!("JWT verification failed: {:?}", e);
        AppError::Unauthorized("Invalid or expired token".to_string())
    })?;

    let user_id = claims
        .sub
        .parse::<i64>()
        .map_err(|_| AppError::Unauthorized("Invalid token subject".to_string()))?;

    UserService::new(&state.db)
        .get_user_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))
}
