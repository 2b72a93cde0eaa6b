//! Fixtures shared by the service and route tests.

use crate::config::Config;
use crate::db::Database;
use crate::models::{
    Ingredient, IngredientAmount, IngredientForm, Recipe, RecipeForm, SignupRequest, Tag,
    TagForm, User, ROLE_ADMIN, ROLE_USER,
};
use crate::services::{IngredientService, RecipeService, TagService, UserService};
use crate::utils::auth::create_jwt;
use crate::utils::password::hash_password;
use crate::AppState;
use actix_web::{http::header, web};
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

pub const TEST_PASSWORD: &str = "password123";

pub async fn test_db() -> Database {
    Database::new_in_memory()
        .await
        .expect("in-memory database")
}

/// App state over an in-memory database. Uploaded media goes to a temporary
/// directory that is removed when the state is dropped.
pub struct TestState {
    state: web::Data<AppState>,
    media: TempDir,
}

impl TestState {
    pub fn media_root(&self) -> &Path {
        self.media.path()
    }
}

impl Deref for TestState {
    type Target = web::Data<AppState>;

    fn deref(&self) -> &Self::Target {
        &self.state
    }
}

pub async fn test_state() -> TestState {
    let media = tempfile::tempdir().expect("media dir");
    let config = Config {
        media_root: media.path().to_string_lossy().into_owned(),
        ..Config::default()
    };

    TestState {
        state: web::Data::new(AppState {
            db: test_db().await,
            config: Arc::new(config),
        }),
        media,
    }
}

/// `Authorization` header carrying a fresh token for `user`.
pub fn auth_header(state: &AppState, user: &User) -> (header::HeaderName, String) {
    let (token, _) = create_jwt(user.id, &state.config.secret_key, "1h").expect("token");
    (header::AUTHORIZATION, format!("Token {}", token))
}

async fn insert_user(db: &Database, username: &str, role: &str) -> User {
    let form = SignupRequest {
        email: format!("{}@example.com", username),
        username: username.to_string(),
        first_name: "Test".to_string(),
        last_name: username.to_string(),
        password: TEST_PASSWORD.to_string(),
    };
    let hash = hash_password(TEST_PASSWORD).expect("hash");

    UserService::new(db)
        .create_user(&form, &hash, role)
        .await
        .expect("create user")
}

pub async fn create_user(db: &Database, username: &str) -> User {
    insert_user(db, username, ROLE_USER).await
}

pub async fn create_admin(db: &Database, username: &str) -> User {
    insert_user(db, username, ROLE_ADMIN).await
}

pub async fn create_ingredient(db: &Database, name: &str, unit: &str) -> Ingredient {
    IngredientService::new(db)
        .create_ingredient(&IngredientForm {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
        })
        .await
        .expect("create ingredient")
}

pub async fn create_tag(db: &Database, name: &str, slug: &str) -> Tag {
    TagService::new(db)
        .create_tag(&TagForm {
            name: name.to_string(),
            color: "#E26C2D".to_string(),
            slug: slug.to_string(),
        })
        .await
        .expect("create tag")
}

pub fn recipe_form(name: &str, ingredients: &[(i64, i64)], tags: &[i64]) -> RecipeForm {
    RecipeForm {
        name: name.to_string(),
        text: format!("How to make {}", name),
        image: "/media/recipes/images/test.png".to_string(),
        cooking_time: 10,
        ingredients: ingredients
            .iter()
            .map(|&(id, amount)| IngredientAmount { id, amount })
            .collect(),
        tags: tags.to_vec(),
    }
}

pub async fn create_recipe(
    db: &Database,
    author: &User,
    name: &str,
    ingredients: &[(i64, i64)],
    tags: &[i64],
) -> Recipe {
    RecipeService::new(db)
        .create_recipe(author, recipe_form(name, ingredients, tags))
        .await
        .expect("create recipe")
}

/// Sends a `TestRequest` through a service built by `test::init_service` and
/// returns status and body. Errors raised by middleware are rendered the same
/// way the HTTP server renders them.
macro_rules! send_request {
    ($app:expr, $req:expr) => {{
        use actix_web::dev::Service as _;
        match $app.call($req.to_request()).await {
            Ok(resp) => {
                let status = resp.status();
                (status, actix_web::test::read_body(resp).await)
            }
            Err(err) => {
                let resp = err.error_response();
                let status = resp.status();
                let body = actix_web::body::to_bytes(resp.into_body())
                    .await
                    .unwrap_or_default();
                (status, body)
            }
        }
    }};
}

pub(crate) use send_request;

/// Builds the API the way `main` does, on top of `state`.
macro_rules! init_app {
    ($state:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data($state.clone())
                .wrap(actix_web::middleware::NormalizePath::trim())
                .configure(crate::configure_app),
        )
    };
}

pub(crate) use init_app;

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn test_media_root_is_removed_with_the_state() {
        let state = test_state().await;
        let root = state.media_root().to_path_buf();
        assert_eq!(state.config.media_root, root.to_string_lossy());

        std::fs::write(root.join("leftover.png"), b"x").unwrap();
        drop(state);
        assert!(!root.exists());
    }
}
