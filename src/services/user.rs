use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::{Identity, SignupRequest, User, UserProfile};
use crate::services::{push_id_list, SubscriptionService};
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite};

const USER_COLUMNS: &str =
    "id, email, username, first_name, last_name, password, role, created_at";

pub struct UserService<'a> {
    db: &'a Database,
}

impl<'a> UserService<'a> {
    pub fn new(db: &'a Database) -> Self {
        UserService { db }
    }

    pub async fn get_user_by_id(&self, id: i64) -> AppResult<Option<User>> {
        let result = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db.pool)
        .await?;

        Ok(result)
    }

    pub async fn get_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let result = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.db.pool)
        .await?;

        Ok(result)
    }

    /// Loads every user in `ids` with one query. Unknown ids are skipped.
    pub async fn get_users_by_ids(&self, ids: &[i64]) -> AppResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM users WHERE id IN ", USER_COLUMNS));
        push_id_list(&mut builder, ids);

        let users = builder
            .build_query_as::<User>()
            .fetch_all(&self.db.pool)
            .await?;

        Ok(users)
    }

    pub async fn list_users(&self, offset: i64, limit: i64) -> AppResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users ORDER BY id LIMIT $1 OFFSET $2",
            USER_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db.pool)
        .await?;

        Ok(users)
    }

    pub async fn count_users(&self) -> AppResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db.pool)
            .await?;

        Ok(count)
    }

    pub async fn create_user(
        &self,
        form: &SignupRequest,
        password_hash: &str,
        role: &str,
    ) -> AppResult<User> {
        let email = form.email.trim().to_lowercase();
        let now = Utc::now().timestamp();

        let inserted = sqlx::query_as::<_, (i64,)>(
            r#"
            INSERT INTO users (email, username, first_name, last_name, password, role, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(&email)
        .bind(&form.username)
        .bind(&form.first_name)
        .bind(&form.last_name)
        .bind(password_hash)
        .bind(role)
        .bind(now)
        .fetch_one(&self.db.pool)
        .await;

        let (id,) = match inserted {
            Ok(row) => row,
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(AppError::UserAlreadyExists)
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!("Created user {} ({}) with role {}", id, form.username, role);

        self.get_user_by_id(id)
            .await?
            .ok_or_else(|| AppError::InternalServerError("Failed to create user".to_string()))
    }

    pub async fn update_password(&self, id: i64, password_hash: &str) -> AppResult<()> {
        sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.db.pool)
            .await?;

        Ok(())
    }

    /// Profiles in the order of `users`, with `is_subscribed` relative to the caller.
    pub async fn profiles(&self, identity: &Identity, users: &[User]) -> AppResult<Vec<UserProfile>> {
        let author_ids: Vec<i64> = users.iter().map(|u| u.id).collect();
        let subscribed = SubscriptionService::new(self.db)
            .subscribed_author_ids(identity, &author_ids)
            .await?;

        Ok(users
            .iter()
            .map(|user| UserProfile::new(user, subscribed.contains(&user.id)))
            .collect())
    }

    pub async fn profile(&self, identity: &Identity, user: &User) -> AppResult<UserProfile> {
        let mut profiles = self.profiles(identity, std::slice::from_ref(user)).await?;
        profiles
            .pop()
            .ok_or_else(|| AppError::InternalServerError("Failed to build profile".to_string()))
    }
}
