use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::{Identity, SubscriptionResponse, User};
use crate::services::{push_id_list, RecipeService, UserService};
use crate::utils::pagination::PageParams;
use sqlx::{QueryBuilder, Sqlite};
use std::collections::HashSet;

pub struct SubscriptionService<'a> {
    db: &'a Database,
}

impl<'a> SubscriptionService<'a> {
    pub fn new(db: &'a Database) -> Self {
        SubscriptionService { db }
    }

    pub async fn subscribe(
        &self,
        user: &User,
        author_id: i64,
        recipes_limit: Option<i64>,
    ) -> AppResult<SubscriptionResponse> {
        let author = UserService::new(self.db)
            .get_user_by_id(author_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Author not found".to_string()))?;

        if user.id == author.id {
            return Err(AppError::Validation(
                "You cannot subscribe to yourself".to_string(),
            ));
        }

        let result = sqlx::query(
            "INSERT OR IGNORE INTO subscriptions (user_id, author_id) VALUES ($1, $2)",
        )
        .bind(user.id)
        .bind(author.id)
        .execute(&self.db.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Validation(
                "You are already subscribed to this author".to_string(),
            ));
        }

        tracing::info!("User {} subscribed to {}", user.id, author.id);

        let identity = Identity::from(user.clone());
        let mut responses = self
            .build_responses(&identity, vec![author], recipes_limit)
            .await?;
        responses.pop().ok_or_else(|| {
            AppError::InternalServerError("Failed to build subscription".to_string())
        })
    }

    pub async fn unsubscribe(&self, user: &User, author_id: i64) -> AppResult<()> {
        UserService::new(self.db)
            .get_user_by_id(author_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Author not found".to_string()))?;

        let result = sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND author_id = $2")
            .bind(user.id)
            .bind(author_id)
            .execute(&self.db.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Subscription not found".to_string()));
        }

        tracing::info!("User {} unsubscribed from {}", user.id, author_id);
        Ok(())
    }

    /// Authors the user follows, ordered by id, plus how many there are in total.
    pub async fn list_subscriptions(
        &self,
        user: &User,
        params: PageParams,
        recipes_limit: Option<i64>,
    ) -> AppResult<(Vec<SubscriptionResponse>, i64)> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM subscriptions WHERE user_id = $1")
                .bind(user.id)
                .fetch_one(&self.db.pool)
                .await?;

        let authors = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.email, u.username, u.first_name, u.last_name, u.password, u.role, u.created_at
            FROM subscriptions s
            JOIN users u ON u.id = s.author_id
            WHERE s.user_id = $1
            ORDER BY u.id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user.id)
        .bind(params.limit)
        .bind(params.offset())
        .fetch_all(&self.db.pool)
        .await?;

        let identity = Identity::from(user.clone());
        let responses = self
            .build_responses(&identity, authors, recipes_limit)
            .await?;

        Ok((responses, count))
    }

    /// The subset of `author_ids` the caller follows, in one query.
    pub async fn subscribed_author_ids(
        &self,
        identity: &Identity,
        author_ids: &[i64],
    ) -> AppResult<HashSet<i64>> {
        let user_id = match identity.user_id() {
            Some(id) if !author_ids.is_empty() => id,
            _ => return Ok(HashSet::new()),
        };

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT author_id FROM subscriptions WHERE user_id = ");
        builder.push_bind(user_id);
        builder.push(" AND author_id IN ");
        push_id_list(&mut builder, author_ids);

        let rows = builder
            .build_query_as::<(i64,)>()
            .fetch_all(&self.db.pool)
            .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn build_responses(
        &self,
        identity: &Identity,
        authors: Vec<User>,
        recipes_limit: Option<i64>,
    ) -> AppResult<Vec<SubscriptionResponse>> {
        let author_ids: Vec<i64> = authors.iter().map(|a| a.id).collect();

        let profiles = UserService::new(self.db)
            .profiles(identity, &authors)
            .await?;
        let recipe_service = RecipeService::new(self.db);
        let mut recipes = recipe_service
            .short_recipes_by_authors(&author_ids, recipes_limit)
            .await?;
        let counts = recipe_service.count_by_authors(&author_ids).await?;

        Ok(profiles
            .into_iter()
            .map(|profile| SubscriptionResponse {
                recipes: recipes.remove(&profile.id).unwrap_or_default(),
                recipes_count: counts.get(&profile.id).copied().unwrap_or(0),
                author: profile,
            })
            .collect())
    }
}
