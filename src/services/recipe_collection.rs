use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::{Identity, RecipeShortResponse};
use crate::services::{push_id_list, RecipeService};
use sqlx::{QueryBuilder, Sqlite};
use std::collections::HashSet;

/// A per-user set of recipes. Favorites and the shopping cart share the same
/// add/remove contract and only differ in the table they live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeCollection {
    Favorites,
    ShoppingCart,
}

impl RecipeCollection {
    fn table(self) -> &'static str {
        match self {
            RecipeCollection::Favorites => "favorites",
            RecipeCollection::ShoppingCart => "shopping_cart",
        }
    }

    fn label(self) -> &'static str {
        match self {
            RecipeCollection::Favorites => "favorites",
            RecipeCollection::ShoppingCart => "shopping cart",
        }
    }
}

pub struct RecipeCollectionService<'a> {
    db: &'a Database,
}

impl<'a> RecipeCollectionService<'a> {
    pub fn new(db: &'a Database) -> Self {
        RecipeCollectionService { db }
    }

    pub async fn add(
        &self,
        user_id: i64,
        recipe_id: i64,
        collection: RecipeCollection,
    ) -> AppResult<RecipeShortResponse> {
        let recipe = RecipeService::new(self.db)
            .get_recipe_by_id(recipe_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Recipe not found".to_string()))?;

        // The primary key turns a concurrent double add into a no-op
        let result = sqlx::query(&format!(
            "INSERT OR IGNORE INTO {} (user_id, recipe_id) VALUES ($1, $2)",
            collection.table()
        ))
        .bind(user_id)
        .bind(recipe_id)
        .execute(&self.db.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::BadRequest(format!(
                "Recipe already added to {}",
                collection.label()
            )));
        }

        tracing::info!(
            "User {} added recipe {} to {}",
            user_id,
            recipe_id,
            collection.label()
        );
        Ok(recipe.into())
    }

    pub async fn remove(
        &self,
        user_id: i64,
        recipe_id: i64,
        collection: RecipeCollection,
    ) -> AppResult<()> {
        RecipeService::new(self.db)
            .get_recipe_by_id(recipe_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Recipe not found".to_string()))?;

        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
            collection.table()
        ))
        .bind(user_id)
        .bind(recipe_id)
        .execute(&self.db.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::BadRequest(format!(
                "Recipe already removed from {}",
                collection.label()
            )));
        }

        tracing::info!(
            "User {} removed recipe {} from {}",
            user_id,
            recipe_id,
            collection.label()
        );
        Ok(())
    }

    /// Every recipe id in the user's collection.
    pub async fn recipe_ids(&self, user_id: i64, collection: RecipeCollection) -> AppResult<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as(&format!(
            "SELECT recipe_id FROM {} WHERE user_id = $1 ORDER BY recipe_id",
            collection.table()
        ))
        .bind(user_id)
        .fetch_all(&self.db.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// The subset of `recipe_ids` that is in the caller's collection, in one
    /// query. Always empty for anonymous callers.
    pub async fn contained(
        &self,
        identity: &Identity,
        recipe_ids: &[i64],
        collection: RecipeCollection,
    ) -> AppResult<HashSet<i64>> {
        let user_id = match identity.user_id() {
            Some(id) if !recipe_ids.is_empty() => id,
            _ => return Ok(HashSet::new()),
        };

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT recipe_id FROM {} WHERE user_id = ",
            collection.table()
        ));
        builder.push_bind(user_id);
        builder.push(" AND recipe_id IN ");
        push_id_list(&mut builder, recipe_ids);

        let rows = builder
            .build_query_as::<(i64,)>()
            .fetch_all(&self.db.pool)
            .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
