use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::{Ingredient, IngredientForm, IngredientUpdateForm};
use crate::services::push_id_list;
use crate::utils::misc::escape_like;
use sqlx::{QueryBuilder, Sqlite};
use std::collections::HashSet;
use validator::Validate;

pub struct IngredientService<'a> {
    db: &'a Database,
}

impl<'a> IngredientService<'a> {
    pub fn new(db: &'a Database) -> Self {
        IngredientService { db }
    }

    /// All ingredients ordered by name, or only those whose name starts with
    /// `prefix` (case-insensitive).
    pub async fn list_ingredients(&self, prefix: Option<&str>) -> AppResult<Vec<Ingredient>> {
        let prefix = prefix.map(str::trim).filter(|p| !p.is_empty());

        let ingredients = match prefix {
            Some(prefix) => {
                sqlx::query_as::<_, Ingredient>(
                    r#"
                    SELECT id, name, measurement_unit
                    FROM ingredients
                    WHERE name LIKE $1 ESCAPE '\'
                    ORDER BY name COLLATE NOCASE, id
                    "#,
                )
                .bind(format!("{}%", escape_like(prefix)))
                .fetch_all(&self.db.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Ingredient>(
                    "SELECT id, name, measurement_unit FROM ingredients ORDER BY name COLLATE NOCASE, id",
                )
                .fetch_all(&self.db.pool)
                .await?
            }
        };

        Ok(ingredients)
    }

    pub async fn get_ingredient_by_id(&self, id: i64) -> AppResult<Option<Ingredient>> {
        let result = sqlx::query_as::<_, Ingredient>(
            "SELECT id, name, measurement_unit FROM ingredients WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db.pool)
        .await?;

        Ok(result)
    }

    /// Fails with a validation error naming the first id in `ids` that is not in
    /// the catalog.
    pub async fn ensure_exist(&self, ids: &[i64]) -> AppResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id FROM ingredients WHERE id IN ");
        push_id_list(&mut builder, ids);

        let found: HashSet<i64> = builder
            .build_query_as::<(i64,)>()
            .fetch_all(&self.db.pool)
            .await?
            .into_iter()
            .map(|(id,)| id)
            .collect();

        match ids.iter().find(|id| !found.contains(id)) {
            Some(missing) => Err(AppError::Validation(format!(
                "Ingredient {} does not exist",
                missing
            ))),
            None => Ok(()),
        }
    }

    pub async fn create_ingredient(&self, form: &IngredientForm) -> AppResult<Ingredient> {
        form.validate()?;

        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2) RETURNING id",
        )
        .bind(form.name.trim())
        .bind(form.measurement_unit.trim())
        .fetch_one(&self.db.pool)
        .await?;

        tracing::info!("Created ingredient {} ({})", id, form.name);

        self.get_ingredient_by_id(id).await?.ok_or_else(|| {
            AppError::InternalServerError("Failed to create ingredient".to_string())
        })
    }

    pub async fn update_ingredient(
        &self,
        id: i64,
        form: &IngredientUpdateForm,
    ) -> AppResult<Ingredient> {
        form.validate()?;

        let result = sqlx::query(
            r#"
            UPDATE ingredients
            SET name = COALESCE($1, name),
                measurement_unit = COALESCE($2, measurement_unit)
            WHERE id = $3
            "#,
        )
        .bind(form.name.as_deref().map(str::trim))
        .bind(form.measurement_unit.as_deref().map(str::trim))
        .bind(id)
        .execute(&self.db.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Ingredient not found".to_string()));
        }

        self.get_ingredient_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Ingredient not found".to_string()))
    }

    /// Removing an ingredient also removes it from every recipe that used it.
    pub async fn delete_ingredient(&self, id: i64) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM ingredients WHERE id = $1")
            .bind(id)
            .execute(&self.db.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Ingredient not found".to_string()));
        }

        tracing::info!("Deleted ingredient {}", id);
        Ok(())
    }
}
