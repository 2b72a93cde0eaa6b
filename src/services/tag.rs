use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::{RecipeTagRow, Tag, TagForm, TagUpdateForm};
use crate::services::push_id_list;
use sqlx::{QueryBuilder, Sqlite};
use std::collections::{HashMap, HashSet};
use validator::Validate;

pub struct TagService<'a> {
    db: &'a Database,
}

impl<'a> TagService<'a> {
    pub fn new(db: &'a Database) -> Self {
        TagService { db }
    }

    pub async fn list_tags(&self) -> AppResult<Vec<Tag>> {
        let tags = sqlx::query_as::<_, Tag>("SELECT id, name, color, slug FROM tags ORDER BY id")
            .fetch_all(&self.db.pool)
            .await?;

        Ok(tags)
    }

    pub async fn get_tag_by_id(&self, id: i64) -> AppResult<Option<Tag>> {
        let result =
            sqlx::query_as::<_, Tag>("SELECT id, name, color, slug FROM tags WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.db.pool)
                .await?;

        Ok(result)
    }

    pub async fn ensure_exist(&self, ids: &[i64]) -> AppResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT id FROM tags WHERE id IN ");
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
                "Tag {} does not exist",
                missing
            ))),
            None => Ok(()),
        }
    }

    /// Tags of every recipe in `recipe_ids`, keyed by recipe id, each list ordered
    /// by tag id.
    pub async fn tags_for_recipes(&self, recipe_ids: &[i64]) -> AppResult<HashMap<i64, Vec<Tag>>> {
        let mut by_recipe: HashMap<i64, Vec<Tag>> = HashMap::new();
        if recipe_ids.is_empty() {
            return Ok(by_recipe);
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT rt.recipe_id, t.id, t.name, t.color, t.slug
            FROM recipe_tags rt
            JOIN tags t ON t.id = rt.tag_id
            WHERE rt.recipe_id IN "#,
        );
        push_id_list(&mut builder, recipe_ids);
        builder.push(" ORDER BY rt.recipe_id, t.id");

        let rows = builder
            .build_query_as::<RecipeTagRow>()
            .fetch_all(&self.db.pool)
            .await?;

        for row in rows {
            by_recipe.entry(row.recipe_id).or_default().push(row.into());
        }

        Ok(by_recipe)
    }

    pub async fn create_tag(&self, form: &TagForm) -> AppResult<Tag> {
        form.validate()?;

        let inserted = sqlx::query_as::<_, (i64,)>(
            "INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(form.name.trim())
        .bind(&form.color)
        .bind(&form.slug)
        .fetch_one(&self.db.pool)
        .await
        .map_err(|e| slug_conflict(e, &form.slug))?;

        let (id,) = inserted;
        tracing::info!("Created tag {} ({})", id, form.slug);

        self.get_tag_by_id(id)
            .await?
            .ok_or_else(|| AppError::InternalServerError("Failed to create tag".to_string()))
    }

    pub async fn update_tag(&self, id: i64, form: &TagUpdateForm) -> AppResult<Tag> {
        form.validate()?;

        let result = sqlx::query(
            r#"
            UPDATE tags
            SET name = COALESCE($1, name),
                color = COALESCE($2, color),
                slug = COALESCE($3, slug)
            WHERE id = $4
            "#,
        )
        .bind(form.name.as_deref().map(str::trim))
        .bind(form.color.as_deref())
        .bind(form.slug.as_deref())
        .bind(id)
        .execute(&self.db.pool)
        .await
        .map_err(|e| slug_conflict(e, form.slug.as_deref().unwrap_or_default()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Tag not found".to_string()));
        }

        self.get_tag_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Tag not found".to_string()))
    }

    pub async fn delete_tag(&self, id: i64) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM tags WHERE id = $1")
            .bind(id)
            .execute(&self.db.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Tag not found".to_string()));
        }

        tracing::info!("Deleted tag {}", id);
        Ok(())
    }
}

fn slug_conflict(error: sqlx::Error, slug: &str) -> AppError {
    match error {
        sqlx::Error::Database(e) if e.is_unique_violation() => {
            AppError::Validation(format!("Tag with slug '{}' already exists", slug))
        }
        other => other.into(),
    }
}
