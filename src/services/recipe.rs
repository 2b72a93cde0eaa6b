use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::{
    dedup_tag_ids, validate_ingredient_amounts, Identity, IngredientAmount, Recipe, RecipeFilter,
    RecipeForm, RecipeIngredient, RecipeResponse, RecipeShortResponse, RecipeUpdateForm, User,
    UserProfile,
};
use crate::services::{
    push_id_list, IngredientService, RecipeCollection, RecipeCollectionService, TagService,
    UserService,
};
use crate::utils::access_control::ensure_author_or_admin;
use crate::utils::pagination::PageParams;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, Transaction};
use std::collections::HashMap;
use validator::Validate;

const RECIPE_COLUMNS: &str = "r.id, r.author_id, r.name, r.text, r.image, r.cooking_time, r.created_at";

pub struct RecipeService<'a> {
    db: &'a Database,
}

impl<'a> RecipeService<'a> {
    pub fn new(db: &'a Database) -> Self {
        RecipeService { db }
    }

    pub async fn get_recipe_by_id(&self, id: i64) -> AppResult<Option<Recipe>> {
        let result = sqlx::query_as::<_, Recipe>(&format!(
            "SELECT {} FROM recipes r WHERE r.id = $1",
            RECIPE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db.pool)
        .await?;

        Ok(result)
    }

    /// Persists a recipe with all of its ingredient amounts and tags in one
    /// transaction. `form.image` must already be a stored media URL.
    pub async fn create_recipe(&self, author: &User, form: RecipeForm) -> AppResult<Recipe> {
        form.validate()?;
        validate_ingredient_amounts(&form.ingredients)?;
        let tag_ids = dedup_tag_ids(&form.tags);
        self.ensure_references_exist(Some(form.ingredients.as_slice()), Some(tag_ids.as_slice()))
            .await?;

        let now = Utc::now().timestamp();
        let mut tx = self.db.pool.begin().await?;

        let (recipe_id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO recipes (author_id, name, text, image, cooking_time, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(author.id)
        .bind(form.name.trim())
        .bind(&form.text)
        .bind(&form.image)
        .bind(form.cooking_time)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        insert_ingredients(&mut tx, recipe_id, &form.ingredients).await?;
        insert_tags(&mut tx, recipe_id, &tag_ids).await?;

        tx.commit().await?;

        tracing::info!(
            "User {} created recipe {} with {} ingredients",
            author.id,
            recipe_id,
            form.ingredients.len()
        );

        self.get_recipe_by_id(recipe_id)
            .await?
            .ok_or_else(|| AppError::InternalServerError("Failed to create recipe".to_string()))
    }

    /// Applies the supplied fields. Supplied ingredients or tags replace the whole
    /// previous set.
    pub async fn update_recipe(
        &self,
        user: &User,
        id: i64,
        form: RecipeUpdateForm,
    ) -> AppResult<Recipe> {
        let recipe = self
            .get_recipe_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Recipe not found".to_string()))?;
        ensure_author_or_admin(user, recipe.author_id)?;

        form.validate()?;
        if let Some(ingredients) = &form.ingredients {
            validate_ingredient_amounts(ingredients)?;
        }
        let tag_ids = form.tags.as_deref().map(dedup_tag_ids);
        self.ensure_references_exist(form.ingredients.as_deref(), tag_ids.as_deref())
            .await?;

        let mut tx = self.db.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE recipes
            SET name = COALESCE($1, name),
                text = COALESCE($2, text),
                image = COALESCE($3, image),
                cooking_time = COALESCE($4, cooking_time)
            WHERE id = $5
            "#,
        )
        .bind(form.name.as_deref().map(str::trim))
        .bind(form.text.as_deref())
        .bind(form.image.as_deref())
        .bind(form.cooking_time)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if let Some(ingredients) = &form.ingredients {
            sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_ingredients(&mut tx, id, ingredients).await?;
        }

        if let Some(tag_ids) = &tag_ids {
            sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_tags(&mut tx, id, tag_ids).await?;
        }

        tx.commit().await?;
        tracing::info!("User {} updated recipe {}", user.id, id);

        self.get_recipe_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Recipe not found".to_string()))
    }

    pub async fn delete_recipe(&self, user: &User, id: i64) -> AppResult<()> {
        let recipe = self
            .get_recipe_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Recipe not found".to_string()))?;
        ensure_author_or_admin(user, recipe.author_id)?;

        sqlx::query("DELETE FROM recipes WHERE id = $1")
            .bind(id)
            .execute(&self.db.pool)
            .await?;

        tracing::info!("User {} deleted recipe {}", user.id, id);
        Ok(())
    }

    pub async fn get_recipe_response(&self, identity: &Identity, id: i64) -> AppResult<RecipeResponse> {
        let recipe = self
            .get_recipe_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Recipe not found".to_string()))?;

        let mut responses = self.build_responses(identity, vec![recipe]).await?;
        responses
            .pop()
            .ok_or_else(|| AppError::InternalServerError("Failed to build recipe".to_string()))
    }

    /// One page of recipes matching `filter`, newest first, plus the total number
    /// of matches.
    pub async fn list_recipes(
        &self,
        identity: &Identity,
        filter: &RecipeFilter,
        params: PageParams,
    ) -> AppResult<(Vec<RecipeResponse>, i64)> {
        let viewer_id = identity.user_id();

        let mut count_query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM recipes r");
        push_filter(&mut count_query, filter, viewer_id);
        let (count,) = count_query
            .build_query_as::<(i64,)>()
            .fetch_one(&self.db.pool)
            .await?;

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM recipes r", RECIPE_COLUMNS));
        push_filter(&mut query, filter, viewer_id);
        query.push(" ORDER BY r.created_at DESC, r.id DESC LIMIT ");
        query.push_bind(params.limit);
        query.push(" OFFSET ");
        query.push_bind(params.offset());

        let recipes = query
            .build_query_as::<Recipe>()
            .fetch_all(&self.db.pool)
            .await?;

        let responses = self.build_responses(identity, recipes).await?;
        Ok((responses, count))
    }

    /// Denormalizes `recipes` for `identity`. Every nested collection and every
    /// per-caller flag is loaded with a single query over the whole batch.
    pub async fn build_responses(
        &self,
        identity: &Identity,
        recipes: Vec<Recipe>,
    ) -> AppResult<Vec<RecipeResponse>> {
        if recipes.is_empty() {
            return Ok(Vec::new());
        }

        let recipe_ids: Vec<i64> = recipes.iter().map(|r| r.id).collect();
        let mut author_ids: Vec<i64> = recipes.iter().map(|r| r.author_id).collect();
        author_ids.sort_unstable();
        author_ids.dedup();

        let mut ingredients = self.ingredients_for_recipes(&recipe_ids).await?;
        let mut tags = TagService::new(self.db)
            .tags_for_recipes(&recipe_ids)
            .await?;

        let user_service = UserService::new(self.db);
        let authors = user_service.get_users_by_ids(&author_ids).await?;
        let profiles: HashMap<i64, UserProfile> = user_service
            .profiles(identity, &authors)
            .await?
            .into_iter()
            .map(|profile| (profile.id, profile))
            .collect();

        let collections = RecipeCollectionService::new(self.db);
        let favorited = collections
            .contained(identity, &recipe_ids, RecipeCollection::Favorites)
            .await?;
        let in_cart = collections
            .contained(identity, &recipe_ids, RecipeCollection::ShoppingCart)
            .await?;

        recipes
            .into_iter()
            .map(|recipe| {
                let author = profiles.get(&recipe.author_id).cloned().ok_or_else(|| {
                    AppError::InternalServerError(format!(
                        "Author {} of recipe {} is missing",
                        recipe.author_id, recipe.id
                    ))
                })?;

                Ok(RecipeResponse {
                    id: recipe.id,
                    tags: tags.remove(&recipe.id).unwrap_or_default(),
                    author,
                    ingredients: ingredients.remove(&recipe.id).unwrap_or_default(),
                    is_favorited: favorited.contains(&recipe.id),
                    is_in_shopping_cart: in_cart.contains(&recipe.id),
                    name: recipe.name,
                    image: recipe.image,
                    text: recipe.text,
                    cooking_time: recipe.cooking_time,
                    created_at: recipe.created_at,
                })
            })
            .collect()
    }

    /// Ingredient amounts of every recipe in `recipe_ids`, in the order they were
    /// given when the recipe was saved.
    pub async fn ingredients_for_recipes(
        &self,
        recipe_ids: &[i64],
    ) -> AppResult<HashMap<i64, Vec<RecipeIngredient>>> {
        let mut by_recipe: HashMap<i64, Vec<RecipeIngredient>> = HashMap::new();
        if recipe_ids.is_empty() {
            return Ok(by_recipe);
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT ri.recipe_id, i.id, i.name, i.measurement_unit, ri.amount
            FROM recipe_ingredients ri
            JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE ri.recipe_id IN "#,
        );
        push_id_list(&mut builder, recipe_ids);
        builder.push(" ORDER BY ri.recipe_id, ri.id");

        let rows = builder
            .build_query_as::<RecipeIngredient>()
            .fetch_all(&self.db.pool)
            .await?;

        for row in rows {
            by_recipe.entry(row.recipe_id).or_default().push(row);
        }

        Ok(by_recipe)
    }

    /// Newest recipes of each author in `author_ids`, at most `limit` per author.
    pub async fn short_recipes_by_authors(
        &self,
        author_ids: &[i64],
        limit: Option<i64>,
    ) -> AppResult<HashMap<i64, Vec<RecipeShortResponse>>> {
        let mut by_author: HashMap<i64, Vec<RecipeShortResponse>> = HashMap::new();
        if author_ids.is_empty() || limit == Some(0) {
            return Ok(by_author);
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            r#"
            SELECT id, author_id, name, text, image, cooking_time, created_at
            FROM (
                SELECT {},
                       ROW_NUMBER() OVER (
                           PARTITION BY r.author_id ORDER BY r.created_at DESC, r.id DESC
                       ) AS position
                FROM recipes r
                WHERE r.author_id IN "#,
            RECIPE_COLUMNS
        ));
        push_id_list(&mut builder, author_ids);
        builder.push(")");
        if let Some(limit) = limit {
            builder.push(" WHERE position <= ");
            builder.push_bind(limit);
        }
        builder.push(" ORDER BY author_id, position");

        let recipes = builder
            .build_query_as::<Recipe>()
            .fetch_all(&self.db.pool)
            .await?;

        for recipe in recipes {
            by_author
                .entry(recipe.author_id)
                .or_default()
                .push(recipe.into());
        }

        Ok(by_author)
    }

    pub async fn count_by_authors(&self, author_ids: &[i64]) -> AppResult<HashMap<i64, i64>> {
        if author_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT author_id, COUNT(*) FROM recipes WHERE author_id IN ");
        push_id_list(&mut builder, author_ids);
        builder.push(" GROUP BY author_id");

        let rows = builder
            .build_query_as::<(i64, i64)>()
            .fetch_all(&self.db.pool)
            .await?;

        Ok(rows.into_iter().collect())
    }

    async fn ensure_references_exist(
        &self,
        ingredients: Option<&[IngredientAmount]>,
        tag_ids: Option<&[i64]>,
    ) -> AppResult<()> {
        if let Some(ingredients) = ingredients {
            let ids: Vec<i64> = ingredients.iter().map(|item| item.id).collect();
            IngredientService::new(self.db).ensure_exist(&ids).await?;
        }
        if let Some(tag_ids) = tag_ids {
            TagService::new(self.db).ensure_exist(tag_ids).await?;
        }
        Ok(())
    }
}

async fn insert_ingredients(
    tx: &mut Transaction<'_, Sqlite>,
    recipe_id: i64,
    ingredients: &[IngredientAmount],
) -> AppResult<()> {
    if ingredients.is_empty() {
        return Ok(());
    }

    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ");
    builder.push_values(ingredients, |mut row, item| {
        row.push_bind(recipe_id)
            .push_bind(item.id)
            .push_bind(item.amount);
    });
    builder
        .build()
        .execute(&mut **tx)
        .await
        .map_err(|e| missing_reference(e, "ingredient"))?;

    Ok(())
}

async fn insert_tags(
    tx: &mut Transaction<'_, Sqlite>,
    recipe_id: i64,
    tag_ids: &[i64],
) -> AppResult<()> {
    if tag_ids.is_empty() {
        return Ok(());
    }

    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
    builder.push_values(tag_ids, |mut row, tag_id| {
        row.push_bind(recipe_id).push_bind(*tag_id);
    });
    builder
        .build()
        .execute(&mut **tx)
        .await
        .map_err(|e| missing_reference(e, "tag"))?;

    Ok(())
}

/// A foreign key failure on a join row means the ingredient or tag was deleted
/// after `ensure_references_exist` saw it.
fn missing_reference(error: sqlx::Error, kind: &str) -> AppError {
    match error {
        sqlx::Error::Database(e) if e.is_foreign_key_violation() => {
            AppError::Validation(format!("Recipe refers to a {} that no longer exists", kind))
        }
        other => other.into(),
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &RecipeFilter, viewer_id: Option<i64>) {
    builder.push(" WHERE 1 = 1");

    if let Some(author) = filter.author {
        builder.push(" AND r.author_id = ");
        builder.push_bind(author);
    }

    if !filter.tags.is_empty() {
        builder.push(
            " AND EXISTS (SELECT 1 FROM recipe_tags rt JOIN tags t ON t.id = rt.tag_id \
             WHERE rt.recipe_id = r.id AND t.slug IN (",
        );
        let mut slugs = builder.separated(", ");
        for slug in &filter.tags {
            slugs.push_bind(slug.clone());
        }
        slugs.push_unseparated("))");
    }

    // Collection filters only mean something for a signed-in caller
    if let Some(user_id) = viewer_id {
        if filter.is_favorited {
            builder.push(" AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ");
            builder.push_bind(user_id);
            builder.push(")");
        }
        if filter.is_in_shopping_cart {
            builder.push(
                " AND EXISTS (SELECT 1 FROM shopping_cart s WHERE s.recipe_id = r.id AND s.user_id = ",
            );
            builder.push_bind(user_id);
            builder.push(")");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Ingredient;
    use crate::test_utils::{
        create_admin, create_ingredient, create_recipe, create_tag, create_user, recipe_form,
        test_db,
    };

    fn page(page: i64, limit: i64) -> PageParams {
        PageParams { page, limit }
    }

    async fn pantry(db: &Database) -> (Ingredient, Ingredient, Ingredient) {
        (
            create_ingredient(db, "Flour", "g").await,
            create_ingredient(db, "Sugar", "g").await,
            create_ingredient(db, "Egg", "pcs").await,
        )
    }

    async fn recipe_count(db: &Database) -> i64 {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recipes")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        count
    }

    #[actix_web::test]
    async fn test_create_recipe_with_nested_data() {
        let db = test_db().await;
        let author = create_user(&db, "chef").await;
        let (flour, sugar, _) = pantry(&db).await;
        let lunch = create_tag(&db, "Lunch", "lunch").await;

        let recipe = create_recipe(
            &db,
            &author,
            "Cake",
            &[(flour.id, 200), (sugar.id, 50)],
            &[lunch.id, lunch.id],
        )
        .await;

        let response = RecipeService::new(&db)
            .get_recipe_response(&Identity::Anonymous, recipe.id)
            .await
            .unwrap();

        assert_eq!(response.name, "Cake");
        assert_eq!(response.author.id, author.id);
        assert!(!response.author.is_subscribed);
        assert!(!response.is_favorited);
        assert!(!response.is_in_shopping_cart);
        assert_eq!(response.tags.len(), 1);
        assert_eq!(
            response
                .ingredients
                .iter()
                .map(|i| (i.name.as_str(), i.amount))
                .collect::<Vec<_>>(),
            vec![("Flour", 200), ("Sugar", 50)]
        );
    }

    #[actix_web::test]
    async fn test_invalid_recipes_are_rejected_and_not_stored() {
        let db = test_db().await;
        let author = create_user(&db, "chef").await;
        let (flour, _, _) = pantry(&db).await;
        let service = RecipeService::new(&db);

        let duplicate = recipe_form("Twice", &[(flour.id, 1), (flour.id, 2)], &[]);
        let empty = recipe_form("Nothing", &[], &[]);
        let mut slow = recipe_form("Instant", &[(flour.id, 1)], &[]);
        slow.cooking_time = 0;
        let unknown_ingredient = recipe_form("Ghost", &[(flour.id + 100, 1)], &[]);
        let unknown_tag = recipe_form("Tagged", &[(flour.id, 1)], &[42]);
        let zero_amount = recipe_form("Zero", &[(flour.id, 0)], &[]);
        let huge_amount = recipe_form("Huge", &[(flour.id, i64::MAX)], &[]);

        for form in [
            duplicate,
            empty,
            slow,
            unknown_ingredient,
            unknown_tag,
            zero_amount,
            huge_amount,
        ] {
            let name = form.name.clone();
            let result = service.create_recipe(&author, form).await;
            assert!(
                matches!(result, Err(AppError::Validation(_))),
                "{} should fail validation",
                name
            );
        }

        assert_eq!(recipe_count(&db).await, 0);
    }

    #[actix_web::test]
    async fn test_update_replaces_ingredients() {
        let db = test_db().await;
        let author = create_user(&db, "chef").await;
        let (flour, sugar, _) = pantry(&db).await;
        let recipe = create_recipe(&db, &author, "Mix", &[(flour.id, 200)], &[]).await;

        let service = RecipeService::new(&db);
        service
            .update_recipe(
                &author,
                recipe.id,
                RecipeUpdateForm {
                    ingredients: Some(vec![IngredientAmount { id: sugar.id, amount: 50 }]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let (flour_rows,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM recipe_ingredients WHERE recipe_id = $1 AND ingredient_id = $2",
        )
        .bind(recipe.id)
        .bind(flour.id)
        .fetch_one(&db.pool)
        .await
        .unwrap();
        assert_eq!(flour_rows, 0);

        let ingredients = service.ingredients_for_recipes(&[recipe.id]).await.unwrap();
        assert_eq!(ingredients[&recipe.id].len(), 1);
        assert_eq!(ingredients[&recipe.id][0].id, sugar.id);
        assert_eq!(ingredients[&recipe.id][0].amount, 50);
    }

    #[actix_web::test]
    async fn test_partial_update_keeps_other_fields() {
        let db = test_db().await;
        let author = create_user(&db, "chef").await;
        let (flour, _, _) = pantry(&db).await;
        let lunch = create_tag(&db, "Lunch", "lunch").await;
        let dinner = create_tag(&db, "Dinner", "dinner").await;
        let recipe = create_recipe(&db, &author, "Soup", &[(flour.id, 20)], &[lunch.id]).await;

        let service = RecipeService::new(&db);
        let updated = service
            .update_recipe(
                &author,
                recipe.id,
                RecipeUpdateForm {
                    cooking_time: Some(45),
                    tags: Some(vec![dinner.id]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Soup");
        assert_eq!(updated.cooking_time, 45);

        let response = service
            .get_recipe_response(&Identity::Anonymous, recipe.id)
            .await
            .unwrap();
        assert_eq!(response.ingredients.len(), 1);
        assert_eq!(response.tags.iter().map(|t| t.id).collect::<Vec<_>>(), vec![dinner.id]);

        // A failing update leaves everything as it was
        let result = service
            .update_recipe(
                &author,
                recipe.id,
                RecipeUpdateForm {
                    name: Some("Broken".to_string()),
                    ingredients: Some(vec![]),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        let unchanged = service.get_recipe_by_id(recipe.id).await.unwrap().unwrap();
        assert_eq!(unchanged.name, "Soup");
    }

    #[actix_web::test]
    async fn test_only_author_or_admin_may_change() {
        let db = test_db().await;
        let author = create_user(&db, "chef").await;
        let stranger = create_user(&db, "stranger").await;
        let admin = create_admin(&db, "root").await;
        let (flour, _, _) = pantry(&db).await;
        let recipe = create_recipe(&db, &author, "Bread", &[(flour.id, 500)], &[]).await;

        let service = RecipeService::new(&db);
        let rename = || RecipeUpdateForm {
            name: Some("Mine now".to_string()),
            ..Default::default()
        };

        assert!(matches!(
            service.update_recipe(&stranger, recipe.id, rename()).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            service.delete_recipe(&stranger, recipe.id).await,
            Err(AppError::Forbidden(_))
        ));

        service.update_recipe(&admin, recipe.id, rename()).await.unwrap();
        service.delete_recipe(&admin, recipe.id).await.unwrap();
        assert!(matches!(
            service.delete_recipe(&author, recipe.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[actix_web::test]
    async fn test_delete_cascades_to_collections() {
        let db = test_db().await;
        let author = create_user(&db, "chef").await;
        let (flour, _, _) = pantry(&db).await;
        let recipe = create_recipe(&db, &author, "Bread", &[(flour.id, 500)], &[]).await;

        let collections = RecipeCollectionService::new(&db);
        collections
            .add(author.id, recipe.id, RecipeCollection::Favorites)
            .await
            .unwrap();
        collections
            .add(author.id, recipe.id, RecipeCollection::ShoppingCart)
            .await
            .unwrap();

        RecipeService::new(&db)
            .delete_recipe(&author, recipe.id)
            .await
            .unwrap();

        assert!(collections
            .recipe_ids(author.id, RecipeCollection::Favorites)
            .await
            .unwrap()
            .is_empty());
        assert!(collections
            .recipe_ids(author.id, RecipeCollection::ShoppingCart)
            .await
            .unwrap()
            .is_empty());
    }

    #[actix_web::test]
    async fn test_list_filters_and_flags() {
        let db = test_db().await;
        let chef = create_user(&db, "chef").await;
        let baker = create_user(&db, "baker").await;
        let (flour, _, _) = pantry(&db).await;
        let lunch = create_tag(&db, "Lunch", "lunch").await;
        let dinner = create_tag(&db, "Dinner", "dinner").await;

        let soup = create_recipe(&db, &chef, "Soup", &[(flour.id, 1)], &[lunch.id]).await;
        let stew = create_recipe(&db, &chef, "Stew", &[(flour.id, 1)], &[dinner.id]).await;
        let bread = create_recipe(&db, &baker, "Bread", &[(flour.id, 1)], &[]).await;

        RecipeCollectionService::new(&db)
            .add(baker.id, soup.id, RecipeCollection::Favorites)
            .await
            .unwrap();

        let service = RecipeService::new(&db);
        let viewer = Identity::from(baker.clone());
        let ids = |list: &[RecipeResponse]| list.iter().map(|r| r.id).collect::<Vec<_>>();

        let (all, count) = service
            .list_recipes(&viewer, &RecipeFilter::default(), page(1, 10))
            .await
            .unwrap();
        assert_eq!(count, 3);
        assert_eq!(ids(&all), vec![bread.id, stew.id, soup.id]);
        assert!(all[2].is_favorited);
        assert!(!all[1].is_favorited);

        let by_tags = RecipeFilter {
            tags: vec!["lunch".to_string(), "dinner".to_string()],
            ..Default::default()
        };
        let (tagged, count) = service
            .list_recipes(&viewer, &by_tags, page(1, 10))
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(ids(&tagged), vec![stew.id, soup.id]);

        let by_author = RecipeFilter {
            author: Some(baker.id),
            ..Default::default()
        };
        let (mine, _) = service.list_recipes(&viewer, &by_author, page(1, 10)).await.unwrap();
        assert_eq!(ids(&mine), vec![bread.id]);

        let favorites = RecipeFilter {
            is_favorited: true,
            ..Default::default()
        };
        let (liked, count) = service.list_recipes(&viewer, &favorites, page(1, 10)).await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(ids(&liked), vec![soup.id]);

        // Anonymous callers cannot filter by a collection they do not have
        let (anonymous, count) = service
            .list_recipes(&Identity::Anonymous, &favorites, page(1, 10))
            .await
            .unwrap();
        assert_eq!(count, 3);
        assert!(anonymous.iter().all(|r| !r.is_favorited));

        let (second_page, count) = service
            .list_recipes(&viewer, &RecipeFilter::default(), page(2, 2))
            .await
            .unwrap();
        assert_eq!(count, 3);
        assert_eq!(ids(&second_page), vec![soup.id]);
    }

    #[actix_web::test]
    async fn test_short_recipes_by_authors() {
        let db = test_db().await;
        let chef = create_user(&db, "chef").await;
        let baker = create_user(&db, "baker").await;
        let (flour, _, _) = pantry(&db).await;

        let first = create_recipe(&db, &chef, "First", &[(flour.id, 1)], &[]).await;
        let second = create_recipe(&db, &chef, "Second", &[(flour.id, 1)], &[]).await;
        let third = create_recipe(&db, &chef, "Third", &[(flour.id, 1)], &[]).await;
        create_recipe(&db, &baker, "Bread", &[(flour.id, 1)], &[]).await;

        let service = RecipeService::new(&db);
        let limited = service
            .short_recipes_by_authors(&[chef.id, baker.id], Some(2))
            .await
            .unwrap();
        assert_eq!(
            limited[&chef.id].iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![third.id, second.id]
        );
        assert_eq!(limited[&baker.id].len(), 1);

        let unlimited = service
            .short_recipes_by_authors(&[chef.id], None)
            .await
            .unwrap();
        assert_eq!(unlimited[&chef.id].last().map(|r| r.id), Some(first.id));

        assert!(service
            .short_recipes_by_authors(&[chef.id], Some(0))
            .await
            .unwrap()
            .is_empty());

        let counts = service.count_by_authors(&[chef.id, baker.id]).await.unwrap();
        assert_eq!(counts[&chef.id], 3);
        assert_eq!(counts[&baker.id], 1);
    }

    #[actix_web::test]
    async fn test_vanished_references_are_validation_errors() {
        let db = test_db().await;
        let author = create_user(&db, "chef").await;
        let (flour, _, _) = pantry(&db).await;
        let recipe = create_recipe(&db, &author, "Bread", &[(flour.id, 1)], &[]).await;

        let mut tx = db.pool.begin().await.unwrap();
        let ingredients = insert_ingredients(
            &mut tx,
            recipe.id,
            &[IngredientAmount { id: flour.id + 100, amount: 1 }],
        )
        .await;
        assert!(matches!(ingredients, Err(AppError::Validation(_))));

        let tags = insert_tags(&mut tx, recipe.id, &[42]).await;
        assert!(matches!(tags, Err(AppError::Validation(_))));
        tx.rollback().await.unwrap();
    }
}
