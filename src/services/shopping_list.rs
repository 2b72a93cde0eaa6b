use crate::db::Database;
use crate::error::AppResult;
use crate::models::{ShoppingReport, ShoppingRow};
use crate::services::{push_id_list, RecipeCollection, RecipeCollectionService};
use sqlx::{QueryBuilder, Sqlite};

pub struct ShoppingListService<'a> {
    db: &'a Database,
}

impl<'a> ShoppingListService<'a> {
    pub fn new(db: &'a Database) -> Self {
        ShoppingListService { db }
    }

    /// Sums the ingredient amounts of every recipe in the user's shopping cart.
    pub async fn build_report(&self, user_id: i64, header: &str) -> AppResult<ShoppingReport> {
        let recipe_ids = RecipeCollectionService::new(self.db)
            .recipe_ids(user_id, RecipeCollection::ShoppingCart)
            .await?;

        if recipe_ids.is_empty() {
            return ShoppingReport::aggregate(header, Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT ri.ingredient_id, i.name, i.measurement_unit, ri.amount
            FROM recipe_ingredients ri
            JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE ri.recipe_id IN "#,
        );
        push_id_list(&mut builder, &recipe_ids);

        let rows = builder
            .build_query_as::<ShoppingRow>()
            .fetch_all(&self.db.pool)
            .await?;

        tracing::debug!(
            "Shopping list for user {}: {} recipes, {} ingredient rows",
            user_id,
            recipe_ids.len(),
            rows.len()
        );

        ShoppingReport::aggregate(header, rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IngredientAmount, RecipeUpdateForm, MAX_INGREDIENT_AMOUNT};
    use crate::services::RecipeService;
    use crate::test_utils::{create_ingredient, create_recipe, create_user, test_db};

    #[actix_web::test]
    async fn test_amounts_are_summed_across_recipes() {
        let db = test_db().await;
        let user = create_user(&db, "cook").await;
        let flour = create_ingredient(&db, "Flour", "g").await;
        let sugar = create_ingredient(&db, "Sugar", "g").await;
        let egg = create_ingredient(&db, "Egg", "pcs").await;

        let a = create_recipe(&db, &user, "A", &[(flour.id, 200), (sugar.id, 50)], &[]).await;
        let b = create_recipe(&db, &user, "B", &[(flour.id, 100), (egg.id, 2)], &[]).await;
        // Not in the cart, must not count
        create_recipe(&db, &user, "C", &[(flour.id, 1000)], &[]).await;

        let cart = RecipeCollectionService::new(&db);
        for recipe in [&a, &b] {
            cart.add(user.id, recipe.id, RecipeCollection::ShoppingCart)
                .await
                .unwrap();
        }

        let report = ShoppingListService::new(&db)
            .build_report(user.id, "Shopping list")
            .await
            .unwrap();

        let mut lines = report.lines();
        lines.sort();
        assert_eq!(lines, vec!["Egg, 2 pcs", "Flour, 300 g", "Sugar, 50 g"]);
        assert_eq!(report.render().lines().next(), Some("Shopping list"));
    }

    #[actix_web::test]
    async fn test_empty_cart_is_header_only() {
        let db = test_db().await;
        let user = create_user(&db, "cook").await;

        let report = ShoppingListService::new(&db)
            .build_report(user.id, "Shopping list")
            .await
            .unwrap();
        assert_eq!(report.render(), "Shopping list\n");
    }

    #[actix_web::test]
    async fn test_report_follows_recipe_updates() {
        let db = test_db().await;
        let user = create_user(&db, "cook").await;
        let flour = create_ingredient(&db, "Flour", "g").await;
        let sugar = create_ingredient(&db, "Sugar", "g").await;
        let recipe = create_recipe(&db, &user, "Mix", &[(flour.id, 200)], &[]).await;

        RecipeCollectionService::new(&db)
            .add(user.id, recipe.id, RecipeCollection::ShoppingCart)
            .await
            .unwrap();
        RecipeService::new(&db)
            .update_recipe(
                &user,
                recipe.id,
                RecipeUpdateForm {
                    ingredients: Some(vec![IngredientAmount { id: sugar.id, amount: 50 }]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let report = ShoppingListService::new(&db)
            .build_report(user.id, "Shopping list")
            .await
            .unwrap();
        assert_eq!(report.lines(), vec!["Sugar, 50 g"]);
    }

    #[actix_web::test]
    async fn test_largest_amounts_sum_exactly() {
        let db = test_db().await;
        let user = create_user(&db, "cook").await;
        let salt = create_ingredient(&db, "Salt", "g").await;

        let cart = RecipeCollectionService::new(&db);
        for name in ["A", "B"] {
            let recipe =
                create_recipe(&db, &user, name, &[(salt.id, MAX_INGREDIENT_AMOUNT)], &[]).await;
            cart.add(user.id, recipe.id, RecipeCollection::ShoppingCart)
                .await
                .unwrap();
        }

        let report = ShoppingListService::new(&db)
            .build_report(user.id, "Shopping list")
            .await
            .unwrap();
        assert_eq!(report.items.len(), 1);
        assert_eq!(report.items[0].amount, 2 * MAX_INGREDIENT_AMOUNT);
    }
}
