pub mod auth;
pub mod ingredient;
pub mod recipe;
pub mod recipe_collection;
pub mod shopping_list;
pub mod subscription;
pub mod tag;
pub mod user;

pub use auth::AuthService;
pub use ingredient::IngredientService;
pub use recipe::RecipeService;
pub use recipe_collection::{RecipeCollection, RecipeCollectionService};
pub use shopping_list::ShoppingListService;
pub use subscription::SubscriptionService;
pub use tag::TagService;
pub use user::UserService;

use sqlx::{QueryBuilder, Sqlite};

/// Appends `(?, ?, ...)` for an `IN` clause. Callers must not pass an empty
/// slice; SQLite rejects `IN ()`.
pub(crate) fn push_id_list(builder: &mut QueryBuilder<'_, Sqlite>, ids: &[i64]) {
    builder.push("(");
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");
}
