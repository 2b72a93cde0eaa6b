use serde::Serialize;
use sqlx::FromRow;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use crate::error::{AppError, AppResult};

pub const SHOPPING_LIST_FILENAME: &str = "shopping-list.txt";

/// A RecipeIngredient row of a recipe that sits in somebody's shopping list.
#[derive(Debug, Clone, FromRow)]
pub struct ShoppingRow {
    pub ingredient_id: i64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ShoppingItem {
    pub ingredient_id: i64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

impl ShoppingItem {
    pub fn line(&self) -> String {
        format!("{}, {} {}", self.name, self.amount, self.measurement_unit)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ShoppingReport {
    pub header: String,
    pub items: Vec<ShoppingItem>,
}

impl ShoppingReport {
    /// Groups rows by ingredient and sums their amounts. Items come out sorted by
    /// name, then id, so the same list always renders the same text. A total that
    /// does not fit in an `i64` is an error, never a wrapped value.
    pub fn aggregate(
        header: impl Into<String>,
        rows: impl IntoIterator<Item = ShoppingRow>,
    ) -> AppResult<Self> {
        let mut totals: BTreeMap<i64, ShoppingItem> = BTreeMap::new();

        for row in rows {
            match totals.entry(row.ingredient_id) {
                Entry::Occupied(mut entry) => {
                    let item = entry.get_mut();
                    item.amount = item.amount.checked_add(row.amount).ok_or_else(|| {
                        AppError::InternalServerError(format!(
                            "Shopping list total for {} overflows",
                            item.name
                        ))
                    })?;
                }
                Entry::Vacant(entry) => {
                    entry.insert(ShoppingItem {
                        ingredient_id: row.ingredient_id,
                        name: row.name,
                        measurement_unit: row.measurement_unit,
                        amount: row.amount,
                    });
                }
            }
        }

        let mut items: Vec<ShoppingItem> = totals.into_values().collect();
        items.sort_by(|a, b| a.name.cmp(&b.name).then(a.ingredient_id.cmp(&b.ingredient_id)));

        Ok(ShoppingReport {
            header: header.into(),
            items,
        })
    }

    pub fn lines(&self) -> Vec<String> {
        self.items.iter().map(ShoppingItem::line).collect()
    }

    pub fn render(&self) -> String {
        let mut text = format!("{}\n", self.header);
        for line in self.lines() {
            text.push_str(&line);
            text.push('\n');
        }
        text
    }
}
