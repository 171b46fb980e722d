use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::DomainError;

pub type Id = i32;

#[derive(
    Clone, Debug, PartialEq, PartialOrd, sqlx::Type, Serialize, Eq, Ord, Hash, Deserialize,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
}

impl TryFrom<Value> for UserRole {
    type Error = DomainError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value.as_str() {
            Some(value) => match value {
                "user" => Ok(Self::User),
                "admin" => Ok(Self::Admin),
                _ => Err(DomainError::validation("Invalid variant")),
            },
            None => Err(DomainError::validation("Failed to parse value as string")),
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct User {
    pub id: Id,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub role: UserRole,
    pub date_joined: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct UserRow {
    pub id: Id,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub date_joined: DateTime<Utc>,

    pub count: i64,
}

/// An author the user follows, as shown on the subscriptions page.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Subscription {
    pub id: Id,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub recipes_count: i64,

    pub count: i64,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Id,
    pub name: String,
    pub slug: String,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: Id,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Serialize)]
pub struct Recipe {
    pub id: Id,
    pub author_id: Id,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub pub_date: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct RecipeRow {
    pub id: Id,
    pub author_id: Id,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub pub_date: DateTime<Utc>,

    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,

    pub count: i64,
}

/// One ingredient line of a recipe, joined with the catalog entry.
#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Serialize)]
pub struct RecipeIngredientRow {
    pub id: Id,
    pub name: String,
    pub measurement_unit: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeDetail {
    pub id: Id,
    pub author: Id,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub ingredients: Vec<RecipeIngredientRow>,
    pub tags: Vec<Tag>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

/// Reference to a catalog ingredient inside a recipe payload: either an
/// existing row by id, or a (name, unit) pair that is looked up or created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IngredientRef {
    Existing { id: Id },
    New { name: String, measurement_unit: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientAmount {
    pub ingredient: IngredientRef,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeDraft {
    pub name: String,
    #[serde(default)]
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub ingredients: Vec<IngredientAmount>,
    #[serde(default)]
    pub tags: Vec<Id>,
}

/// Partial update. `None` keeps the stored value; `Some` replaces it,
/// including the full ingredient and tag sets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipePatch {
    pub name: Option<String>,
    pub image: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
    pub ingredients: Option<Vec<IngredientAmount>>,
    pub tags: Option<Vec<Id>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Follow,
    Favorite,
    ShoppingCart,
}

impl RelationKind {
    pub fn table(&self) -> &'static str {
        match self {
            RelationKind::Follow => "follows",
            RelationKind::Favorite => "favorites",
            RelationKind::ShoppingCart => "shopping_cart",
        }
    }

    pub fn actor_column(&self) -> &'static str {
        match self {
            RelationKind::Follow => "follower_id",
            RelationKind::Favorite | RelationKind::ShoppingCart => "user_id",
        }
    }

    pub fn target_column(&self) -> &'static str {
        match self {
            RelationKind::Follow => "following_id",
            RelationKind::Favorite | RelationKind::ShoppingCart => "recipe_id",
        }
    }

    pub fn target_table(&self) -> &'static str {
        match self {
            RelationKind::Follow => "users",
            RelationKind::Favorite | RelationKind::ShoppingCart => "recipes",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RelationKind::Follow => "subscriptions",
            RelationKind::Favorite => "favorites",
            RelationKind::ShoppingCart => "shopping cart",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleMethod {
    Add,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relation {
    pub id: Id,
    pub kind: RelationKind,
    pub actor_id: Id,
    pub target_id: Id,
}

/// Raw cart row: one recipe ingredient of one recipe in the user's cart.
#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct CartPart {
    pub recipe_id: Id,
    pub ingredient_id: Id,
    pub name: String,
    pub measurement_unit: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShoppingListEntry {
    pub name: String,
    pub measurement_unit: String,
    pub amount: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingredient_ref_accepts_both_shapes() {
        let payload = serde_json::json!([
            { "ingredient": { "id": 4 }, "amount": 10 },
            { "ingredient": { "name": "flour", "measurement_unit": "g" }, "amount": "250.5" }
        ]);

        let parsed: Vec<IngredientAmount> = serde_json::from_value(payload).unwrap();
        assert_eq!(parsed[0].ingredient, IngredientRef::Existing { id: 4 });
        assert_eq!(parsed[0].amount, Decimal::from(10));
        assert_eq!(
            parsed[1].ingredient,
            IngredientRef::New {
                name: String::from("flour"),
                measurement_unit: String::from("g"),
            }
        );
        assert_eq!(parsed[1].amount, Decimal::new(2505, 1));
    }

    #[test]
    fn role_parses_from_form_value() {
        assert_eq!(UserRole::try_from(Value::from("admin")), Ok(UserRole::Admin));
        assert!(UserRole::try_from(Value::from("creator")).is_err());
        assert!(UserRole::try_from(Value::from(3)).is_err());
    }
}
