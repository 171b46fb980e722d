use async_trait::async_trait;

use super::{
    error::DomainError,
    schema::{
        CartPart, Id, Recipe, RecipeDraft, RecipeIngredientRow, RecipePatch, Relation,
        RelationKind, Tag,
    },
};

/// Persistence of follow, favorite and shopping cart rows.
///
/// Implementations must rely on a uniqueness guarantee of the storage so that
/// at most one row exists per (kind, actor, target), even under concurrent
/// inserts.
#[async_trait]
pub trait RelationStore: Send + Sync {
    /// Whether the user (follow) or recipe (favorite, cart) being targeted exists.
    async fn target_exists(&self, kind: RelationKind, target_id: Id) -> Result<bool, DomainError>;

    /// Inserts the row. `None` when the pair already exists.
    async fn insert_relation(
        &self,
        kind: RelationKind,
        actor_id: Id,
        target_id: Id,
    ) -> Result<Option<Relation>, DomainError>;

    /// Deletes the row. `false` when there was nothing to delete.
    async fn delete_relation(
        &self,
        kind: RelationKind,
        actor_id: Id,
        target_id: Id,
    ) -> Result<bool, DomainError>;

    async fn relation_exists(
        &self,
        kind: RelationKind,
        actor_id: Id,
        target_id: Id,
    ) -> Result<bool, DomainError>;

    /// Every recipe ingredient of every recipe in the user's shopping cart.
    async fn cart_parts(&self, user_id: Id) -> Result<Vec<CartPart>, DomainError>;
}

/// Persistence of recipes together with their ingredient and tag sets.
///
/// Writes are atomic: either the recipe and all of its rows are stored, or
/// nothing is.
#[async_trait]
pub trait RecipeStore: Send + Sync {
    async fn get_recipe(&self, id: Id) -> Result<Option<Recipe>, DomainError>;

    async fn recipe_ingredients(&self, id: Id) -> Result<Vec<RecipeIngredientRow>, DomainError>;

    async fn recipe_tags(&self, id: Id) -> Result<Vec<Tag>, DomainError>;

    async fn insert_recipe(&self, author_id: Id, draft: &RecipeDraft) -> Result<Id, DomainError>;

    /// `false` when no recipe exists with the id.
    async fn update_recipe(&self, id: Id, patch: &RecipePatch) -> Result<bool, DomainError>;

    /// Removes the recipe with its ingredient rows, tag links, favorites and
    /// cart entries. `false` when no recipe exists with the id.
    async fn delete_recipe(&self, id: Id) -> Result<bool, DomainError>;
}
