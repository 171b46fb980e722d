use crate::{
    error::DomainError,
    schema::{Id, Relation, RelationKind, ToggleMethod},
    store::RelationStore,
};

/// Adds or removes one follow, favorite or shopping cart row.
///
/// `Add` returns the created relation and fails with `Conflict` when the pair
/// already exists or a user tries to follow themselves. `Remove` returns
/// `None` and fails with `NotFound` when there is nothing to remove. A missing
/// target (user or recipe) is `NotFound` for both methods.
pub async fn toggle<S>(
    store: &S,
    kind: RelationKind,
    actor_id: Id,
    target_id: Id,
    method: ToggleMethod,
) -> Result<Option<Relation>, DomainError>
where
    S: RelationStore + ?Sized,
{
    if !store.target_exists(kind, target_id).await? {
        return Err(DomainError::NotFound(match kind {
            RelationKind::Follow => format!("User {target_id} doesn't exist"),
            RelationKind::Favorite | RelationKind::ShoppingCart => {
                format!("Recipe {target_id} doesn't exist")
            }
        }));
    }

    match method {
        ToggleMethod::Add => {
            if kind == RelationKind::Follow && actor_id == target_id {
                return Err(DomainError::conflict("You cannot subscribe to yourself"));
            }

            match store.insert_relation(kind, actor_id, target_id).await {
                Ok(Some(relation)) => {
                    log::debug!(
                        "Added {target_id} to {} of user {actor_id}",
                        kind.label()
                    );
                    Ok(Some(relation))
                }
                Ok(None) | Err(DomainError::Conflict(_)) => Err(DomainError::Conflict(format!(
                    "Already in your {}",
                    kind.label()
                ))),
                Err(e) => Err(e),
            }
        }
        ToggleMethod::Remove => {
            if store.delete_relation(kind, actor_id, target_id).await? {
                log::debug!(
                    "Removed {target_id} from {} of user {actor_id}",
                    kind.label()
                );
                Ok(None)
            } else {
                Err(DomainError::NotFound(format!(
                    "Not in your {}",
                    kind.label()
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        memory::MemoryStore,
        schema::{RecipeDraft, UserRole},
        store::RecipeStore,
    };

    async fn recipe(store: &MemoryStore, author_id: Id) -> Id {
        let draft = RecipeDraft {
            name: String::from("Toast"),
            image: String::new(),
            text: String::from("Toast the bread."),
            cooking_time: 3,
            ingredients: vec![],
            tags: vec![],
        };
        store.insert_recipe(author_id, &draft).await.unwrap()
    }

    #[tokio::test]
    async fn following_oneself_is_a_conflict() {
        let store = MemoryStore::new();
        let anna = store.create_user("anna", UserRole::User).await;

        let result = toggle(
            &store,
            RelationKind::Follow,
            anna.id,
            anna.id,
            ToggleMethod::Add,
        )
        .await;

        assert!(matches!(result, Err(DomainError::Conflict(_))));
        assert!(!store
            .relation_exists(RelationKind::Follow, anna.id, anna.id)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn second_add_is_a_conflict() {
        let store = MemoryStore::new();
        let anna = store.create_user("anna", UserRole::User).await;
        let boris = store.create_user("boris", UserRole::User).await;

        let relation = toggle(&store, RelationKind::Follow, anna.id, boris.id, ToggleMethod::Add)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(relation.actor_id, anna.id);
        assert_eq!(relation.target_id, boris.id);

        let result = toggle(&store, RelationKind::Follow, anna.id, boris.id, ToggleMethod::Add).await;
        assert!(matches!(result, Err(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn removing_missing_favorite_is_not_found() {
        let store = MemoryStore::new();
        let anna = store.create_user("anna", UserRole::User).await;
        let recipe_id = recipe(&store, anna.id).await;

        let result = toggle(
            &store,
            RelationKind::Favorite,
            anna.id,
            recipe_id,
            ToggleMethod::Remove,
        )
        .await;

        assert!(matches!(result, Err(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn add_then_remove_leaves_no_row() {
        let store = MemoryStore::new();
        let anna = store.create_user("anna", UserRole::User).await;
        let recipe_id = recipe(&store, anna.id).await;

        for kind in [RelationKind::Favorite, RelationKind::ShoppingCart] {
            toggle(&store, kind, anna.id, recipe_id, ToggleMethod::Add)
                .await
                .unwrap();
            assert!(store.relation_exists(kind, anna.id, recipe_id).await.unwrap());

            let removed = toggle(&store, kind, anna.id, recipe_id, ToggleMethod::Remove)
                .await
                .unwrap();
            assert!(removed.is_none());
            assert!(!store.relation_exists(kind, anna.id, recipe_id).await.unwrap());
        }
    }

    #[tokio::test]
    async fn missing_target_is_not_found() {
        let store = MemoryStore::new();
        let anna = store.create_user("anna", UserRole::User).await;

        for kind in [
            RelationKind::Follow,
            RelationKind::Favorite,
            RelationKind::ShoppingCart,
        ] {
            let result = toggle(&store, kind, anna.id, 999, ToggleMethod::Add).await;
            assert!(matches!(result, Err(DomainError::NotFound(_))));
        }
    }

    #[tokio::test]
    async fn concurrent_adds_store_one_row() {
        let store = MemoryStore::new();
        let anna = store.create_user("anna", UserRole::User).await;
        let boris = store.create_user("boris", UserRole::User).await;

        let (first, second) = tokio::join!(
            toggle(&store, RelationKind::Follow, anna.id, boris.id, ToggleMethod::Add),
            toggle(&store, RelationKind::Follow, anna.id, boris.id, ToggleMethod::Add),
        );

        let results = [first, second];
        assert_eq!(results.iter().filter(|r| matches!(r, Ok(Some(_)))).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Err(DomainError::Conflict(_))))
                .count(),
            1
        );

        toggle(&store, RelationKind::Follow, anna.id, boris.id, ToggleMethod::Remove)
            .await
            .unwrap();
        assert!(!store
            .relation_exists(RelationKind::Follow, anna.id, boris.id)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn unknown_actor_cannot_follow() {
        let store = MemoryStore::new();
        let boris = store.create_user("boris", UserRole::User).await;

        let result = toggle(&store, RelationKind::Follow, 999, boris.id, ToggleMethod::Add).await;
        assert!(matches!(result, Err(DomainError::NotFound(_))));
        assert!(!store
            .relation_exists(RelationKind::Follow, 999, boris.id)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn relation_kinds_are_independent() {
        let store = MemoryStore::new();
        let anna = store.create_user("anna", UserRole::User).await;
        let recipe_id = recipe(&store, anna.id).await;

        toggle(&store, RelationKind::Favorite, anna.id, recipe_id, ToggleMethod::Add)
            .await
            .unwrap();

        let result = toggle(
            &store,
            RelationKind::ShoppingCart,
            anna.id,
            recipe_id,
            ToggleMethod::Remove,
        )
        .await;
        assert!(matches!(result, Err(DomainError::NotFound(_))));
    }
}
