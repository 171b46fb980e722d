use std::collections::HashSet;

use rust_decimal::Decimal;

use crate::{
    authentication::permissions::{Access, ActionType, Permission},
    constants::{
        AMOUNT_MAX_INTEGER_DIGITS, AMOUNT_MAX_SCALE, COOKING_TIME_MIN, RECIPE_NAME_MAX_LENGTH,
    },
    error::DomainError,
    jwt::SessionData,
    schema::{
        Id, IngredientAmount, IngredientRef, RecipeDetail, RecipeDraft, RecipePatch, RelationKind,
    },
    store::{RecipeStore, RelationStore},
};

fn validate_name(name: &str) -> Result<(), DomainError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("Recipe name is required"));
    }
    if name.chars().count() > RECIPE_NAME_MAX_LENGTH {
        return Err(DomainError::Validation(format!(
            "Recipe name can't be longer than {RECIPE_NAME_MAX_LENGTH} characters"
        )));
    }
    Ok(())
}

fn validate_text(text: &str) -> Result<(), DomainError> {
    if text.trim().is_empty() {
        return Err(DomainError::validation("Recipe text is required"));
    }
    Ok(())
}

fn validate_cooking_time(cooking_time: i32) -> Result<(), DomainError> {
    if cooking_time < COOKING_TIME_MIN {
        return Err(DomainError::Validation(format!(
            "Cooking time must be at least {COOKING_TIME_MIN} minute"
        )));
    }
    Ok(())
}

fn validate_amount(amount: Decimal) -> Result<(), DomainError> {
    if amount <= Decimal::ZERO {
        return Err(DomainError::validation("Ingredient amount must be positive"));
    }
    if amount.normalize().scale() > AMOUNT_MAX_SCALE {
        return Err(DomainError::Validation(format!(
            "Ingredient amount can't have more than {AMOUNT_MAX_SCALE} decimal places"
        )));
    }
    if amount.trunc() >= Decimal::from(10_i64.pow(AMOUNT_MAX_INTEGER_DIGITS)) {
        return Err(DomainError::Validation(format!(
            "Ingredient amount can't have more than {AMOUNT_MAX_INTEGER_DIGITS} integer digits"
        )));
    }
    Ok(())
}

fn validate_ingredients(ingredients: &[IngredientAmount]) -> Result<(), DomainError> {
    if ingredients.is_empty() {
        return Err(DomainError::validation("At least one ingredient is required"));
    }

    let mut seen: HashSet<&IngredientRef> = HashSet::new();
    for part in ingredients {
        validate_amount(part.amount)?;
        if !seen.insert(&part.ingredient) {
            return Err(DomainError::validation("Ingredient is listed more than once"));
        }
    }

    Ok(())
}

fn validate_tags(tags: &[Id]) -> Result<(), DomainError> {
    let mut seen = HashSet::new();
    if tags.iter().any(|id| !seen.insert(*id)) {
        return Err(DomainError::validation("Tag is listed more than once"));
    }
    Ok(())
}

pub fn validate_draft(draft: &RecipeDraft) -> Result<(), DomainError> {
    validate_name(&draft.name)?;
    validate_text(&draft.text)?;
    validate_cooking_time(draft.cooking_time)?;
    validate_ingredients(&draft.ingredients)?;
    validate_tags(&draft.tags)
}

pub fn validate_patch(patch: &RecipePatch) -> Result<(), DomainError> {
    if let Some(name) = &patch.name {
        validate_name(name)?;
    }
    if let Some(text) = &patch.text {
        validate_text(text)?;
    }
    if let Some(cooking_time) = patch.cooking_time {
        validate_cooking_time(cooking_time)?;
    }
    if let Some(ingredients) = &patch.ingredients {
        validate_ingredients(ingredients)?;
    }
    if let Some(tags) = &patch.tags {
        validate_tags(tags)?;
    }
    Ok(())
}

/// Full recipe view. `viewer` decides the favorite and cart flags.
pub async fn recipe_detail<S>(
    store: &S,
    viewer: Option<&SessionData>,
    recipe_id: Id,
) -> Result<RecipeDetail, DomainError>
where
    S: RecipeStore + RelationStore + ?Sized,
{
    let recipe = store
        .get_recipe(recipe_id)
        .await?
        .ok_or_else(|| DomainError::NotFound(format!("Recipe {recipe_id} doesn't exist")))?;

    let (is_favorited, is_in_shopping_cart) = match viewer {
        Some(viewer) => (
            store
                .relation_exists(RelationKind::Favorite, viewer.user_id, recipe_id)
                .await?,
            store
                .relation_exists(RelationKind::ShoppingCart, viewer.user_id, recipe_id)
                .await?,
        ),
        None => (false, false),
    };

    Ok(RecipeDetail {
        id: recipe.id,
        author: recipe.author_id,
        ingredients: store.recipe_ingredients(recipe_id).await?,
        tags: store.recipe_tags(recipe_id).await?,
        name: recipe.name,
        image: recipe.image,
        text: recipe.text,
        cooking_time: recipe.cooking_time,
        is_favorited,
        is_in_shopping_cart,
    })
}

/// Stores a new recipe owned by `actor`. Ingredients given by (name, unit)
/// reuse the catalog entry when one exists.
pub async fn create_recipe<S>(
    store: &S,
    actor: &SessionData,
    draft: &RecipeDraft,
) -> Result<RecipeDetail, DomainError>
where
    S: RecipeStore + RelationStore + ?Sized,
{
    actor.authenticate(ActionType::CreateRecipes)?;
    validate_draft(draft)?;

    let recipe_id = store.insert_recipe(actor.user_id, draft).await?;
    log::info!("Recipe {recipe_id} created by user {}", actor.user_id);

    recipe_detail(store, Some(actor), recipe_id).await
}

/// Applies a partial update. Supplied ingredient and tag lists replace the
/// stored sets; ingredients left out of a supplied list are detached.
pub async fn update_recipe<S>(
    store: &S,
    actor: &SessionData,
    recipe_id: Id,
    patch: &RecipePatch,
) -> Result<RecipeDetail, DomainError>
where
    S: RecipeStore + RelationStore + ?Sized,
{
    let recipe = store
        .get_recipe(recipe_id)
        .await?
        .ok_or_else(|| DomainError::NotFound(format!("Recipe {recipe_id} doesn't exist")))?;

    Permission::IsAuthorOrReadOnly.check(Some(actor), Access::Write, Some(recipe.author_id))?;
    validate_patch(patch)?;

    if !store.update_recipe(recipe_id, patch).await? {
        return Err(DomainError::NotFound(format!(
            "Recipe {recipe_id} doesn't exist"
        )));
    }
    log::info!("Recipe {recipe_id} updated by user {}", actor.user_id);

    recipe_detail(store, Some(actor), recipe_id).await
}

/// Deletes the recipe together with its ingredient rows, favorites and cart
/// entries.
pub async fn delete_recipe<S>(store: &S, actor: &SessionData, recipe_id: Id) -> Result<(), DomainError>
where
    S: RecipeStore + ?Sized,
{
    let recipe = store
        .get_recipe(recipe_id)
        .await?
        .ok_or_else(|| DomainError::NotFound(format!("Recipe {recipe_id} doesn't exist")))?;

    Permission::IsAuthorOrReadOnly.check(Some(actor), Access::Write, Some(recipe.author_id))?;

    if !store.delete_recipe(recipe_id).await? {
        return Err(DomainError::NotFound(format!(
            "Recipe {recipe_id} doesn't exist"
        )));
    }
    log::info!("Recipe {recipe_id} deleted by user {}", actor.user_id);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flour(amount: i64) -> IngredientAmount {
        IngredientAmount {
            ingredient: IngredientRef::New {
                name: String::from("flour"),
                measurement_unit: String::from("g"),
            },
            amount: Decimal::from(amount),
        }
    }

    fn draft() -> RecipeDraft {
        RecipeDraft {
            name: String::from("Pancakes"),
            image: String::new(),
            text: String::from("Mix and fry."),
            cooking_time: 20,
            ingredients: vec![flour(200)],
            tags: vec![],
        }
    }

    #[test]
    fn valid_draft_passes() {
        assert!(validate_draft(&draft()).is_ok());
    }

    #[test]
    fn draft_rules() {
        let mut d = draft();
        d.name = String::from("  ");
        assert!(validate_draft(&d).is_err());

        let mut d = draft();
        d.cooking_time = 0;
        assert!(validate_draft(&d).is_err());

        let mut d = draft();
        d.ingredients = vec![];
        assert!(validate_draft(&d).is_err());

        let mut d = draft();
        d.ingredients = vec![flour(0)];
        assert!(validate_draft(&d).is_err());

        let mut d = draft();
        d.ingredients = vec![flour(100), flour(50)];
        assert!(validate_draft(&d).is_err());

        let mut d = draft();
        d.tags = vec![1, 1];
        assert!(validate_draft(&d).is_err());

        let mut d = draft();
        d.name = "x".repeat(RECIPE_NAME_MAX_LENGTH + 1);
        assert!(validate_draft(&d).is_err());
    }

    #[test]
    fn negative_amount_is_validation_error() {
        let mut d = draft();
        d.ingredients = vec![flour(-5)];
        assert_eq!(
            validate_draft(&d),
            Err(DomainError::validation("Ingredient amount must be positive"))
        );
    }

    #[test]
    fn amount_precision_is_bounded() {
        let mut d = draft();
        d.ingredients = vec![IngredientAmount {
            amount: Decimal::new(12345, 4),
            ..flour(1)
        }];
        assert!(matches!(validate_draft(&d), Err(DomainError::Validation(_))));

        // trailing zeros don't count as precision
        d.ingredients[0].amount = Decimal::new(12340, 4);
        assert!(validate_draft(&d).is_ok());

        d.ingredients[0].amount = Decimal::new(999_999_999_999, 3);
        assert!(validate_draft(&d).is_ok());

        d.ingredients[0].amount = Decimal::from(1_000_000_000);
        assert!(matches!(validate_draft(&d), Err(DomainError::Validation(_))));

        d.ingredients[0].amount = Decimal::MAX;
        assert!(matches!(validate_draft(&d), Err(DomainError::Validation(_))));
    }

    #[test]
    fn empty_patch_is_valid() {
        assert!(validate_patch(&RecipePatch::default()).is_ok());

        let patch = RecipePatch {
            ingredients: Some(vec![]),
            ..Default::default()
        };
        assert!(validate_patch(&patch).is_err());
    }

    mod store {
        use super::*;
        use crate::{
            memory::MemoryStore,
            schema::{ToggleMethod, UserRole},
            toggle::toggle,
        };

        fn part(name: &str, unit: &str, amount: i64) -> IngredientAmount {
            IngredientAmount {
                ingredient: IngredientRef::New {
                    name: name.to_owned(),
                    measurement_unit: unit.to_owned(),
                },
                amount: Decimal::from(amount),
            }
        }

        async fn session(store: &MemoryStore, username: &str, role: UserRole) -> SessionData {
            let user = store.create_user(username, role).await;
            SessionData::new(user.id, &user.username, user.role)
        }

        #[tokio::test]
        async fn create_reuses_catalog_ingredients() {
            let store = MemoryStore::new();
            let anna = session(&store, "anna", UserRole::User).await;
            let flour = store.create_ingredient("flour", "g").await.unwrap();
            let breakfast = store.create_tag("Breakfast", "breakfast").await;

            let mut d = draft();
            d.ingredients = vec![
                IngredientAmount {
                    ingredient: IngredientRef::Existing { id: flour.id },
                    amount: Decimal::from(200),
                },
                part("milk", "ml", 300),
            ];
            d.tags = vec![breakfast.id];

            let detail = create_recipe(&store, &anna, &d).await.unwrap();
            assert_eq!(detail.author, anna.user_id);
            assert_eq!(detail.ingredients.len(), 2);
            assert_eq!(detail.tags, vec![breakfast]);
            assert!(!detail.is_favorited);
            assert_eq!(store.ingredient_count().await, 2);

            let mut second = draft();
            second.ingredients = vec![part("milk", "ml", 100)];
            create_recipe(&store, &anna, &second).await.unwrap();
            assert_eq!(store.ingredient_count().await, 2);
        }

        #[tokio::test]
        async fn create_rejects_unknown_ingredient() {
            let store = MemoryStore::new();
            let anna = session(&store, "anna", UserRole::User).await;

            let mut d = draft();
            d.ingredients = vec![IngredientAmount {
                ingredient: IngredientRef::Existing { id: 4242 },
                amount: Decimal::ONE,
            }];

            let result = create_recipe(&store, &anna, &d).await;
            assert!(matches!(result, Err(DomainError::NotFound(_))));
        }

        #[tokio::test]
        async fn update_replaces_ingredient_set() {
            let store = MemoryStore::new();
            let anna = session(&store, "anna", UserRole::User).await;

            let mut d = draft();
            d.ingredients = vec![part("flour", "g", 200), part("egg", "pcs", 2)];
            let created = create_recipe(&store, &anna, &d).await.unwrap();

            let patch = RecipePatch {
                cooking_time: Some(35),
                ingredients: Some(vec![part("flour", "g", 250)]),
                ..Default::default()
            };
            let updated = update_recipe(&store, &anna, created.id, &patch)
                .await
                .unwrap();

            assert_eq!(updated.name, "Pancakes");
            assert_eq!(updated.cooking_time, 35);
            assert_eq!(updated.ingredients.len(), 1);
            assert_eq!(updated.ingredients[0].name, "flour");
            assert_eq!(updated.ingredients[0].amount, Decimal::from(250));
        }

        #[tokio::test]
        async fn update_without_lists_keeps_them() {
            let store = MemoryStore::new();
            let anna = session(&store, "anna", UserRole::User).await;
            let created = create_recipe(&store, &anna, &draft()).await.unwrap();

            let patch = RecipePatch {
                name: Some(String::from("Crepes")),
                ..Default::default()
            };
            let updated = update_recipe(&store, &anna, created.id, &patch)
                .await
                .unwrap();

            assert_eq!(updated.name, "Crepes");
            assert_eq!(updated.ingredients, created.ingredients);
        }

        #[tokio::test]
        async fn only_author_or_admin_may_write() {
            let store = MemoryStore::new();
            let anna = session(&store, "anna", UserRole::User).await;
            let boris = session(&store, "boris", UserRole::User).await;
            let root = session(&store, "root", UserRole::Admin).await;
            let created = create_recipe(&store, &anna, &draft()).await.unwrap();

            let patch = RecipePatch {
                text: Some(String::from("Different text.")),
                ..Default::default()
            };
            let result = update_recipe(&store, &boris, created.id, &patch).await;
            assert!(matches!(result, Err(DomainError::Unauthorized(_))));

            let result = delete_recipe(&store, &boris, created.id).await;
            assert!(matches!(result, Err(DomainError::Unauthorized(_))));

            update_recipe(&store, &root, created.id, &patch)
                .await
                .unwrap();
            delete_recipe(&store, &root, created.id).await.unwrap();
        }

        #[tokio::test]
        async fn update_of_missing_recipe_is_not_found() {
            let store = MemoryStore::new();
            let anna = session(&store, "anna", UserRole::User).await;

            let result = update_recipe(&store, &anna, 77, &RecipePatch::default()).await;
            assert!(matches!(result, Err(DomainError::NotFound(_))));
        }

        #[tokio::test]
        async fn invalid_patch_is_rejected_before_writing() {
            let store = MemoryStore::new();
            let anna = session(&store, "anna", UserRole::User).await;
            let created = create_recipe(&store, &anna, &draft()).await.unwrap();

            let patch = RecipePatch {
                name: Some(String::from("Renamed")),
                cooking_time: Some(0),
                ..Default::default()
            };
            let result = update_recipe(&store, &anna, created.id, &patch).await;
            assert!(matches!(result, Err(DomainError::Validation(_))));

            let detail = recipe_detail(&store, None, created.id).await.unwrap();
            assert_eq!(detail.name, "Pancakes");
        }

        #[tokio::test]
        async fn delete_cascades_to_relations() {
            let store = MemoryStore::new();
            let anna = session(&store, "anna", UserRole::User).await;
            let boris = session(&store, "boris", UserRole::User).await;
            let created = create_recipe(&store, &anna, &draft()).await.unwrap();

            for kind in [RelationKind::Favorite, RelationKind::ShoppingCart] {
                toggle(&store, kind, boris.user_id, created.id, ToggleMethod::Add)
                    .await
                    .unwrap();
            }
            let seen = recipe_detail(&store, Some(&boris), created.id).await.unwrap();
            assert!(seen.is_favorited);
            assert!(seen.is_in_shopping_cart);

            delete_recipe(&store, &anna, created.id).await.unwrap();

            assert!(store.get_recipe(created.id).await.unwrap().is_none());
            assert!(store.recipe_ingredients(created.id).await.unwrap().is_empty());
            assert!(store.cart_parts(boris.user_id).await.unwrap().is_empty());
            assert!(!store
                .relation_exists(RelationKind::Favorite, boris.user_id, created.id)
                .await
                .unwrap());

            let result = delete_recipe(&store, &anna, created.id).await;
            assert!(matches!(result, Err(DomainError::NotFound(_))));
        }
    }
}
