use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use super::{
    actions::normalize_ingredient,
    error::DomainError,
    schema::{
        CartPart, Id, Ingredient, IngredientAmount, IngredientRef, Recipe, RecipeDraft,
        RecipeIngredientRow, RecipePatch, Relation, RelationKind, Tag, User, UserRole,
    },
    store::{RecipeStore, RelationStore},
};

#[derive(Default)]
struct MemoryState {
    last_id: Id,
    users: BTreeMap<Id, User>,
    tags: BTreeMap<Id, Tag>,
    ingredients: BTreeMap<Id, Ingredient>,
    recipes: BTreeMap<Id, Recipe>,
    // (row id, recipe, ingredient, amount)
    recipe_ingredients: Vec<(Id, Id, Id, Decimal)>,
    recipe_tags: Vec<(Id, Id)>,
    relations: Vec<Relation>,
}

impl MemoryState {
    fn next_id(&mut self) -> Id {
        self.last_id += 1;
        self.last_id
    }

    fn find_ingredient(&self, name: &str, measurement_unit: &str) -> Option<Id> {
        self.ingredients
            .values()
            .find(|i| i.name == name && i.measurement_unit == measurement_unit)
            .map(|i| i.id)
    }

    fn check_tags(&self, tags: &[Id]) -> Result<(), DomainError> {
        match tags.iter().find(|id| !self.tags.contains_key(*id)) {
            Some(missing) => Err(DomainError::NotFound(format!("Tag {missing} doesn't exist"))),
            None => Ok(()),
        }
    }

    /// Validates every reference before anything is written, so a failing
    /// payload leaves the catalog untouched.
    fn check_ingredients(&self, ingredients: &[IngredientAmount]) -> Result<(), DomainError> {
        let mut seen: HashSet<(String, String)> = HashSet::new();

        for part in ingredients {
            let key = match &part.ingredient {
                IngredientRef::Existing { id } => match self.ingredients.get(id) {
                    Some(i) => (i.name.to_owned(), i.measurement_unit.to_owned()),
                    None => {
                        return Err(DomainError::NotFound(format!(
                            "Ingredient {id} doesn't exist"
                        )))
                    }
                },
                IngredientRef::New {
                    name,
                    measurement_unit,
                } => normalize_ingredient(name, measurement_unit)?,
            };

            if !seen.insert(key.clone()) {
                return Err(DomainError::Validation(format!(
                    "Ingredient '{}' is listed more than once",
                    key.0
                )));
            }
        }

        Ok(())
    }

    fn resolve_ingredient(&mut self, reference: &IngredientRef) -> Result<Id, DomainError> {
        match reference {
            IngredientRef::Existing { id } => Ok(*id),
            IngredientRef::New {
                name,
                measurement_unit,
            } => {
                let (name, measurement_unit) = normalize_ingredient(name, measurement_unit)?;
                if let Some(id) = self.find_ingredient(&name, &measurement_unit) {
                    return Ok(id);
                }

                let id = self.next_id();
                self.ingredients.insert(
                    id,
                    Ingredient {
                        id,
                        name,
                        measurement_unit,
                    },
                );
                Ok(id)
            }
        }
    }

    fn replace_ingredients(
        &mut self,
        recipe_id: Id,
        ingredients: &[IngredientAmount],
    ) -> Result<(), DomainError> {
        self.check_ingredients(ingredients)?;

        let mut rows = Vec::with_capacity(ingredients.len());
        for part in ingredients {
            let ingredient_id = self.resolve_ingredient(&part.ingredient)?;
            rows.push((ingredient_id, part.amount));
        }

        self.recipe_ingredients.retain(|(_, r, _, _)| *r != recipe_id);
        for (ingredient_id, amount) in rows {
            let id = self.next_id();
            self.recipe_ingredients
                .push((id, recipe_id, ingredient_id, amount));
        }

        Ok(())
    }

    fn replace_tags(&mut self, recipe_id: Id, tags: &[Id]) {
        self.recipe_tags.retain(|(r, _)| *r != recipe_id);
        for tag_id in tags {
            if !self.recipe_tags.contains(&(recipe_id, *tag_id)) {
                self.recipe_tags.push((recipe_id, *tag_id));
            }
        }
    }

    fn find_relation(&self, kind: RelationKind, actor_id: Id, target_id: Id) -> Option<usize> {
        self.relations
            .iter()
            .position(|r| r.kind == kind && r.actor_id == actor_id && r.target_id == target_id)
    }
}

/// In-process store with the same guarantees as the Postgres one: unique
/// relation pairs, atomic recipe writes and cascading recipe deletes.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create_user(&self, username: &str, role: UserRole) -> User {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        let user = User {
            id,
            username: username.to_owned(),
            email: format!("{username}@example.com"),
            first_name: String::new(),
            last_name: String::new(),
            password: String::new(),
            role,
            date_joined: Utc::now(),
        };

        state.users.insert(id, user.clone());
        user
    }

    pub async fn create_tag(&self, name: &str, slug: &str) -> Tag {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        let tag = Tag {
            id,
            name: name.to_owned(),
            slug: slug.to_owned(),
        };

        state.tags.insert(id, tag.clone());
        tag
    }

    /// Lookup-or-create by (name, unit).
    pub async fn create_ingredient(
        &self,
        name: &str,
        measurement_unit: &str,
    ) -> Result<Ingredient, DomainError> {
        let mut state = self.state.lock().await;
        let id = state.resolve_ingredient(&IngredientRef::New {
            name: name.to_owned(),
            measurement_unit: measurement_unit.to_owned(),
        })?;

        state
            .ingredients
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::Internal(String::from("Ingredient vanished")))
    }

    pub async fn ingredient_count(&self) -> usize {
        self.state.lock().await.ingredients.len()
    }
}

#[async_trait]
impl RelationStore for MemoryStore {
    async fn target_exists(&self, kind: RelationKind, target_id: Id) -> Result<bool, DomainError> {
        let state = self.state.lock().await;
        Ok(match kind {
            RelationKind::Follow => state.users.contains_key(&target_id),
            RelationKind::Favorite | RelationKind::ShoppingCart => {
                state.recipes.contains_key(&target_id)
            }
        })
    }

    async fn insert_relation(
        &self,
        kind: RelationKind,
        actor_id: Id,
        target_id: Id,
    ) -> Result<Option<Relation>, DomainError> {
        let mut state = self.state.lock().await;
        if !state.users.contains_key(&actor_id) {
            return Err(DomainError::NotFound(format!("User {actor_id} doesn't exist")));
        }
        if state.find_relation(kind, actor_id, target_id).is_some() {
            return Ok(None);
        }
        if kind == RelationKind::Follow && actor_id == target_id {
            return Err(DomainError::Validation(String::from(
                "follower_id must differ from following_id",
            )));
        }

        let relation = Relation {
            id: state.next_id(),
            kind,
            actor_id,
            target_id,
        };
        state.relations.push(relation.clone());
        Ok(Some(relation))
    }

    async fn delete_relation(
        &self,
        kind: RelationKind,
        actor_id: Id,
        target_id: Id,
    ) -> Result<bool, DomainError> {
        let mut state = self.state.lock().await;
        match state.find_relation(kind, actor_id, target_id) {
            Some(index) => {
                state.relations.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn relation_exists(
        &self,
        kind: RelationKind,
        actor_id: Id,
        target_id: Id,
    ) -> Result<bool, DomainError> {
        let state = self.state.lock().await;
        Ok(state.find_relation(kind, actor_id, target_id).is_some())
    }

    async fn cart_parts(&self, user_id: Id) -> Result<Vec<CartPart>, DomainError> {
        let state = self.state.lock().await;

        let parts = state
            .relations
            .iter()
            .filter(|r| r.kind == RelationKind::ShoppingCart && r.actor_id == user_id)
            .flat_map(|cart| {
                state
                    .recipe_ingredients
                    .iter()
                    .filter(move |(_, recipe_id, _, _)| *recipe_id == cart.target_id)
            })
            .filter_map(|(_, recipe_id, ingredient_id, amount)| {
                state.ingredients.get(ingredient_id).map(|i| CartPart {
                    recipe_id: *recipe_id,
                    ingredient_id: *ingredient_id,
                    name: i.name.to_owned(),
                    measurement_unit: i.measurement_unit.to_owned(),
                    amount: *amount,
                })
            })
            .collect();

        Ok(parts)
    }
}

#[async_trait]
impl RecipeStore for MemoryStore {
    async fn get_recipe(&self, id: Id) -> Result<Option<Recipe>, DomainError> {
        Ok(self.state.lock().await.recipes.get(&id).cloned())
    }

    async fn recipe_ingredients(&self, id: Id) -> Result<Vec<RecipeIngredientRow>, DomainError> {
        let state = self.state.lock().await;

        Ok(state
            .recipe_ingredients
            .iter()
            .filter(|(_, recipe_id, _, _)| *recipe_id == id)
            .filter_map(|(_, _, ingredient_id, amount)| {
                state
                    .ingredients
                    .get(ingredient_id)
                    .map(|i| RecipeIngredientRow {
                        id: i.id,
                        name: i.name.to_owned(),
                        measurement_unit: i.measurement_unit.to_owned(),
                        amount: *amount,
                    })
            })
            .collect())
    }

    async fn recipe_tags(&self, id: Id) -> Result<Vec<Tag>, DomainError> {
        let state = self.state.lock().await;

        let mut tags: Vec<Tag> = state
            .recipe_tags
            .iter()
            .filter(|(recipe_id, _)| *recipe_id == id)
            .filter_map(|(_, tag_id)| state.tags.get(tag_id).cloned())
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(tags)
    }

    async fn insert_recipe(&self, author_id: Id, draft: &RecipeDraft) -> Result<Id, DomainError> {
        let mut state = self.state.lock().await;

        if !state.users.contains_key(&author_id) {
            return Err(DomainError::NotFound(format!("User {author_id} doesn't exist")));
        }
        state.check_tags(&draft.tags)?;
        state.check_ingredients(&draft.ingredients)?;

        let id = state.next_id();
        state.recipes.insert(
            id,
            Recipe {
                id,
                author_id,
                name: draft.name.to_owned(),
                image: draft.image.to_owned(),
                text: draft.text.to_owned(),
                cooking_time: draft.cooking_time,
                pub_date: Utc::now(),
            },
        );
        state.replace_ingredients(id, &draft.ingredients)?;
        state.replace_tags(id, &draft.tags);

        Ok(id)
    }

    async fn update_recipe(&self, id: Id, patch: &RecipePatch) -> Result<bool, DomainError> {
        let mut state = self.state.lock().await;

        if !state.recipes.contains_key(&id) {
            return Ok(false);
        }
        if let Some(tags) = &patch.tags {
            state.check_tags(tags)?;
        }
        if let Some(ingredients) = &patch.ingredients {
            state.check_ingredients(ingredients)?;
        }

        if let Some(recipe) = state.recipes.get_mut(&id) {
            if let Some(name) = &patch.name {
                recipe.name = name.to_owned();
            }
            if let Some(image) = &patch.image {
                recipe.image = image.to_owned();
            }
            if let Some(text) = &patch.text {
                recipe.text = text.to_owned();
            }
            if let Some(cooking_time) = patch.cooking_time {
                recipe.cooking_time = cooking_time;
            }
        }
        if let Some(ingredients) = &patch.ingredients {
            state.replace_ingredients(id, ingredients)?;
        }
        if let Some(tags) = &patch.tags {
            state.replace_tags(id, tags);
        }

        Ok(true)
    }

    async fn delete_recipe(&self, id: Id) -> Result<bool, DomainError> {
        let mut state = self.state.lock().await;

        if state.recipes.remove(&id).is_none() {
            return Ok(false);
        }
        state.recipe_ingredients.retain(|(_, recipe_id, _, _)| *recipe_id != id);
        state.recipe_tags.retain(|(recipe_id, _)| *recipe_id != id);
        state.relations.retain(|r| {
            !matches!(r.kind, RelationKind::Favorite | RelationKind::ShoppingCart)
                || r.target_id != id
        });

        Ok(true)
    }
}
