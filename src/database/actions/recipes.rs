use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};

use super::{
    ingredients::resolve_ingredient,
    tags::{list_recipe_tags, replace_recipe_tags},
};
use crate::{
    constants::RECIPE_COUNT_PER_PAGE,
    error::DomainError,
    form::RecipeFilter,
    pagination::PageContext,
    schema::{
        Id, IngredientAmount, Recipe, RecipeDraft, RecipeIngredientRow, RecipePatch, RecipeRow, Tag,
    },
    store::RecipeStore,
};

#[async_trait]
impl RecipeStore for Pool<Postgres> {
    async fn get_recipe(&self, id: Id) -> Result<Option<Recipe>, DomainError> {
        let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
            .bind(id)
            .fetch_optional(self)
            .await?;

        Ok(row)
    }

    async fn recipe_ingredients(&self, id: Id) -> Result<Vec<RecipeIngredientRow>, DomainError> {
        let rows: Vec<RecipeIngredientRow> = sqlx::query_as(
            "
            SELECT i.id AS id, i.name AS name, i.measurement_unit AS measurement_unit, ri.amount AS amount
            FROM recipe_ingredients ri
            INNER JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE ri.recipe_id = $1
            ORDER BY ri.id
        ",
        )
        .bind(id)
        .fetch_all(self)
        .await?;

        Ok(rows)
    }

    async fn recipe_tags(&self, id: Id) -> Result<Vec<Tag>, DomainError> {
        let mut conn = self.acquire().await?;
        list_recipe_tags(id, &mut conn).await
    }

    async fn insert_recipe(&self, author_id: Id, draft: &RecipeDraft) -> Result<Id, DomainError> {
        let mut tr = self.begin().await?;

        let recipe: (i32,) = sqlx::query_as(
            "
            INSERT INTO recipes (author_id, name, image, text, cooking_time)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
        ",
        )
        .bind(author_id)
        .bind(&draft.name)
        .bind(&draft.image)
        .bind(&draft.text)
        .bind(draft.cooking_time)
        .fetch_one(&mut *tr)
        .await?;

        let recipe_id = recipe.0;

        replace_recipe_ingredients(recipe_id, &draft.ingredients, &mut tr).await?;
        replace_recipe_tags(recipe_id, &draft.tags, &mut tr).await?;

        tr.commit().await?;
        Ok(recipe_id)
    }

    async fn update_recipe(&self, id: Id, patch: &RecipePatch) -> Result<bool, DomainError> {
        let mut tr = self.begin().await?;

        let result = sqlx::query(
            "
            UPDATE recipes SET
                name = COALESCE($2, name),
                image = COALESCE($3, image),
                text = COALESCE($4, text),
                cooking_time = COALESCE($5, cooking_time)
            WHERE id = $1
        ",
        )
        .bind(id)
        .bind(patch.name.as_deref())
        .bind(patch.image.as_deref())
        .bind(patch.text.as_deref())
        .bind(patch.cooking_time)
        .execute(&mut *tr)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        if let Some(ingredients) = &patch.ingredients {
            replace_recipe_ingredients(id, ingredients, &mut tr).await?;
        }
        if let Some(tags) = &patch.tags {
            replace_recipe_tags(id, tags, &mut tr).await?;
        }

        tr.commit().await?;
        Ok(true)
    }

    async fn delete_recipe(&self, id: Id) -> Result<bool, DomainError> {
        let mut tr = self.begin().await?;

        for table in [
            "recipe_ingredients",
            "recipe_tags",
            "favorites",
            "shopping_cart",
        ] {
            sqlx::query(&format!("DELETE FROM {table} WHERE recipe_id = $1"))
                .bind(id)
                .execute(&mut *tr)
                .await?;
        }

        let result = sqlx::query("DELETE FROM recipes WHERE id = $1")
            .bind(id)
            .execute(&mut *tr)
            .await?;

        tr.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Replace-set write of a recipe's ingredient rows: rows not listed are removed.
async fn replace_recipe_ingredients(
    recipe_id: Id,
    ingredients: &[IngredientAmount],
    conn: &mut PgConnection,
) -> Result<(), DomainError> {
    let mut resolved: Vec<(Id, &IngredientAmount)> = Vec::with_capacity(ingredients.len());
    let mut seen = HashSet::new();

    for part in ingredients {
        let ingredient_id = resolve_ingredient(&part.ingredient, &mut *conn).await?;
        if !seen.insert(ingredient_id) {
            return Err(DomainError::Validation(format!(
                "Ingredient {ingredient_id} is listed more than once"
            )));
        }
        resolved.push((ingredient_id, part));
    }

    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await?;

    for (ingredient_id, part) in resolved {
        sqlx::query(
            "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) VALUES ($1, $2, $3)",
        )
        .bind(recipe_id)
        .bind(ingredient_id)
        .bind(part.amount)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Recipe list, newest first, narrowed by the query filters. Favorite and
/// cart filters only apply for a known viewer.
pub async fn fetch_recipes(
    filter: &RecipeFilter,
    viewer: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipeRow>, DomainError> {
    let mut query: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT r.*, EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ",
    );
    query.push_bind(viewer);
    query.push(
        ") AS is_favorited, EXISTS (SELECT 1 FROM shopping_cart c WHERE c.recipe_id = r.id AND c.user_id = ",
    );
    query.push_bind(viewer);
    query.push(") AS is_in_shopping_cart, COUNT(*) OVER() AS count FROM recipes r WHERE TRUE");

    if let Some(author) = filter.author {
        query.push(" AND r.author_id = ");
        query.push_bind(author);
    }

    if !filter.tags.is_empty() {
        query.push(
            " AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id WHERE rt.recipe_id = r.id AND t.slug = ANY(",
        );
        query.push_bind(filter.tags.clone());
        query.push("))");
    }

    match viewer {
        Some(viewer) => {
            if filter.is_favorited {
                query.push(" AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ");
                query.push_bind(viewer);
                query.push(")");
            }
            if filter.is_in_shopping_cart {
                query.push(" AND EXISTS (SELECT 1 FROM shopping_cart c WHERE c.recipe_id = r.id AND c.user_id = ");
                query.push_bind(viewer);
                query.push(")");
            }
        }
        None => {
            if filter.is_favorited || filter.is_in_shopping_cart {
                return Ok(PageContext::no_rows());
            }
        }
    }

    query.push(" ORDER BY r.pub_date DESC, r.id DESC LIMIT ");
    query.push_bind(RECIPE_COUNT_PER_PAGE);
    query.push(" OFFSET ");
    query.push_bind(filter.offset);

    let rows: Vec<RecipeRow> = query.build_query_as::<RecipeRow>().fetch_all(pool).await?;

    log::trace!("> Fetched {} recipes at offset {}", rows.len(), filter.offset);

    let total_count = rows.first().map(|r| r.count).unwrap_or(0);
    Ok(PageContext::from_rows(
        rows,
        total_count,
        RECIPE_COUNT_PER_PAGE,
        filter.offset,
    ))
}
