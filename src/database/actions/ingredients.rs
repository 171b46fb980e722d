use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::DomainError,
    jwt::SessionData,
    permissions::ActionType,
    schema::{Id, Ingredient, IngredientRef},
};

/// Catalog entries whose name starts with `prefix`, case-insensitively.
pub async fn list_ingredients(
    prefix: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, DomainError> {
    let pattern = format!("{}%", escape_like(prefix.unwrap_or("").trim()));

    let list: Vec<Ingredient> = sqlx::query_as(
        "SELECT * FROM ingredients WHERE name ILIKE $1 ORDER BY LOWER(name), measurement_unit",
    )
    .bind(pattern)
    .fetch_all(pool)
    .await?;

    Ok(list)
}

pub async fn get_ingredient(
    id: Id,
    pool: &Pool<Postgres>,
) -> Result<Option<Ingredient>, DomainError> {
    let ingredient: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(ingredient)
}

pub async fn find_ingredient(
    name: &str,
    measurement_unit: &str,
    pool: &Pool<Postgres>,
) -> Result<Option<Ingredient>, DomainError> {
    let ingredient: Option<Ingredient> = sqlx::query_as(
        "SELECT * FROM ingredients WHERE name = $1 AND measurement_unit = $2",
    )
    .bind(name)
    .bind(measurement_unit)
    .fetch_optional(pool)
    .await?;

    Ok(ingredient)
}

/// Returns the catalog entry for (name, unit), creating it when missing.
pub async fn create_ingredient(
    name: &str,
    measurement_unit: &str,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Ingredient, DomainError> {
    session.authenticate(ActionType::ManageIngredients)?;

    let mut conn = pool.acquire().await?;
    upsert_ingredient(name, measurement_unit, &mut conn).await
}

pub(crate) async fn upsert_ingredient(
    name: &str,
    measurement_unit: &str,
    conn: &mut PgConnection,
) -> Result<Ingredient, DomainError> {
    let (name, measurement_unit) = normalize_ingredient(name, measurement_unit)?;

    // DO UPDATE instead of DO NOTHING so the existing row is returned too
    let ingredient: Ingredient = sqlx::query_as(
        "
        INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2)
        ON CONFLICT (name, measurement_unit) DO UPDATE SET name = EXCLUDED.name
        RETURNING *
    ",
    )
    .bind(name)
    .bind(measurement_unit)
    .fetch_one(&mut *conn)
    .await?;

    Ok(ingredient)
}

/// Resolves a recipe payload reference into a catalog id.
pub(crate) async fn resolve_ingredient(
    reference: &IngredientRef,
    conn: &mut PgConnection,
) -> Result<Id, DomainError> {
    match reference {
        IngredientRef::Existing { id } => {
            let row: Option<(i32,)> = sqlx::query_as("SELECT id FROM ingredients WHERE id = $1")
                .bind(*id)
                .fetch_optional(&mut *conn)
                .await?;

            row.map(|(id,)| id)
                .ok_or_else(|| DomainError::NotFound(format!("Ingredient {id} doesn't exist")))
        }
        IngredientRef::New {
            name,
            measurement_unit,
        } => Ok(upsert_ingredient(name, measurement_unit, conn).await?.id),
    }
}

/// Trims both parts; the catalog key is otherwise taken verbatim.
pub fn normalize_ingredient(
    name: &str,
    measurement_unit: &str,
) -> Result<(String, String), DomainError> {
    let name = name.trim();
    let measurement_unit = measurement_unit.trim();

    if name.is_empty() {
        return Err(DomainError::validation("Ingredient name is required"));
    }
    if measurement_unit.is_empty() {
        return Err(DomainError::validation("Measurement unit is required"));
    }

    Ok((name.to_owned(), measurement_unit.to_owned()))
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_and_requires_both_parts() {
        assert_eq!(
            normalize_ingredient("  flour ", " g").unwrap(),
            (String::from("flour"), String::from("g"))
        );
        assert!(normalize_ingredient(" ", "g").is_err());
        assert!(normalize_ingredient("flour", "").is_err());
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
    }
}
