use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::DomainError,
    jwt::SessionData,
    permissions::ActionType,
    schema::{Id, Tag},
};

/// Tag slugs are derived from the name when `slug` is missing or blank.
pub async fn create_tag(
    name: &str,
    slug: Option<&str>,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Tag, DomainError> {
    session.authenticate(ActionType::ManageTags)?;

    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("Tag name is required"));
    }

    let slug = match slug {
        Some(slug) if !slug.trim().is_empty() => slugify(slug),
        _ => slugify(name),
    };
    if slug.is_empty() {
        return Err(DomainError::validation("Tag slug can't be empty"));
    }

    let tag: Option<Tag> = sqlx::query_as(
        "INSERT INTO tags (name, slug) VALUES ($1, $2) ON CONFLICT DO NOTHING RETURNING *",
    )
    .bind(name)
    .bind(&slug)
    .fetch_optional(pool)
    .await?;

    tag.ok_or_else(|| DomainError::Conflict(format!("Tag '{name}' or slug '{slug}' already exists")))
}

pub async fn get_tag(id: Id, pool: &Pool<Postgres>) -> Result<Option<Tag>, DomainError> {
    let tag: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(tag)
}

pub async fn find_tag(slug: &str, pool: &Pool<Postgres>) -> Result<Option<Tag>, DomainError> {
    let tag: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE slug = $1")
        .bind(slug)
        .fetch_optional(pool)
        .await?;

    Ok(tag)
}

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, DomainError> {
    let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY name")
        .fetch_all(pool)
        .await?;

    Ok(list)
}

pub(crate) async fn list_recipe_tags(
    recipe_id: Id,
    conn: &mut PgConnection,
) -> Result<Vec<Tag>, DomainError> {
    let list: Vec<Tag> = sqlx::query_as(
        "
        SELECT t.*
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = $1
        ORDER BY t.name
    ",
    )
    .bind(recipe_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(list)
}

/// Replaces the tag links of a recipe. Every id must name an existing tag.
pub(crate) async fn replace_recipe_tags(
    recipe_id: Id,
    tags: &[Id],
    conn: &mut PgConnection,
) -> Result<(), DomainError> {
    let found: Vec<(i32,)> = sqlx::query_as("SELECT id FROM tags WHERE id = ANY($1)")
        .bind(tags.to_vec())
        .fetch_all(&mut *conn)
        .await?;

    if let Some(missing) = tags
        .iter()
        .find(|id| !found.iter().any(|(found,)| found == *id))
    {
        return Err(DomainError::NotFound(format!("Tag {missing} doesn't exist")));
    }

    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await?;

    for tag_id in tags {
        sqlx::query(
            "INSERT INTO recipe_tags (recipe_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(recipe_id)
        .bind(*tag_id)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Lowercase ASCII slug: letters and digits kept, everything else collapsed
/// into single dashes.
pub fn slugify(value: &str) -> String {
    let mut slug = String::new();

    for c in value.trim().chars().flat_map(|c| c.to_lowercase()) {
        if c.is_ascii_alphanumeric() || c == '_' {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }

    slug.trim_end_matches('-').to_owned()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("Breakfast", "breakfast")]
    #[case("  Quick & Easy ", "quick-easy")]
    #[case("Low_Fat--Dinner!", "low_fat-dinner")]
    #[case("Ужин", "")]
    fn slugify_cases(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(slugify(input), expected);
    }
}
