use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    constants::USER_COUNT_PER_PAGE,
    error::DomainError,
    pagination::PageContext,
    schema::{CartPart, Id, Relation, RelationKind, Subscription},
    store::RelationStore,
};

#[async_trait]
impl RelationStore for Pool<Postgres> {
    async fn target_exists(&self, kind: RelationKind, target_id: Id) -> Result<bool, DomainError> {
        let row: Option<(i32,)> = sqlx::query_as(&format!(
            "SELECT id FROM {} WHERE id = $1",
            kind.target_table()
        ))
        .bind(target_id)
        .fetch_optional(self)
        .await?;

        Ok(row.is_some())
    }

    async fn insert_relation(
        &self,
        kind: RelationKind,
        actor_id: Id,
        target_id: Id,
    ) -> Result<Option<Relation>, DomainError> {
        // The unique (actor, target) constraint decides races between
        // concurrent inserts; the losing insert returns no row.
        let row: Option<(i32,)> = sqlx::query_as(&format!(
            "INSERT INTO {} ({}, {}) VALUES ($1, $2) ON CONFLICT DO NOTHING RETURNING id",
            kind.table(),
            kind.actor_column(),
            kind.target_column()
        ))
        .bind(actor_id)
        .bind(target_id)
        .fetch_optional(self)
        .await?;

        Ok(row.map(|(id,)| Relation {
            id,
            kind,
            actor_id,
            target_id,
        }))
    }

    async fn delete_relation(
        &self,
        kind: RelationKind,
        actor_id: Id,
        target_id: Id,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE {} = $1 AND {} = $2",
            kind.table(),
            kind.actor_column(),
            kind.target_column()
        ))
        .bind(actor_id)
        .bind(target_id)
        .execute(self)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn relation_exists(
        &self,
        kind: RelationKind,
        actor_id: Id,
        target_id: Id,
    ) -> Result<bool, DomainError> {
        let row: Option<(i32,)> = sqlx::query_as(&format!(
            "SELECT id FROM {} WHERE {} = $1 AND {} = $2",
            kind.table(),
            kind.actor_column(),
            kind.target_column()
        ))
        .bind(actor_id)
        .bind(target_id)
        .fetch_optional(self)
        .await?;

        Ok(row.is_some())
    }

    async fn cart_parts(&self, user_id: Id) -> Result<Vec<CartPart>, DomainError> {
        let rows: Vec<CartPart> = sqlx::query_as(
            "
            SELECT ri.recipe_id AS recipe_id, i.id AS ingredient_id, i.name AS name,
                   i.measurement_unit AS measurement_unit, ri.amount AS amount
            FROM shopping_cart c
            INNER JOIN recipe_ingredients ri ON ri.recipe_id = c.recipe_id
            INNER JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE c.user_id = $1
        ",
        )
        .bind(user_id)
        .fetch_all(self)
        .await?;

        Ok(rows)
    }
}

/// Authors followed by the user, alphabetically.
pub async fn fetch_subscriptions(
    user_id: Id,
    offset: i64,
    pool: &Pool<Postgres>,
) -> Result<PageContext<Subscription>, DomainError> {
    let rows: Vec<Subscription> = sqlx::query_as(
        "
        SELECT u.id, u.username, u.email, u.first_name, u.last_name,
               (SELECT COUNT(*) FROM recipes r WHERE r.author_id = u.id) AS recipes_count,
               COUNT(*) OVER() AS count
        FROM follows f
        INNER JOIN users u ON u.id = f.following_id
        WHERE f.follower_id = $1
        ORDER BY u.username
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(user_id)
    .bind(USER_COUNT_PER_PAGE)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total_count = rows.first().map(|s| s.count).unwrap_or(0);
    Ok(PageContext::from_rows(
        rows,
        total_count,
        USER_COUNT_PER_PAGE,
        offset,
    ))
}
