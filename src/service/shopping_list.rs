use std::collections::BTreeMap;

use rust_decimal::Decimal;
use warp::{http::header, Reply};

use crate::{
    constants::{SHOPPING_LIST_CONTENT_TYPE, SHOPPING_LIST_FILENAME},
    error::DomainError,
    schema::{CartPart, Id, ShoppingListEntry},
    store::RelationStore,
};

/// Sums the cart of `user_id` into one line per (ingredient, unit), ordered
/// by ingredient name regardless of case. An empty cart gives an empty list.
pub async fn aggregate_shopping_list<S>(
    store: &S,
    user_id: Id,
) -> Result<Vec<ShoppingListEntry>, DomainError>
where
    S: RelationStore + ?Sized,
{
    let parts = store.cart_parts(user_id).await?;
    log::trace!("> Aggregating {} cart rows of user {user_id}", parts.len());

    aggregate_parts(parts)
}

/// Groups by (name, unit) and sums with a decimal accumulator. Lines that
/// share a name but not a unit stay separate. A total past the decimal range
/// is reported instead of wrapping or panicking.
pub fn aggregate_parts(parts: Vec<CartPart>) -> Result<Vec<ShoppingListEntry>, DomainError> {
    // (lowercased name, name, unit) keeps the order case-insensitive while
    // still separating names that differ only in case
    let mut totals: BTreeMap<(String, String, String), Decimal> = BTreeMap::new();

    for part in parts {
        let key = (
            part.name.to_lowercase(),
            part.name,
            part.measurement_unit,
        );

        match totals.get_mut(&key) {
            Some(total) => {
                *total = total.checked_add(part.amount).ok_or_else(|| {
                    DomainError::Validation(format!(
                        "Total amount of {} ({}) is too large",
                        key.1, key.2
                    ))
                })?;
            }
            None => {
                totals.insert(key, part.amount);
            }
        }
    }

    Ok(totals
        .into_iter()
        .map(|((_, name, measurement_unit), amount)| ShoppingListEntry {
            name,
            measurement_unit,
            amount: amount.normalize(),
        })
        .collect())
}

/// Plain-text document of the list, one ingredient per line.
pub fn render_shopping_list(entries: &[ShoppingListEntry]) -> String {
    if entries.is_empty() {
        return String::from("Shopping list is empty\n");
    }

    let mut document = String::from("Shopping list\n\n");
    for entry in entries {
        document += &format!(
            "- {} ({}): {}\n",
            entry.name, entry.measurement_unit, entry.amount
        );
    }

    document
}

/// The rendered list of `user_id` as a file download.
pub async fn export_shopping_list<S>(store: &S, user_id: Id) -> Result<impl Reply, DomainError>
where
    S: RelationStore + ?Sized,
{
    let entries = aggregate_shopping_list(store, user_id).await?;
    let document = render_shopping_list(&entries);

    Ok(warp::reply::with_header(
        warp::reply::with_header(document, header::CONTENT_TYPE, SHOPPING_LIST_CONTENT_TYPE),
        header::CONTENT_DISPOSITION,
        format!("attachment; filename=\"{SHOPPING_LIST_FILENAME}\""),
    ))
}
