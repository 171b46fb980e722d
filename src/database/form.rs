use std::{collections::HashMap, str::FromStr};

use serde_json::Value;

use super::{error::DomainError, schema::Id};

pub type FormData = HashMap<String, Value>;

/// Loosely typed query/form payload as handed over by the HTTP layer.
pub struct Form {
    inner: HashMap<String, Value>,
}

impl Form {
    pub fn from_data(data: FormData) -> Self {
        Self { inner: data }
    }

    pub fn get_value<T>(&self, key: &str) -> Result<T, DomainError>
    where
        T: TryFrom<Value>,
    {
        match self.inner.get(key) {
            Some(value) => value
                .to_owned()
                .try_into()
                .map_err(|_e| DomainError::Validation(format!("Invalid value for '{key}'"))),
            None => Err(DomainError::Validation(format!("Missing field '{key}'"))),
        }
    }

    /// Numbers arrive either as JSON numbers or as query-string text.
    pub fn get_number<T>(&self, key: &str) -> Result<T, DomainError>
    where
        T: FromStr,
    {
        match self.inner.get(key) {
            Some(value) => {
                let text = match value {
                    Value::String(v) => v.to_owned(),
                    Value::Number(v) => v.to_string(),
                    _ => {
                        return Err(DomainError::Validation(format!(
                            "Field '{key}' is not a number"
                        )))
                    }
                };

                text.trim()
                    .parse()
                    .map_err(|_e| DomainError::Validation(format!("Field '{key}' is not a number")))
            }
            None => Err(DomainError::Validation(format!("Missing field '{key}'"))),
        }
    }

    pub fn get_optional_number<T>(&self, key: &str) -> Result<Option<T>, DomainError>
    where
        T: FromStr,
    {
        match self.inner.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.get_number(key).map(Some),
        }
    }

    pub fn get_str(&self, key: &str) -> Result<String, DomainError> {
        match self.inner.get(key) {
            Some(value) => match value.as_str() {
                Some(v) => Ok(v.to_string()),
                None => Err(DomainError::Validation(format!("Field '{key}' is not text"))),
            },
            None => Err(DomainError::Validation(format!("Missing field '{key}'"))),
        }
    }

    /// `1`, `true` and `yes` count as set, anything else (or absence) as unset.
    pub fn get_flag(&self, key: &str) -> bool {
        match self.inner.get(key) {
            Some(Value::Bool(v)) => *v,
            Some(Value::Number(v)) => v.as_i64() == Some(1),
            Some(Value::String(v)) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"),
            _ => false,
        }
    }

    /// Accepts a JSON array of strings or a comma separated string.
    pub fn get_list(&self, key: &str) -> Vec<String> {
        match self.inner.get(key) {
            Some(Value::Array(values)) => values
                .iter()
                .filter_map(|v| v.as_str())
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
                .collect(),
            Some(Value::String(v)) => v
                .split(',')
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
                .collect(),
            _ => vec![],
        }
    }
}

/// Query filters of the recipe list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeFilter {
    pub author: Option<Id>,
    pub tags: Vec<String>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub offset: i64,
}

impl RecipeFilter {
    pub fn from_form(form: &Form) -> Result<Self, DomainError> {
        let offset: i64 = form.get_optional_number("offset")?.unwrap_or(0);
        if offset < 0 {
            return Err(DomainError::validation("Offset can't be negative"));
        }

        Ok(Self {
            author: form.get_optional_number("author")?,
            tags: form.get_list("tags"),
            is_favorited: form.get_flag("is_favorited"),
            is_in_shopping_cart: form.get_flag("is_in_shopping_cart"),
            offset,
        })
    }
}
