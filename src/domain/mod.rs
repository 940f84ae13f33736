//! Domain types and DTOs

use serde::{Deserialize, Deserializer};

pub mod heroes;
pub mod users;

pub(crate) fn default_true() -> bool {
    true
}

/// Tell an explicit `null` apart from an absent field.
///
/// Use with `#[serde(default)]`: absent gives `None`, `null` gives
/// `Some(None)`, a value gives `Some(Some(v))`.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// An empty query value counts as not given
pub(crate) fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        team: Option<Option<String>>,
    }

    #[test]
    fn null_and_absent_are_distinct() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        let cleared: Patch = serde_json::from_str(r#"{"team": null}"#).unwrap();
        let set: Patch = serde_json::from_str(r#"{"team": "X-Men"}"#).unwrap();

        assert_eq!(absent.team, None);
        assert_eq!(cleared.team, Some(None));
        assert_eq!(set.team, Some(Some("X-Men".to_string())));
    }
}
