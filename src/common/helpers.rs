// Helper functions for safe logging and JSON column handling

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Masks email addresses for safe logging
/// Prevents sensitive data exposure while preserving debugging utility
///
/// # Example
/// ```ignore
/// let masked = safe_email_log("user@example.com");
/// // Returns: "u***@example.com"
/// ```
pub fn safe_email_log(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
            let first: String = local.chars().take(1).collect();
            format!("{}***@{}", first, domain)
        }
        _ => "***@***.***".to_string(),
    }
}

/// Decodes a stored itinerary-id set.
///
/// Anything that is not a JSON array decodes to the empty set. Elements that
/// are neither integers nor numeric strings are dropped and duplicates are
/// collapsed, keeping first-seen order.
pub fn parse_id_set(raw: Option<&str>) -> Vec<i64> {
    let values = match raw.map(serde_json::from_str::<Value>) {
        Some(Ok(Value::Array(values))) => values,
        _ => return Vec::new(),
    };

    let mut ids: Vec<i64> = Vec::with_capacity(values.len());
    for value in values {
        let id = match value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        if let Some(id) = id {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}

/// Encodes an itinerary-id set for storage.
pub fn encode_id_set(ids: &[i64]) -> String {
    serde_json::to_string(ids).unwrap_or_else(|_| "[]".to_string())
}

/// Decodes a stored JSON array column (tags, destinations), repairing
/// malformed or non-array content to an empty array.
pub fn parse_json_array(raw: Option<&str>) -> Vec<Value> {
    match raw.map(serde_json::from_str::<Value>) {
        Some(Ok(Value::Array(values))) => values,
        _ => Vec::new(),
    }
}

/// Accepts an id sent either as a JSON number or as a numeric string.
pub fn deserialize_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| serde::de::Error::custom("id must be an integer")),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| serde::de::Error::custom("id must be an integer")),
        _ => Err(serde::de::Error::custom("id must be an integer")),
    }
}

/// Tri-state field for partial updates.
///
/// A field missing from the payload is `Absent`, an explicit JSON `null` is
/// `Clear`. Use with `#[serde(default)]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Patch<T> {
    #[default]
    Absent,
    Clear,
    Set(T),
}

impl<'de, T> Deserialize<'de> for Patch<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Patch::Set(value),
            None => Patch::Clear,
        })
    }
}

impl Patch<String> {
    /// Blank strings count as "leave unchanged", matching what older clients send.
    pub fn normalized(self) -> Patch<String> {
        match self {
            Patch::Set(value) if value.trim().is_empty() => Patch::Absent,
            Patch::Set(value) => Patch::Set(value.trim().to_string()),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_email_log() {
        assert_eq!(safe_email_log("alice@example.com"), "a***@example.com");
        assert_eq!(safe_email_log("no-at-sign"), "***@***.***");
        assert_eq!(safe_email_log("@example.com"), "***@***.***");
        assert_eq!(safe_email_log("éa@example.com"), "é***@example.com");
    }

    #[test]
    fn test_parse_id_set_is_lenient() {
        assert_eq!(parse_id_set(Some("[1, 2, 3]")), vec![1, 2, 3]);
        assert_eq!(parse_id_set(Some("[\"4\", 5, 5, 4]")), vec![4, 5]);
        assert_eq!(parse_id_set(Some("[1, null, {\"a\":1}, 2.5, 3]")), vec![1, 3]);
        assert!(parse_id_set(Some("not json")).is_empty());
        assert!(parse_id_set(Some("{\"id\": 1}")).is_empty());
        assert!(parse_id_set(Some("")).is_empty());
        assert!(parse_id_set(None).is_empty());
    }

    #[test]
    fn test_encode_id_set() {
        assert_eq!(encode_id_set(&[]), "[]");
        assert_eq!(encode_id_set(&[3, 1]), "[3,1]");
    }

    #[test]
    fn test_parse_json_array_repairs_garbage() {
        assert_eq!(parse_json_array(Some("[\"museum\"]")).len(), 1);
        assert!(parse_json_array(Some("\"museum\"")).is_empty());
        assert!(parse_json_array(Some("[")).is_empty());
    }

    #[derive(Deserialize)]
    struct IdPayload {
        #[serde(deserialize_with = "deserialize_id")]
        id: i64,
    }

    #[test]
    fn test_deserialize_id_accepts_numbers_and_strings() {
        let numeric: IdPayload = serde_json::from_str(r#"{"id": 12}"#).unwrap();
        assert_eq!(numeric.id, 12);
        let text: IdPayload = serde_json::from_str(r#"{"id": " 12 "}"#).unwrap();
        assert_eq!(text.id, 12);
        assert!(serde_json::from_str::<IdPayload>(r#"{"id": "twelve"}"#).is_err());
        assert!(serde_json::from_str::<IdPayload>(r#"{"id": 1.5}"#).is_err());
    }

    #[derive(Deserialize)]
    struct Payload {
        #[serde(default)]
        bio: Patch<String>,
    }

    #[test]
    fn test_patch_distinguishes_absent_null_and_value() {
        let absent: Payload = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.bio, Patch::Absent);

        let cleared: Payload = serde_json::from_str(r#"{"bio": null}"#).unwrap();
        assert_eq!(cleared.bio, Patch::Clear);

        let set: Payload = serde_json::from_str(r#"{"bio": " hi "}"#).unwrap();
        assert_eq!(set.bio.normalized(), Patch::Set("hi".to_string()));

        let blank: Payload = serde_json::from_str(r#"{"bio": "   "}"#).unwrap();
        assert_eq!(blank.bio.normalized(), Patch::Absent);
    }
}
