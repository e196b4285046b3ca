//! Identity ids serialized as JSON strings.
//!
//! Chat-platform snowflakes exceed 2^53, so JavaScript consumers lose
//! precision on numeric ids. Serialization always emits strings;
//! deserialization accepts both forms.

use serde::de::Error;
use serde::{Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum U64Input {
    String(String),
    Number(u64),
}

impl U64Input {
    fn into_u64<E: Error>(self) -> Result<u64, E> {
        match self {
            Self::String(raw) => raw.parse::<u64>().map_err(E::custom),
            Self::Number(value) => Ok(value),
        }
    }
}

pub fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_string())
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    U64Input::deserialize(deserializer)?.into_u64()
}

/// Adapter for `Option<u64>` fields.
pub mod option {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::U64Input;

    pub fn serialize<S>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(id) => serializer.serialize_some(&id.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<U64Input> = Option::deserialize(deserializer)?;
        raw.map(U64Input::into_u64).transpose()
    }
}

/// Adapter for `Vec<u64>` fields.
pub mod seq {
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::U64Input;

    pub fn serialize<S>(values: &[u64], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(values.len()))?;
        for value in values {
            seq.serialize_element(&value.to_string())?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Vec<U64Input> = Vec::deserialize(deserializer)?;
        raw.into_iter().map(U64Input::into_u64).collect()
    }
}

/// Adapter for `Vec<Vec<u64>>` fields (presence groups).
pub mod nested_seq {
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::U64Input;

    pub fn serialize<S>(groups: &[Vec<u64>], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(groups.len()))?;
        for group in groups {
            let encoded: Vec<String> = group.iter().map(u64::to_string).collect();
            seq.serialize_element(&encoded)?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Vec<u64>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Vec<Vec<U64Input>> = Vec::deserialize(deserializer)?;
        raw.into_iter()
            .map(|group| group.into_iter().map(U64Input::into_u64).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
    struct Wrapper {
        #[serde(with = "super")]
        id: u64,
        #[serde(with = "super::option")]
        boss: Option<u64>,
        #[serde(with = "super::seq")]
        subordinates: Vec<u64>,
    }

    #[test]
    fn deserialize_accepts_string() {
        let parsed: Wrapper =
            serde_json::from_str(r#"{"id":"1337","boss":null,"subordinates":[]}"#)
                .expect("string id");
        assert_eq!(parsed.id, 1337);
    }

    #[test]
    fn deserialize_accepts_number() {
        let parsed: Wrapper = serde_json::from_str(r#"{"id":1337,"boss":7,"subordinates":[3]}"#)
            .expect("numeric id");
        assert_eq!(parsed.id, 1337);
        assert_eq!(parsed.boss, Some(7));
        assert_eq!(parsed.subordinates, vec![3]);
    }

    #[test]
    fn serialize_emits_strings() {
        let wrapper = Wrapper {
            id: 18446744073709551615,
            boss: Some(42),
            subordinates: vec![1, 2],
        };
        let json = serde_json::to_string(&wrapper).expect("serialize");
        assert_eq!(
            json,
            r#"{"id":"18446744073709551615","boss":"42","subordinates":["1","2"]}"#
        );
    }

    #[test]
    fn round_trip() {
        let wrapper = Wrapper {
            id: 9,
            boss: None,
            subordinates: vec![10, 11, 12],
        };
        let json = serde_json::to_string(&wrapper).expect("serialize");
        let decoded: Wrapper = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(wrapper, decoded);
    }
}
