//! Serde support.
//!
//! A map serializes as a two-field struct: its load factor followed by the
//! live entries as a sequence of pairs, so the growth policy survives a round
//! trip alongside the contents. The view types serialize as independent
//! snapshots of their members rather than as references to the backing map.

use core::{
    cmp,
    fmt,
    hash::{BuildHasher, Hash},
    marker::PhantomData,
};

use serde::{
    de::{self, DeserializeSeed, MapAccess, SeqAccess, Visitor},
    ser::SerializeStruct,
    Deserialize, Deserializer, Serialize, Serializer,
};

use crate::{
    EntrySet, KeySet, UnifiedMap, ValuesCollection, DEFAULT_INITIAL_CAPACITY,
};

mod size_hint {
    use core::cmp;

    /// Caps untrusted length hints so a hostile stream cannot force a huge
    /// up-front allocation.
    ///
    /// Original discussion: https://github.com/serde-rs/serde/issues/1114.
    #[inline]
    pub(super) fn cautious(hint: Option<usize>) -> usize {
        cmp::min(hint.unwrap_or(0), 4096)
    }
}

const FIELDS: &[&str] = &["load_factor", "entries"];

impl<K, V, S> Serialize for UnifiedMap<K, V, S>
where
    K: Serialize,
    V: Serialize,
{
    fn serialize<Sr>(&self, serializer: Sr) -> Result<Sr::Ok, Sr::Error>
    where
        Sr: Serializer,
    {
        let mut state = serializer.serialize_struct("UnifiedMap", 2)?;
        state.serialize_field("load_factor", &self.load_factor())?;
        state.serialize_field("entries", &Entries(self))?;
        state.end()
    }
}

struct Entries<'a, K, V, S>(&'a UnifiedMap<K, V, S>);

impl<K, V, S> Serialize for Entries<'_, K, V, S>
where
    K: Serialize,
    V: Serialize,
{
    #[inline]
    fn serialize<Sr>(&self, serializer: Sr) -> Result<Sr::Ok, Sr::Error>
    where
        Sr: Serializer,
    {
        serializer.collect_seq(self.0.iter())
    }
}

enum Field {
    LoadFactor,
    Entries,
}

impl<'de> Deserialize<'de> for Field {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FieldVisitor;

        impl Visitor<'_> for FieldVisitor {
            type Value = Field;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("`load_factor` or `entries`")
            }

            fn visit_str<E>(self, value: &str) -> Result<Field, E>
            where
                E: de::Error,
            {
                match value {
                    "load_factor" => Ok(Field::LoadFactor),
                    "entries" => Ok(Field::Entries),
                    _ => Err(de::Error::unknown_field(value, FIELDS)),
                }
            }
        }

        deserializer.deserialize_identifier(FieldVisitor)
    }
}

/// Deserializes the entry sequence into a map built with an already-read load
/// factor.
struct EntriesSeed<K, V, S> {
    load_factor: f32,
    marker: PhantomData<UnifiedMap<K, V, S>>,
}

impl<'de, K, V, S> DeserializeSeed<'de> for EntriesSeed<K, V, S>
where
    K: Deserialize<'de> + Eq + Hash,
    V: Deserialize<'de>,
    S: BuildHasher + Default,
{
    type Value = UnifiedMap<K, V, S>;

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EntriesVisitor<K, V, S> {
            load_factor: f32,
            marker: PhantomData<UnifiedMap<K, V, S>>,
        }

        impl<'de, K, V, S> Visitor<'de> for EntriesVisitor<K, V, S>
        where
            K: Deserialize<'de> + Eq + Hash,
            V: Deserialize<'de>,
            S: BuildHasher + Default,
        {
            type Value = UnifiedMap<K, V, S>;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a sequence of key-value pairs")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let hint = size_hint::cautious(seq.size_hint());
                let mut map = UnifiedMap::with_capacity_and_load_factor_and_hasher(
                    cmp::max(hint + 1, DEFAULT_INITIAL_CAPACITY),
                    self.load_factor,
                    S::default(),
                );
                while let Some((key, value)) = seq.next_element()? {
                    map.put(key, value);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_seq(EntriesVisitor {
            load_factor: self.load_factor,
            marker: PhantomData,
        })
    }
}

impl<'de, K, V, S> Deserialize<'de> for UnifiedMap<K, V, S>
where
    K: Deserialize<'de> + Eq + Hash,
    V: Deserialize<'de>,
    S: BuildHasher + Default,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct MapVisitor<K, V, S> {
            marker: PhantomData<UnifiedMap<K, V, S>>,
        }

        impl<'de, K, V, S> Visitor<'de> for MapVisitor<K, V, S>
        where
            K: Deserialize<'de> + Eq + Hash,
            V: Deserialize<'de>,
            S: BuildHasher + Default,
        {
            type Value = UnifiedMap<K, V, S>;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a unified map")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let load_factor: f32 = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                seq.next_element_seed(EntriesSeed {
                    load_factor,
                    marker: PhantomData,
                })?
                .ok_or_else(|| de::Error::invalid_length(1, &self))
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut load_factor: Option<f32> = None;
                let mut map: Option<UnifiedMap<K, V, S>> = None;
                while let Some(field) = access.next_key::<Field>()? {
                    match field {
                        Field::LoadFactor => {
                            if load_factor.is_some() {
                                return Err(de::Error::duplicate_field("load_factor"));
                            }
                            load_factor = Some(access.next_value()?);
                        }
                        Field::Entries => {
                            if map.is_some() {
                                return Err(de::Error::duplicate_field("entries"));
                            }
                            let load_factor = load_factor
                                .ok_or_else(|| de::Error::missing_field("load_factor"))?;
                            map = Some(access.next_value_seed(EntriesSeed {
                                load_factor,
                                marker: PhantomData,
                            })?);
                        }
                    }
                }
                map.ok_or_else(|| de::Error::missing_field("entries"))
            }
        }

        deserializer.deserialize_struct(
            "UnifiedMap",
            FIELDS,
            MapVisitor {
                marker: PhantomData,
            },
        )
    }
}

impl<K, V, S> Serialize for KeySet<'_, K, V, S>
where
    K: Serialize,
{
    /// Writes an independent snapshot of the keys.
    #[inline]
    fn serialize<Sr>(&self, serializer: Sr) -> Result<Sr::Ok, Sr::Error>
    where
        Sr: Serializer,
    {
        serializer.collect_seq(self.iter())
    }
}

impl<K, V, S> Serialize for EntrySet<'_, K, V, S>
where
    K: Serialize,
    V: Serialize,
{
    /// Writes an independent snapshot of the entries as pairs.
    #[inline]
    fn serialize<Sr>(&self, serializer: Sr) -> Result<Sr::Ok, Sr::Error>
    where
        Sr: Serializer,
    {
        serializer.collect_seq(self.iter())
    }
}

impl<K, V, S> Serialize for ValuesCollection<'_, K, V, S>
where
    V: Serialize,
{
    /// Writes an independent snapshot of the values.
    #[inline]
    fn serialize<Sr>(&self, serializer: Sr) -> Result<Sr::Ok, Sr::Error>
    where
        Sr: Serializer,
    {
        serializer.collect_seq(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use crate::UnifiedMap;

    #[test]
    fn round_trip_preserves_contents_and_load_factor() {
        let mut map = UnifiedMap::<String, i32>::with_capacity_and_load_factor(4, 0.5);
        for i in 0..10 {
            map.put(format!("k{i}"), i);
        }
        let encoded = serde_json::to_string(&map).unwrap();
        let decoded: UnifiedMap<String, i32> = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.len(), map.len());
        assert_eq!(decoded.load_factor(), 0.5);
        assert_eq!(decoded, map);
    }

    #[test]
    fn empty_map_round_trip() {
        let map = UnifiedMap::<i32, i32>::new();
        let encoded = serde_json::to_string(&map).unwrap();
        let decoded: UnifiedMap<i32, i32> = serde_json::from_str(&encoded).unwrap();
        assert!(decoded.is_empty());
        assert_eq!(decoded.load_factor(), map.load_factor());
    }

    #[test]
    fn views_serialize_as_snapshots() {
        let mut map: UnifiedMap<i32, &str> = UnifiedMap::new().with_key_value(1, "a");
        let keys = serde_json::to_value(map.key_set()).unwrap();
        assert_eq!(keys, serde_json::json!([1]));
        let entries = serde_json::to_value(map.entry_set()).unwrap();
        assert_eq!(entries, serde_json::json!([[1, "a"]]));
        let values = serde_json::to_value(map.values_collection()).unwrap();
        assert_eq!(values, serde_json::json!(["a"]));
    }

    #[test]
    fn missing_load_factor_is_rejected() {
        let err = serde_json::from_str::<UnifiedMap<i32, i32>>(r#"{"entries": []}"#);
        assert!(err.is_err());
    }
}
