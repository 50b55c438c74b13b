//! Field codec: how committed contract fields are laid out in a [`Storage`].
//!
//! Every field lives under `<namespace>/<field>`. Scalars are stored at that
//! key. Map entries are stored at `<namespace>/<field>/` followed by the
//! bincode encoding of the key, vector elements at the same prefix followed
//! by the big-endian element index. Values are bincode-encoded.

use std::collections::BTreeMap;

use cellchain_core::serialize;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::Storage;
use crate::error::StateError;

pub fn field_key(namespace: &str, field: &str) -> Vec<u8> {
    format!("{namespace}/{field}").into_bytes()
}

fn entry_prefix(namespace: &str, field: &str) -> Vec<u8> {
    let mut prefix = field_key(namespace, field);
    prefix.push(b'/');
    prefix
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StateError> {
    serialize::to_bytes(value).map_err(|e| StateError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StateError> {
    serialize::from_bytes(bytes).map_err(|e| StateError::Serialization(e.to_string()))
}

pub fn write_value<S, T>(storage: &mut S, namespace: &str, field: &str, value: &T) -> Result<(), StateError>
where
    S: Storage + ?Sized,
    T: Serialize,
{
    let bytes = encode(value)?;
    storage.put(&field_key(namespace, field), &bytes);
    Ok(())
}

pub fn read_value<S, T>(storage: &S, namespace: &str, field: &str) -> Result<Option<T>, StateError>
where
    S: Storage + ?Sized,
    T: DeserializeOwned,
{
    storage
        .get(&field_key(namespace, field))
        .map(|bytes| decode(&bytes))
        .transpose()
}

/// Read a scalar that every snapshot must contain
pub fn require_value<S, T>(storage: &S, namespace: &str, field: &str) -> Result<T, StateError>
where
    S: Storage + ?Sized,
    T: DeserializeOwned,
{
    read_value(storage, namespace, field)?
        .ok_or_else(|| StateError::Storage(format!("missing field {namespace}/{field}")))
}

/// Replace the stored contents of a map field with `entries`
pub fn write_map<'a, S, K, V, I>(storage: &mut S, namespace: &str, field: &str, entries: I) -> Result<usize, StateError>
where
    S: Storage + ?Sized,
    K: Serialize + 'a,
    V: Serialize + 'a,
    I: IntoIterator<Item = (&'a K, &'a V)>,
{
    let prefix = entry_prefix(namespace, field);
    storage.delete_prefix(&prefix);
    let mut written = 0;
    for (key, value) in entries {
        let mut full = prefix.clone();
        full.extend(encode(key)?);
        storage.put(&full, &encode(value)?);
        written += 1;
    }
    Ok(written)
}

pub fn read_map<S, K, V>(storage: &S, namespace: &str, field: &str) -> Result<BTreeMap<K, V>, StateError>
where
    S: Storage + ?Sized,
    K: DeserializeOwned + Ord,
    V: DeserializeOwned,
{
    let prefix = entry_prefix(namespace, field);
    storage
        .entries_with_prefix(&prefix)
        .into_iter()
        .map(|(key, value)| Ok::<_, StateError>((decode(&key[prefix.len()..])?, decode(&value)?)))
        .collect()
}

/// Replace the stored contents of a vector field with `items`
pub fn write_vec<'a, S, T, I>(storage: &mut S, namespace: &str, field: &str, items: I) -> Result<usize, StateError>
where
    S: Storage + ?Sized,
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let prefix = entry_prefix(namespace, field);
    storage.delete_prefix(&prefix);
    let mut written = 0u64;
    for item in items {
        let mut full = prefix.clone();
        full.extend_from_slice(&serialize::u64_key(written));
        storage.put(&full, &encode(item)?);
        written += 1;
    }
    Ok(written as usize)
}

/// Read a vector field. Indices must be contiguous from zero.
pub fn read_vec<S, T>(storage: &S, namespace: &str, field: &str) -> Result<Vec<T>, StateError>
where
    S: Storage + ?Sized,
    T: DeserializeOwned,
{
    let prefix = entry_prefix(namespace, field);
    let mut items = Vec::new();
    for (expected, (key, value)) in storage.entries_with_prefix(&prefix).into_iter().enumerate() {
        let index = serialize::u64_from_key(&key[prefix.len()..])?;
        if index != expected as u64 {
            return Err(StateError::Storage(format!(
                "gap in {namespace}/{field}: expected index {expected}, found {index}"
            )));
        }
        items.push(decode(&value)?);
    }
    Ok(items)
}
