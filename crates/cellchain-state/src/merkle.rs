use cellchain_core::crypto::hash_parts;
use cellchain_core::Hash;

use crate::storage::Storage;

const LEAF_TAG: &[u8] = &[0x00];
const NODE_TAG: &[u8] = &[0x01];

/// Merkle root over key/value pairs, independent of input order.
///
/// Leaves are `H(0x00 || len(key) || key || value)` in key order. Inner
/// nodes are `H(0x01 || left || right)`; an odd node is paired with itself.
/// The empty set hashes to [`Hash::ZERO`].
pub fn compute_state_root<'a, I>(entries: I) -> Hash
where
    I: IntoIterator<Item = (&'a [u8], &'a [u8])>,
{
    let mut sorted: Vec<_> = entries.into_iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let leaves: Vec<Hash> = sorted
        .into_iter()
        .map(|(key, value)| {
            let key_len = (key.len() as u64).to_be_bytes();
            hash_parts(&[LEAF_TAG, &key_len[..], key, value])
        })
        .collect();

    root_from_leaves(leaves)
}

/// State root of everything visible in `storage`
pub fn storage_root<S: Storage + ?Sized>(storage: &S) -> Hash {
    let entries = storage.entries_with_prefix(&[]);
    compute_state_root(
        entries
            .iter()
            .map(|(key, value)| (key.as_slice(), value.as_slice())),
    )
}

fn root_from_leaves(mut level: Vec<Hash>) -> Hash {
    if level.is_empty() {
        return Hash::ZERO;
    }
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let left = pair[0].as_bytes().as_slice();
                let right = pair.get(1).unwrap_or(&pair[0]).as_bytes().as_slice();
                hash_parts(&[NODE_TAG, left, right])
            })
            .collect();
    }
    level[0]
}
