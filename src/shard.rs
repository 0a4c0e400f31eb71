//! Partition-key derivation for relationship edges and unique-constraint
//! reservations.
//!
//! Both functions are pure and deterministic: the same inputs map to the same
//! key in every process, so any writer can locate a record without lookups.

use sha2::{Digest, Sha256};

/// Upper bound of the relationship shard count.
pub const MAX_SHARDS: u32 = 256;

const FNV32_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV32_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a digest of `input`.
pub fn fnv1a_32(input: &str) -> u32 {
    let mut hash = FNV32_OFFSET_BASIS;
    for byte in input.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(FNV32_PRIME);
    }
    hash
}

/// Shard a child's edge lands on. Zero and one shard both map everything to 0.
pub fn shard_for(child_ref: &str, num_shards: u32) -> u32 {
    if num_shards <= 1 {
        return 0;
    }
    fnv1a_32(child_ref) % num_shards
}

/// Partition key of one shard of a parent's relationship partition.
pub fn shard_partition_key(parent_ref: &str, shard: u32) -> String {
    format!("{}#{:02x}", parent_ref, shard)
}

/// Partition key of the edge linking `child_ref` to `parent_ref`.
pub fn relationship_partition_key(parent_ref: &str, child_ref: &str, num_shards: u32) -> String {
    shard_partition_key(parent_ref, shard_for(child_ref, num_shards))
}

/// Partition key of a unique-constraint reservation.
///
/// The first 128 bits of SHA-256 over `parent#type#field#value`, as 32
/// lowercase hex characters.
///
/// The components are joined with a bare `#` so keys match reservations
/// already written by other writers of the same tables. The join is only
/// unambiguous for well-formed inputs: `parent_ref` is an entity ref with a
/// single `#`, and entity types and field names contain none. The value is
/// the tail of the input and may contain anything.
pub fn unique_constraint_key(
    parent_ref: &str,
    entity_type: &str,
    field: &str,
    value: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}#{}#{}#{}", parent_ref, entity_type, field, value).as_bytes());
    let digest = hasher.finalize();
    digest[..16].iter().map(|byte| format!("{:02x}", byte)).collect()
}
