use chrono::Utc;

use super::item::ATTR_TTL;
use crate::backend::Condition;
use crate::core::{Attributes, int_attr};

/// Wall-clock time in unix seconds.
pub fn now_unix() -> i64 {
    Utc::now().timestamp()
}

/// Whether an item carries a TTL at or before `now`.
///
/// Items without a TTL, or with a non-integer one, are active.
pub fn is_deleted(item: &Attributes, now: i64) -> bool {
    int_attr(item, ATTR_TTL).is_some_and(|ttl| ttl <= now)
}

/// Filter keeping only active items: no TTL, or a TTL strictly after `now`.
///
/// Custom queries built outside the store should AND this in.
pub fn tombstone_filter(now: i64) -> Condition {
    Condition::attribute_not_exists(ATTR_TTL).or(Condition::greater_than(ATTR_TTL, now))
}

/// Default parent check: the parent exists and is not tombstoned.
pub fn parent_exists_condition(now: i64) -> Condition {
    Condition::ItemExists.and(tombstone_filter(now))
}
