//! Identifiers and the canonical pair key

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Opaque user identity, totally ordered by its string form
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Product identity as stored in review rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub i64);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Star rating, 1 to 5
pub type Rating = u8;

pub const MIN_RATING: Rating = 1;
pub const MAX_RATING: Rating = 5;

/// Products a user reviewed
pub type EngagementSet = HashSet<ProductId>;

/// Rating a user gave to each reviewed product
pub type RatingMap = HashMap<ProductId, Rating>;

/// Unordered user pair normalized to `(min, max)`
///
/// `PairKey::new(a, b) == PairKey::new(b, a)`, which is what makes the
/// similarity cache symmetric.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    first: UserId,
    second: UserId,
}

impl PairKey {
    pub fn new(a: &UserId, b: &UserId) -> Self {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Self {
            first: first.clone(),
            second: second.clone(),
        }
    }

    pub fn first(&self) -> &UserId {
        &self.first
    }

    pub fn second(&self) -> &UserId {
        &self.second
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.first, self.second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_key_is_canonical() {
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");

        let forward = PairKey::new(&alice, &bob);
        let backward = PairKey::new(&bob, &alice);

        assert_eq!(forward, backward);
        assert_eq!(forward.first(), &alice);
        assert_eq!(forward.second(), &bob);
        assert_eq!(forward.to_string(), "alice:bob");
    }

    #[test]
    fn test_pair_key_same_user() {
        let alice = UserId::from("alice");
        let key = PairKey::new(&alice, &alice);
        assert_eq!(key.first(), key.second());
    }

    #[test]
    fn test_user_id_serializes_as_string() {
        let json = serde_json::to_string(&UserId::from("alice")).unwrap();
        assert_eq!(json, "\"alice\"");
    }
}
