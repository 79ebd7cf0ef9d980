//! Identifiers for tours, locations, and overlays.
//!
//! Tour and location ids are URL-safe slugs, interned so they are `Copy`
//! and hash/compare in O(1). Ordering is lexical so maps keyed by these
//! ids iterate deterministically. Overlay ids are generated at creation
//! and never derived from position.

use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::LazyLock;
use uuid::Uuid;

/// Global string interner for slug ids.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// Fallback slug for titles with no usable characters.
const EMPTY_SLUG: &str = "untitled";

// ─── Slug ids ────────────────────────────────────────────────────────────

/// An interned, URL-safe identifier tagged with the kind of entity it names.
pub struct Id<T> {
    spur: Spur,
    _marker: PhantomData<fn() -> T>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TourTag {}
pub type TourId = Id<TourTag>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocationTag {}
pub type LocationId = Id<LocationTag>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("id must not be empty")]
    Empty,
    #[error("id `{id}` contains `{ch}`, which is not URL-safe")]
    NotUrlSafe { id: String, ch: char },
}

impl<T> Id<T> {
    /// Validate and intern `value`.
    pub fn new(value: &str) -> Result<Self, IdError> {
        if value.is_empty() {
            return Err(IdError::Empty);
        }
        if let Some(ch) = value.chars().find(|c| !is_url_safe(*c)) {
            return Err(IdError::NotUrlSafe {
                id: value.to_owned(),
                ch,
            });
        }
        Ok(Self::intern(value))
    }

    /// Derive an id from a human title, skipping slugs for which `is_taken`
    /// returns true (`lobby`, `lobby-2`, `lobby-3`, ...).
    pub fn from_title(title: &str, is_taken: impl Fn(Self) -> bool) -> Self {
        let base = slugify(title);
        let mut candidate = Self::intern(&base);
        let mut n = 2u32;
        while is_taken(candidate) {
            candidate = Self::intern(&format!("{base}-{n}"));
            n += 1;
        }
        candidate
    }

    /// Intern `value` without validating it. Used to keep a malformed
    /// reference readable; it never equals a validated id.
    pub(crate) fn unchecked(value: &str) -> Self {
        Self::intern(value)
    }

    pub fn is_valid(&self) -> bool {
        let s = self.as_str();
        !s.is_empty() && s.chars().all(is_url_safe)
    }

    /// Resolve back to a string slice.
    pub fn as_str(&self) -> &'static str {
        INTERNER.resolve(&self.spur)
    }

    fn intern(value: &str) -> Self {
        Self {
            spur: INTERNER.get_or_intern(value),
            _marker: PhantomData,
        }
    }
}

fn is_url_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~')
}

/// Lowercase `title`, keep ASCII alphanumerics, and collapse every other
/// run of characters into a single `-`.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        slug.push_str(EMPTY_SLUG);
    }
    slug
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.spur == other.spur
    }
}

impl<T> Eq for Id<T> {}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.spur.hash(state);
    }
}

impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.spur == other.spur {
            return Ordering::Equal;
        }
        self.as_str().cmp(other.as_str())
    }
}

impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({:?})", self.as_str())
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<T> FromStr for Id<T> {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl<T> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de, T> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Id::new(&s).map_err(serde::de::Error::custom)
    }
}

// ─── Overlay ids ─────────────────────────────────────────────────────────

/// Stable overlay identity, assigned once when the overlay is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverlayId(Uuid);

impl OverlayId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OverlayId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OverlayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_roundtrip() {
        let a = LocationId::new("lobby").unwrap();
        let b = LocationId::new("lobby").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "lobby");
    }

    #[test]
    fn rejects_empty_and_unsafe() {
        assert_eq!(TourId::new(""), Err(IdError::Empty));
        assert_eq!(
            TourId::new("a/b"),
            Err(IdError::NotUrlSafe {
                id: "a/b".into(),
                ch: '/'
            })
        );
        assert!(TourId::new("has space").is_err());
    }

    #[test]
    fn ordering_is_lexical_not_intern_order() {
        let z = LocationId::new("zz-interned-first").unwrap();
        let a = LocationId::new("aa-interned-second").unwrap();
        assert!(a < z);
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Dexter Lawn — Mid"), "dexter-lawn-mid");
        assert_eq!(slugify("  Hall 2!  "), "hall-2");
        assert_eq!(slugify("???"), "untitled");
    }

    #[test]
    fn from_title_skips_taken_slugs() {
        let taken = [
            LocationId::new("front-door").unwrap(),
            LocationId::new("front-door-2").unwrap(),
        ];
        let id = LocationId::from_title("Front Door", |c| taken.contains(&c));
        assert_eq!(id.as_str(), "front-door-3");
    }

    #[test]
    fn deserialize_validates() {
        let ok: TourId = serde_json::from_str("\"campus\"").unwrap();
        assert_eq!(ok.as_str(), "campus");
        assert!(serde_json::from_str::<TourId>("\"no/slash\"").is_err());
    }

    #[test]
    fn overlay_ids_are_unique() {
        assert_ne!(OverlayId::new(), OverlayId::new());
    }
}
