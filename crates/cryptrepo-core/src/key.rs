//! Hierarchical datastore keys.
//!
//! A [`Key`] is a cleaned slash-separated path such as `/data/blocks/abc`.
//! Keys are always rooted at `/`, never end with a separator (except the root
//! itself) and never contain empty, `.` or `..` segments.

use std::fmt;

/// A cleaned, rooted, slash-separated datastore key.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(String);

impl Key {
    /// Build a key from a raw string, cleaning it.
    ///
    /// ```
    /// use cryptrepo_core::Key;
    ///
    /// assert_eq!(Key::new("a//b/./c/").as_str(), "/a/b/c");
    /// assert_eq!(Key::new("/a/b/../c").as_str(), "/a/c");
    /// assert_eq!(Key::new("").as_str(), "/");
    /// ```
    pub fn new(raw: impl AsRef<str>) -> Self {
        let mut parts: Vec<&str> = Vec::new();
        for segment in raw.as_ref().split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                other => parts.push(other),
            }
        }
        Self::from_clean_parts(&parts)
    }

    /// The root key `/`.
    pub fn root() -> Self {
        Key("/".to_string())
    }

    /// Build a key by joining namespaces, e.g. `["a", "b"]` → `/a/b`.
    pub fn from_namespaces<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = namespaces
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect::<Vec<_>>()
            .join("/");
        Key::new(joined)
    }

    fn from_clean_parts(parts: &[&str]) -> Self {
        if parts.is_empty() {
            return Key::root();
        }
        let mut out = String::with_capacity(parts.iter().map(|p| p.len() + 1).sum());
        for part in parts {
            out.push('/');
            out.push_str(part);
        }
        Key(out)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Path segments, e.g. `/a/b` → `["a", "b"]`. The root has none.
    pub fn segments(&self) -> Vec<&str> {
        self.0.split('/').filter(|s| !s.is_empty()).collect()
    }

    /// Last segment of the key, or the empty string for the root.
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    pub fn parent(&self) -> Key {
        let segments = self.segments();
        match segments.split_last() {
            Some((_, rest)) => Self::from_clean_parts(rest),
            None => Key::root(),
        }
    }

    /// Append `other` beneath this key.
    pub fn child(&self, other: &Key) -> Key {
        if self.is_root() {
            return other.clone();
        }
        if other.is_root() {
            return self.clone();
        }
        Key(format!("{}{}", self.0, other.0))
    }

    /// Append a raw string beneath this key (the string is cleaned).
    pub fn child_str(&self, other: &str) -> Key {
        self.child(&Key::new(other))
    }

    /// True when `other` lives strictly beneath this key.
    ///
    /// Matching is segment-aware: `/keys` is an ancestor of `/keys/a` but
    /// not of `/keys_foo`.
    pub fn is_ancestor_of(&self, other: &Key) -> bool {
        if self.is_root() {
            return !other.is_root();
        }
        other
            .0
            .strip_prefix(self.0.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// True when this key equals `prefix` or lives beneath it.
    pub fn has_prefix(&self, prefix: &Key) -> bool {
        self == prefix || prefix.is_ancestor_of(self)
    }

    /// Remove `prefix` from the front of this key, if it is a prefix.
    pub fn strip_prefix(&self, prefix: &Key) -> Option<Key> {
        if self == prefix {
            return Some(Key::root());
        }
        if prefix.is_root() {
            return Some(self.clone());
        }
        if prefix.is_ancestor_of(self) {
            return Some(Key(self.0[prefix.0.len()..].to_string()));
        }
        None
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.0)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::new(value)
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean() {
        assert_eq!(Key::new("a").as_str(), "/a");
        assert_eq!(Key::new("/a/b/").as_str(), "/a/b");
        assert_eq!(Key::new("//a///b").as_str(), "/a/b");
        assert_eq!(Key::new("/..").as_str(), "/");
        assert_eq!(Key::new("/a/../../b").as_str(), "/b");
    }

    #[test]
    fn test_namespaces() {
        let key = Key::from_namespaces(["A", "B"]);
        assert_eq!(key.as_str(), "/A/B");
        assert_eq!(key.segments(), vec!["A", "B"]);
        assert_eq!(key.name(), "B");
        assert_eq!(key.parent().as_str(), "/A");
        assert_eq!(Key::root().parent(), Key::root());
        assert_eq!(Key::root().name(), "");
    }

    #[test]
    fn test_child() {
        let base = Key::new("/data");
        assert_eq!(base.child(&Key::new("/x/y")).as_str(), "/data/x/y");
        assert_eq!(Key::root().child(&base), base);
        assert_eq!(base.child(&Key::root()), base);
        assert_eq!(base.child_str("z").as_str(), "/data/z");
    }

    #[test]
    fn test_prefix_is_segment_aware() {
        let keys = Key::new("/keys");
        assert!(keys.is_ancestor_of(&Key::new("/keys/a")));
        assert!(!keys.is_ancestor_of(&Key::new("/keys_foo")));
        assert!(!keys.is_ancestor_of(&keys));
        assert!(keys.has_prefix(&keys));
        assert!(Key::root().is_ancestor_of(&keys));
    }

    #[test]
    fn test_strip_prefix() {
        let ns = Key::new("/data");
        assert_eq!(
            Key::new("/data/a/b").strip_prefix(&ns),
            Some(Key::new("/a/b"))
        );
        assert_eq!(Key::new("/data").strip_prefix(&ns), Some(Key::root()));
        assert_eq!(Key::new("/datum").strip_prefix(&ns), None);
        assert_eq!(
            Key::new("/x").strip_prefix(&Key::root()),
            Some(Key::new("/x"))
        );
    }
}
