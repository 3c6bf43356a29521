//! Query model shared by every datastore.
//!
//! A [`Query`] selects keys beneath an optional prefix and may skip or cap
//! the results. [`QueryResults`] is a lazy stream: entries are produced (and,
//! in the encrypted layer, decrypted) only as the caller consumes them.

use crate::error::Result;
use crate::key::Key;

/// A datastore query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    /// Only return keys strictly beneath this key. Matching is segment-aware.
    pub prefix: Option<Key>,
    /// Skip loading values.
    pub keys_only: bool,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefix(mut self, prefix: impl Into<Key>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn keys_only(mut self) -> Self {
        self.keys_only = true;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Whether `key` falls under this query's prefix.
    pub fn matches(&self, key: &Key) -> bool {
        match &self.prefix {
            Some(prefix) => prefix.is_ancestor_of(key),
            None => true,
        }
    }
}

/// One query result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryEntry {
    pub key: Key,
    /// `None` for keys-only queries.
    pub value: Option<Vec<u8>>,
    /// Size of the value in bytes.
    pub size: usize,
}

type EntryIter = Box<dyn Iterator<Item = Result<QueryEntry>> + Send>;

/// Lazy stream of query results.
///
/// A failure on one entry is reported as an `Err` item; the stream carries
/// on with the entries after it.
pub struct QueryResults {
    query: Query,
    inner: EntryIter,
}

impl std::fmt::Debug for QueryResults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryResults")
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

impl QueryResults {
    pub fn new<I>(query: Query, iter: I) -> Self
    where
        I: Iterator<Item = Result<QueryEntry>> + Send + 'static,
    {
        Self {
            query,
            inner: Box::new(iter),
        }
    }

    /// Results backed by an already materialized list of entries.
    pub fn from_entries(query: Query, entries: Vec<QueryEntry>) -> Self {
        Self::new(query, entries.into_iter().map(Ok))
    }

    /// The query these results answer.
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Push each result into `f` until it returns `false` or the stream ends.
    ///
    /// Returns the number of results delivered.
    pub fn for_each_until<F>(self, mut f: F) -> usize
    where
        F: FnMut(Result<QueryEntry>) -> bool,
    {
        let mut delivered = 0;
        for item in self.inner {
            delivered += 1;
            if !f(item) {
                break;
            }
        }
        delivered
    }

    /// Drain the stream, stopping at the first error.
    pub fn rest(self) -> Result<Vec<QueryEntry>> {
        self.inner.collect()
    }

    /// Transform every item lazily, keeping the query.
    pub fn map<F>(self, f: F) -> QueryResults
    where
        F: FnMut(Result<QueryEntry>) -> Result<QueryEntry> + Send + 'static,
    {
        let query = self.query;
        QueryResults::new(query, self.inner.map(f))
    }
}

impl Iterator for QueryResults {
    type Item = Result<QueryEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// Apply prefix, offset and limit of `query` to an arbitrary result stream.
///
/// Error items are never filtered out by prefix; they count towards offset
/// and limit like any other item.
pub fn naive_apply<I>(query: &Query, iter: I) -> impl Iterator<Item = Result<QueryEntry>> + Send
where
    I: Iterator<Item = Result<QueryEntry>> + Send,
{
    let filter = query.clone();
    let keys_only = query.keys_only;
    let filtered = iter
        .filter(move |item| match item {
            Ok(entry) => filter.matches(&entry.key),
            Err(_) => true,
        })
        .map(move |item| {
            item.map(|mut entry| {
                if keys_only {
                    entry.value = None;
                }
                entry
            })
        })
        .skip(query.offset);

    let limit = query.limit.unwrap_or(usize::MAX);
    filtered.take(limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RepoError;

    fn entry(key: &str) -> QueryEntry {
        QueryEntry {
            key: Key::new(key),
            value: Some(key.as_bytes().to_vec()),
            size: key.len(),
        }
    }

    fn sample() -> Vec<Result<QueryEntry>> {
        ["/a", "/a/b", "/a/c", "/ab", "/b/x"]
            .into_iter()
            .map(|k| Ok(entry(k)))
            .collect()
    }

    #[test]
    fn test_prefix_is_segment_aware() {
        let query = Query::new().prefix("/a");
        let keys: Vec<String> = naive_apply(&query, sample().into_iter())
            .map(|r| r.unwrap().key.into_string())
            .collect();
        assert_eq!(keys, vec!["/a/b", "/a/c"]);
    }

    #[test]
    fn test_offset_limit_keys_only() {
        let query = Query::new().offset(1).limit(2).keys_only();
        let entries: Vec<QueryEntry> = naive_apply(&query, sample().into_iter())
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key.as_str(), "/a/b");
        assert!(entries.iter().all(|e| e.value.is_none()));
    }

    #[test]
    fn test_for_each_until_stops_early() {
        let results = QueryResults::new(Query::new(), sample().into_iter());
        let mut seen = Vec::new();
        let delivered = results.for_each_until(|item| {
            seen.push(item.unwrap().key);
            seen.len() < 2
        });
        assert_eq!(delivered, 2);
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_errors_do_not_end_stream() {
        let items = vec![
            Ok(entry("/a")),
            Err(RepoError::InvalidKey),
            Ok(entry("/b")),
        ];
        let results = QueryResults::new(Query::new(), items.into_iter());
        let collected: Vec<_> = results.collect();
        assert_eq!(collected.len(), 3);
        assert!(collected[1].is_err());
        assert!(collected[2].is_ok());
    }

    #[test]
    fn test_rest_stops_at_first_error() {
        let items = vec![Ok(entry("/a")), Err(RepoError::InvalidKey)];
        let results = QueryResults::new(Query::new(), items.into_iter());
        assert!(matches!(results.rest(), Err(RepoError::InvalidKey)));
    }
}
