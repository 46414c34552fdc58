//! Queries over the index store, and the filename/path Query Engine.
//!
//! A [`Query`] is a small boolean tree evaluated against a [`Snapshot`]'s
//! term dictionaries:
//! - Exact terms (case-insensitive)
//! - Wildcard/glob patterns (`*`, `?`) scanned over a field's terms
//! - Path subtrees (a directory and everything beneath it)
//! - Conjunctions of the above
//!
//! [`QueryEngine`] turns the presentation layer's three inputs (search
//! root, filename substring, exact-path flag) into a query through an
//! explicit [`QueryIntent`].

use crate::error::{Result, ShelfError};
use crate::schema::{Field, Schema};
use crate::store::{DocId, IndexStore, Limit, Snapshot};
use crate::types::Document;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;
use std::path::{is_separator, Path};
use tracing::debug;

/// A compiled `*`/`?` pattern.
#[derive(Clone)]
pub struct WildcardPattern {
    source: String,
    regex: Regex,
    /// Lowercased literal text before the first wildcard, used to narrow the
    /// term scan to a range
    prefix: String,
}

impl WildcardPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        // Convert glob pattern to regex
        let mut regex_pattern = String::with_capacity(pattern.len() * 2 + 4);
        regex_pattern.push_str("(?i)^");

        for c in pattern.chars() {
            match c {
                '*' => regex_pattern.push_str(".*"),
                '?' => regex_pattern.push('.'),
                // Escape regex special characters
                '.' | '+' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '$' | '|' | '\\' => {
                    regex_pattern.push('\\');
                    regex_pattern.push(c);
                }
                _ => regex_pattern.push(c),
            }
        }

        regex_pattern.push('$');

        let regex = Regex::new(&regex_pattern).map_err(|e| ShelfError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        let prefix = pattern
            .split(|c| c == '*' || c == '?')
            .next()
            .unwrap_or("")
            .to_lowercase();

        Ok(WildcardPattern {
            source: pattern.to_string(),
            regex,
            prefix,
        })
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl fmt::Debug for WildcardPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WildcardPattern").field(&self.source).finish()
    }
}

impl PartialEq for WildcardPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// A boolean query over indexed text fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Every document
    All,
    /// Field value equals `value` (case-insensitive)
    Term { field: Field, value: String },
    /// Field value matches a glob pattern
    Wildcard {
        field: Field,
        pattern: WildcardPattern,
    },
    /// Field value is `root` or a path beneath it
    Subtree { field: Field, root: String },
    /// All subqueries match
    And(Vec<Query>),
}

impl Query {
    pub fn term(field: Field, value: impl Into<String>) -> Self {
        Query::Term {
            field,
            value: value.into(),
        }
    }

    pub fn wildcard(field: Field, pattern: &str) -> Result<Self> {
        Ok(Query::Wildcard {
            field,
            pattern: WildcardPattern::new(pattern)?,
        })
    }

    /// Field value contains `substring`. Wildcards inside the substring are
    /// kept.
    pub fn contains(field: Field, substring: &str) -> Result<Self> {
        Self::wildcard(field, &format!("*{}*", substring))
    }

    pub fn subtree(field: Field, root: impl Into<String>) -> Self {
        Query::Subtree {
            field,
            root: root.into(),
        }
    }

    /// Conjunction of `queries`. Nested conjunctions are flattened; an empty
    /// conjunction matches everything.
    pub fn and(queries: Vec<Query>) -> Self {
        let mut flat = Vec::with_capacity(queries.len());
        for query in queries {
            match query {
                Query::And(inner) => flat.extend(inner),
                Query::All => {}
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Query::All,
            1 => flat.remove(0),
            _ => Query::And(flat),
        }
    }

    /// Check that every field the query names is indexed text in `schema`.
    pub fn validate(&self, schema: &Schema) -> Result<()> {
        match self {
            Query::All => Ok(()),
            Query::Term { field, .. }
            | Query::Wildcard { field, .. }
            | Query::Subtree { field, .. } => {
                if schema.is_text(*field) {
                    Ok(())
                } else {
                    Err(ShelfError::InvalidQuery {
                        reason: format!("field '{}' is not indexed text", field),
                    })
                }
            }
            Query::And(queries) => queries.iter().try_for_each(|q| q.validate(schema)),
        }
    }

    /// Evaluate against a snapshot, returning matching ids in ascending order.
    pub(crate) fn evaluate(&self, snapshot: &Snapshot) -> Vec<DocId> {
        match self {
            Query::All => (0..snapshot.len() as DocId).collect(),
            Query::Term { field, value } => snapshot
                .terms(*field)
                .and_then(|terms| terms.get(&value.to_lowercase()))
                .cloned()
                .unwrap_or_default(),
            Query::Wildcard { field, pattern } => match snapshot.terms(*field) {
                Some(terms) => collect_ids(scan_prefix(terms, &pattern.prefix).filter_map(
                    |(term, ids)| pattern.is_match(term).then_some(ids),
                )),
                None => Vec::new(),
            },
            Query::Subtree { field, root } => match snapshot.terms(*field) {
                Some(terms) => {
                    let root = normalize_root(root).to_lowercase();
                    let open_ended = root.ends_with(is_separator);
                    collect_ids(scan_prefix(terms, &root).filter_map(|(term, ids)| {
                        let rest = &term[root.len()..];
                        (open_ended || rest.is_empty() || rest.starts_with(is_separator))
                            .then_some(ids)
                    }))
                }
                None => Vec::new(),
            },
            Query::And(queries) => {
                let mut sets: Vec<Vec<DocId>> =
                    queries.iter().map(|q| q.evaluate(snapshot)).collect();
                sets.sort_by_key(|s| s.len());
                let mut iter = sets.into_iter();
                let first = iter.next().unwrap_or_default();
                iter.fold(first, |acc, set| intersect(&acc, &set))
            }
        }
    }
}

/// Terms that start with `prefix`, in order.
fn scan_prefix<'a>(
    terms: &'a BTreeMap<String, Vec<DocId>>,
    prefix: &'a str,
) -> impl Iterator<Item = (&'a String, &'a Vec<DocId>)> + 'a {
    terms
        .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
        .take_while(move |(term, _)| term.starts_with(prefix))
}

fn collect_ids<'a>(lists: impl Iterator<Item = &'a Vec<DocId>>) -> Vec<DocId> {
    let mut ids: Vec<DocId> = lists.flatten().copied().collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

fn intersect(a: &[DocId], b: &[DocId]) -> Vec<DocId> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

/// Strip trailing separators, keeping a bare filesystem root intact.
pub fn normalize_root(root: &str) -> &str {
    let trimmed = root.trim_end_matches(is_separator);
    if trimmed.is_empty() || trimmed.ends_with(':') {
        // "/" or "C:\"
        &root[..root.len().min(trimmed.len() + 1)]
    } else {
        trimmed
    }
}

/// Which filters a search applies, decided up front from its inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryIntent {
    NoFilter,
    FilenameOnly { file_name: String },
    PathOnly { root: String },
    Both { file_name: String, root: String },
}

impl QueryIntent {
    /// Decide the intent. The path filter is dropped when `root` is empty or
    /// is the watched root itself.
    pub fn decide(watched_root: &str, root: &str, file_name: &str) -> Self {
        let root = normalize_root(root);
        let path_filter = !root.is_empty() && root != normalize_root(watched_root);

        match (file_name.is_empty(), path_filter) {
            (true, false) => QueryIntent::NoFilter,
            (false, false) => QueryIntent::FilenameOnly {
                file_name: file_name.to_string(),
            },
            (true, true) => QueryIntent::PathOnly {
                root: root.to_string(),
            },
            (false, true) => QueryIntent::Both {
                file_name: file_name.to_string(),
                root: root.to_string(),
            },
        }
    }

    pub fn to_query(&self) -> Result<Query> {
        Ok(match self {
            QueryIntent::NoFilter => Query::All,
            QueryIntent::FilenameOnly { file_name } => {
                Query::contains(Field::FileNameWithExtension, file_name)?
            }
            QueryIntent::PathOnly { root } => Query::subtree(Field::Path, root.as_str()),
            QueryIntent::Both { file_name, root } => Query::and(vec![
                Query::contains(Field::FileNameWithExtension, file_name)?,
                Query::subtree(Field::Path, root.as_str()),
            ]),
        })
    }
}

/// Filename/path search over one watched root.
pub struct QueryEngine<'a> {
    store: &'a IndexStore,
    watched_root: String,
}

impl<'a> QueryEngine<'a> {
    pub fn new(store: &'a IndexStore, watched_root: &Path) -> Self {
        QueryEngine {
            store,
            watched_root: watched_root.to_string_lossy().into_owned(),
        }
    }

    /// Search for documents under `root` whose file name contains
    /// `file_name`. With `exact_path`, only documents directly inside `root`
    /// are kept.
    pub fn search(&self, root: &str, file_name: &str, exact_path: bool) -> Result<Vec<Document>> {
        let intent = QueryIntent::decide(&self.watched_root, root, file_name);
        let query = intent.to_query()?;
        let hits = self.store.search(&query, Limit::Unbounded)?;

        let total = hits.len();
        let documents: Vec<Document> = if exact_path {
            let wanted = match normalize_root(root) {
                "" => normalize_root(&self.watched_root),
                root => root,
            };
            hits.into_iter()
                .filter(|hit| hit.document.path == wanted)
                .map(|hit| hit.document.as_ref().clone())
                .collect()
        } else {
            hits.into_iter()
                .map(|hit| hit.document.as_ref().clone())
                .collect()
        };

        debug!(
            ?intent,
            exact_path,
            matched = total,
            returned = documents.len(),
            "Search complete"
        );

        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::make_document;
    use tempfile::TempDir;

    fn store_with(paths: &[&str]) -> (TempDir, IndexStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::create(temp_dir.path(), Schema::documents()).unwrap();
        let mut session = store.begin_write();
        for path in paths {
            session.add_document(make_document(path));
        }
        session.commit().unwrap();
        (temp_dir, store)
    }

    fn keys(documents: &[Document]) -> Vec<&str> {
        let mut keys: Vec<&str> = documents.iter().map(|d| d.key()).collect();
        keys.sort_unstable();
        keys
    }

    #[test]
    fn test_wildcard_pattern() {
        let pattern = WildcardPattern::new("*.PDF").unwrap();
        assert!(pattern.is_match("invoice.pdf"));
        assert!(!pattern.is_match("invoice.pdfx"));
        assert_eq!(pattern.prefix, "");

        let pattern = WildcardPattern::new("Rep?rt*").unwrap();
        assert!(pattern.is_match("report-2024.txt"));
        assert_eq!(pattern.prefix, "rep");

        let pattern = WildcardPattern::new("a+b(1)").unwrap();
        assert!(pattern.is_match("a+b(1)"));
        assert!(!pattern.is_match("aab1"));
    }

    #[test]
    fn test_normalize_root() {
        assert_eq!(normalize_root("/docs/reports/"), "/docs/reports");
        assert_eq!(normalize_root("/docs"), "/docs");
        assert_eq!(normalize_root("/"), "/");
        assert_eq!(normalize_root(""), "");
    }

    #[test]
    fn test_intent() {
        assert_eq!(QueryIntent::decide("/docs", "/docs", ""), QueryIntent::NoFilter);
        assert_eq!(QueryIntent::decide("/docs", "", ""), QueryIntent::NoFilter);
        assert_eq!(
            QueryIntent::decide("/docs", "/docs/", "inv"),
            QueryIntent::FilenameOnly {
                file_name: "inv".to_string()
            }
        );
        assert_eq!(
            QueryIntent::decide("/docs", "/docs/a", ""),
            QueryIntent::PathOnly {
                root: "/docs/a".to_string()
            }
        );
        assert_eq!(
            QueryIntent::decide("/docs", "/docs/a", "inv"),
            QueryIntent::Both {
                file_name: "inv".to_string(),
                root: "/docs/a".to_string()
            }
        );
    }

    #[test]
    fn test_and_flattening() {
        assert_eq!(Query::and(vec![]), Query::All);
        let term = Query::term(Field::FileName, "a");
        assert_eq!(Query::and(vec![Query::All, term.clone()]), term);
    }

    #[test]
    fn test_validate_rejects_non_text_fields() {
        let schema = Schema::documents();
        assert!(Query::term(Field::Path, "/docs").validate(&schema).is_ok());

        let err = Query::term(Field::FileSize, "12").validate(&schema).unwrap_err();
        assert!(matches!(err, ShelfError::InvalidQuery { .. }));

        let nested = Query::and(vec![
            Query::term(Field::FileName, "a"),
            Query::subtree(Field::LastModified, "x"),
        ]);
        assert!(nested.validate(&schema).is_err());
    }

    #[test]
    fn test_term_is_case_insensitive() {
        let (_dir, store) = store_with(&["/docs/Invoice.PDF", "/docs/other.pdf"]);
        let hits = store
            .search(&Query::term(Field::FileNameWithExtension, "invoice.pdf"), Limit::Unbounded)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document.key(), "/docs/Invoice.PDF");
    }

    #[test]
    fn test_subtree_respects_separator_boundary() {
        let (_dir, store) = store_with(&[
            "/docs/reports/a.txt",
            "/docs/reports/2024/b.txt",
            "/docs/reports-old/c.txt",
        ]);
        let hits = store
            .search(&Query::subtree(Field::Path, "/docs/reports"), Limit::Unbounded)
            .unwrap();
        let mut keys: Vec<&str> = hits.iter().map(|h| h.document.key()).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["/docs/reports/2024/b.txt", "/docs/reports/a.txt"]);
    }

    #[test]
    fn test_search_every_file_by_name() {
        let paths = ["/docs/a/invoice_2024.pdf", "/docs/b/notes.txt", "/docs/readme.md"];
        let (_dir, store) = store_with(&paths);
        let engine = QueryEngine::new(&store, Path::new("/docs"));

        for path in paths {
            let name = Path::new(path).file_name().unwrap().to_str().unwrap();
            let results = engine.search("/docs", name, false).unwrap();
            assert!(results.iter().any(|d| d.key() == path), "missing {}", path);
        }
    }

    #[test]
    fn test_combined_query() {
        let (_dir, store) = store_with(&[
            "/docs/a/invoice_2024.pdf",
            "/docs/a/receipt.pdf",
            "/other/invoice.pdf",
        ]);
        let engine = QueryEngine::new(&store, Path::new("/"));

        let results = engine.search("/docs", "invoice", false).unwrap();
        assert_eq!(keys(&results), vec!["/docs/a/invoice_2024.pdf"]);
    }

    #[test]
    fn test_exact_path() {
        let (_dir, store) = store_with(&[
            "/docs/reports/q1.pdf",
            "/docs/reports/2024/q2.pdf",
            "/docs/top.pdf",
        ]);
        let engine = QueryEngine::new(&store, Path::new("/docs"));

        let results = engine.search("/docs/reports", "", true).unwrap();
        assert_eq!(keys(&results), vec!["/docs/reports/q1.pdf"]);

        let results = engine.search("/docs/reports", "", false).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_exact_path_at_watched_root() {
        let (_dir, store) = store_with(&["/docs/reports/q1.pdf", "/docs/top.pdf"]);
        let engine = QueryEngine::new(&store, Path::new("/docs"));

        let results = engine.search("/docs", "", true).unwrap();
        assert_eq!(keys(&results), vec!["/docs/top.pdf"]);
    }

    #[test]
    fn test_no_filter_matches_everything() {
        let (_dir, store) = store_with(&["/docs/a.txt", "/docs/b/c.txt"]);
        let engine = QueryEngine::new(&store, Path::new("/docs"));
        assert_eq!(engine.search("/docs", "", false).unwrap().len(), 2);
    }

    #[test]
    fn test_user_wildcards_kept() {
        let (_dir, store) = store_with(&["/docs/report-2023.pdf", "/docs/report.txt"]);
        let engine = QueryEngine::new(&store, Path::new("/docs"));

        let results = engine.search("/docs", "report-*.pdf", false).unwrap();
        assert_eq!(keys(&results), vec!["/docs/report-2023.pdf"]);
    }
}
