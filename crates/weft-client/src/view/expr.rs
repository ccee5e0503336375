//! Boolean expression tree over URI space and metadata.
//!
//! An expression answers three questions: does a full URI belong to the
//! view (`matches`), may a descendant of a URI prefix still belong
//! (`might_match`), and what is the minimum set of URI patterns whose
//! subscription covers everything the expression can match
//! (`canonical_suffixes`).

use regex::Regex;

use crate::{
    error::ClientError,
    view::{
        MetaStore,
        pattern::{pattern_matches, pattern_might_match, restrict_by},
    },
};

/// A compiled view expression.
///
/// Patterns beginning with `/` are namespace-relative: during matching
/// each of the view's namespace roots is tried in front of them.
#[derive(Debug, Clone)]
pub enum Expression {
    /// Every child must match.
    And(Vec<Expression>),
    /// At least one child must match.
    Or(Vec<Expression>),
    /// Inherited metadata `key` equals `value`.
    EqMeta {
        /// Metadata key.
        key: String,
        /// Required value.
        value: String,
    },
    /// Literal URI pattern with `+`/`*` wildcards.
    Uri {
        /// The pattern.
        pattern: String,
    },
    /// Regular-expression URI predicate.
    UriRegex {
        /// Compiled pattern.
        regex: Regex,
    },
    /// URI ends in `/<name>`.
    EndsWith {
        /// Final segment to require.
        name: String,
    },
}

impl Expression {
    /// Conjunction of `terms`.
    pub fn and(terms: Vec<Expression>) -> Self {
        Self::And(terms)
    }

    /// Disjunction of `terms`.
    pub fn or(terms: Vec<Expression>) -> Self {
        Self::Or(terms)
    }

    /// Inherited metadata `key` must equal `value`.
    pub fn eq_meta(key: &str, value: &str) -> Self {
        Self::EqMeta { key: key.to_owned(), value: value.to_owned() }
    }

    /// Literal URI pattern; `+` matches one segment, `*` zero or more.
    pub fn match_uri(pattern: &str) -> Self {
        Self::Uri { pattern: pattern.to_owned() }
    }

    /// Regular-expression URI predicate.
    pub fn regex_uri(pattern: &str) -> Result<Self, ClientError> {
        let regex = Regex::new(pattern)
            .map_err(|e| ClientError::Usage(format!("bad uri regex: {e}")))?;
        Ok(Self::UriRegex { regex })
    }

    /// Everything under `pattern`: `MatchURI(pattern + "/*")`.
    pub fn prefix(pattern: &str) -> Self {
        let pattern = pattern.trim_end_matches('/');
        Self::match_uri(&format!("{pattern}/*"))
    }

    /// A service anywhere in the namespaces:
    /// `/*/<name>/+/+/+/+`.
    pub fn service(name: &str) -> Self {
        Self::match_uri(&format!("/*/{name}/+/+/+/+"))
    }

    /// Any URI ending in `/<name>`.
    pub fn interface(name: &str) -> Self {
        Self::EndsWith { name: name.to_owned() }
    }

    /// Definite membership of a full URI in the view.
    pub fn matches(&self, uri: &str, store: &MetaStore) -> bool {
        match self {
            Self::And(subs) => subs.iter().all(|s| s.matches(uri, store)),
            Self::Or(subs) => subs.iter().any(|s| s.matches(uri, store)),
            Self::EqMeta { key, value } => {
                store.meta(uri, key).is_some_and(|t| t.value == *value)
            }
            Self::Uri { pattern } => {
                if let Some(relative) = pattern.strip_prefix('/') {
                    store
                        .namespaces()
                        .iter()
                        .any(|ns| pattern_matches(&format!("{ns}/{relative}"), uri))
                } else {
                    pattern_matches(pattern, uri)
                }
            }
            Self::UriRegex { regex } => regex.is_match(uri),
            Self::EndsWith { name } => {
                uri.rsplit_once('/').is_some_and(|(_, last)| last == name)
            }
        }
    }

    /// Prefix pruning: may a descendant of `uri` be in the view? `true`
    /// means "cannot rule out".
    pub fn might_match(&self, uri: &str, store: &MetaStore) -> bool {
        match self {
            Self::And(subs) => subs.iter().all(|s| s.might_match(uri, store)),
            Self::Or(subs) => subs.iter().any(|s| s.might_match(uri, store)),
            // Metadata and regexes only settle on the final resource.
            Self::EqMeta { .. } | Self::UriRegex { .. } | Self::EndsWith { .. } => true,
            Self::Uri { pattern } => pattern_might_match(pattern, uri),
        }
    }

    /// The minimum set of URI patterns whose subscription is sufficient
    /// to cover every URI this expression may match.
    pub fn canonical_suffixes(&self) -> Vec<String> {
        match self {
            Self::And(subs) => {
                let mut sets = subs.iter().map(Expression::canonical_suffixes);
                let first = sets.next().unwrap_or_default();
                sets.fold(first, |lhs, rhs| fold_and_suffixes(&lhs, &rhs))
            }
            Self::Or(subs) => subs.iter().flat_map(Expression::canonical_suffixes).collect(),
            // Cannot be statically restricted.
            Self::EqMeta { .. } | Self::UriRegex { .. } | Self::EndsWith { .. } => {
                vec!["*".to_owned()]
            }
            Self::Uri { pattern } => vec![pattern.clone()],
        }
    }
}

/// Pairwise intersection of two suffix sets, with redundancy pruning.
fn fold_and_suffixes(lhs: &[String], rhs: &[String]) -> Vec<String> {
    let mut merged = Vec::new();
    for l in lhs {
        for r in rhs {
            if let Some(m) = restrict_by(l, r) {
                merged.push(m);
            }
        }
    }
    // If restrict_by(a, b) == a with a != b then b covers a and a is
    // redundant; identical duplicates keep only their first occurrence.
    let mut deduped = Vec::with_capacity(merged.len());
    'outer: for (oi, o) in merged.iter().enumerate() {
        for (ii, i) in merged.iter().enumerate() {
            if ii == oi {
                continue;
            }
            if let Some(r) = restrict_by(o, i) {
                if r == *o && o != i {
                    continue 'outer;
                }
                if o == i && oi > ii {
                    continue 'outer;
                }
            }
        }
        deduped.push(o.clone());
    }
    deduped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(args: &[&str]) -> Expression {
        Expression::or(args.iter().map(|a| Expression::match_uri(a)).collect())
    }

    fn suffixes(e: &Expression) -> Vec<String> {
        e.canonical_suffixes()
    }

    #[test]
    fn and_folds_to_minimum_subscription_set() {
        let cases: &[(Expression, &[&str])] = &[
            (Expression::and(vec![u(&["foo"]), u(&["foo"])]), &["foo"]),
            (Expression::and(vec![u(&["foo/bar", "foo/baz"]), u(&["foo"])]), &[]),
            (Expression::and(vec![u(&["foo/bar", "foo/+"]), u(&["foo"])]), &[]),
            (Expression::and(vec![u(&["foo/bar", "foo/+"]), u(&["foo/bop"])]), &["foo/bop"]),
            (Expression::and(vec![u(&["foo/bar", "foo/+"]), u(&["*/bar"])]), &["foo/bar"]),
        ];
        for (expr, want) in cases {
            assert_eq!(&suffixes(expr), want);
        }
    }

    #[test]
    fn nested_or_under_and() {
        let expr = Expression::and(vec![
            Expression::or(vec![u(&["foo/bar"]), u(&["foo/+"])]),
            u(&["foo/bop"]),
        ]);
        assert_eq!(suffixes(&expr), vec!["foo/bop"]);
    }

    #[test]
    fn meta_and_regex_cannot_be_restricted() {
        assert_eq!(suffixes(&Expression::eq_meta("owner", "ops")), vec!["*"]);
        let rx = Expression::regex_uri(".*lights.*").unwrap();
        assert_eq!(suffixes(&rx), vec!["*"]);
        assert_eq!(suffixes(&Expression::interface("i.dimmer")), vec!["*"]);
    }

    #[test]
    fn uri_matching_with_namespace_expansion() {
        let store = MetaStore::new(vec!["myns".to_owned()]);
        let e = Expression::match_uri("/room/+");
        assert!(e.matches("myns/room/a", &store));
        assert!(!e.matches("otherns/room/a", &store));

        let absolute = Expression::match_uri("myns/room/+");
        assert!(absolute.matches("myns/room/a", &store));
    }

    #[test]
    fn service_and_interface_shapes() {
        let store = MetaStore::new(vec!["ns".to_owned()]);
        let svc = Expression::service("s.lights");
        assert!(svc.matches("ns/flat/s.lights/room/i.dim/signal/level", &store));
        assert!(!svc.matches("ns/flat/s.other/room/i.dim/signal/level", &store));

        let iface = Expression::interface("i.dim");
        assert!(iface.matches("ns/flat/s.lights/room/i.dim", &store));
        assert!(!iface.matches("ns/flat/s.lights/room/i.dimmer", &store));
    }

    #[test]
    fn eq_meta_reads_inherited_metadata() {
        let store = MetaStore::new(vec!["ns".to_owned()]);
        store.set("ns", "owner", meta("ops"));
        let e = Expression::eq_meta("owner", "ops");
        assert!(e.matches("ns/deep/uri", &store));
        assert!(!Expression::eq_meta("owner", "dev").matches("ns/deep/uri", &store));
    }

    fn meta(value: &str) -> weft_proto::MetadataTuple {
        weft_proto::MetadataTuple { value: value.to_owned(), timestamp: 1 }
    }
}
