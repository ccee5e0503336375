//! URI pattern algebra.
//!
//! Patterns are slash-delimited names where `+` matches exactly one
//! segment and `*` matches zero or more segments. A pattern carries at
//! most one `*`, which may sit anywhere, `*/bar` included.

/// Intersection of two non-star segments: literals must agree, `+` yields
/// to anything concrete.
fn unify<'a>(a: &'a str, b: &'a str) -> Option<&'a str> {
    if a == b {
        Some(a)
    } else if a == "+" {
        Some(b)
    } else if b == "+" {
        Some(a)
    } else {
        None
    }
}

/// The more specific of two patterns, or `None` when they do not
/// intersect. `restrict_by(a, b) == a` means `b` covers everything `a`
/// covers.
pub fn restrict_by(from: &str, by: &str) -> Option<String> {
    let f: Vec<&str> = from.split('/').collect();
    let b: Vec<&str> = by.split('/').collect();
    let fstar = f.iter().position(|s| *s == "*");
    let bstar = b.iter().position(|s| *s == "*");
    let joined = match (fstar, bstar) {
        (None, None) => {
            if f.len() != b.len() {
                return None;
            }
            let mut out = Vec::with_capacity(f.len());
            for i in 0..f.len() {
                out.push(unify(f[i], b[i])?);
            }
            out
        }
        (Some(si), None) => star_against_plain(&f, si, &b)?,
        (None, Some(si)) => star_against_plain(&b, si, &f)?,
        (Some(fi), Some(bi)) => star_against_star(&f, fi, &b, bi)?,
    };
    Some(joined.join("/"))
}

/// Intersect a starred pattern with a star-free one: the star absorbs the
/// concrete middle, and both flanks unify segment-wise.
fn star_against_plain<'a>(
    pat: &[&'a str],
    star: usize,
    plain: &[&'a str],
) -> Option<Vec<&'a str>> {
    let pre = &pat[..star];
    let suf = &pat[star + 1..];
    if plain.len() < pre.len() + suf.len() {
        return None;
    }
    let mut out = Vec::with_capacity(plain.len());
    for i in 0..pre.len() {
        out.push(unify(pre[i], plain[i])?);
    }
    out.extend_from_slice(&plain[pre.len()..plain.len() - suf.len()]);
    for i in 0..suf.len() {
        out.push(unify(suf[i], plain[plain.len() - suf.len() + i])?);
    }
    Some(out)
}

/// Intersect two starred patterns: unify the overlapping flanks, let the
/// longer flank pass through the other pattern's star, and keep a star
/// between them.
fn star_against_star<'a>(
    f: &[&'a str],
    fstar: usize,
    b: &[&'a str],
    bstar: usize,
) -> Option<Vec<&'a str>> {
    let (fpre, fsuf) = (&f[..fstar], &f[fstar + 1..]);
    let (bpre, bsuf) = (&b[..bstar], &b[bstar + 1..]);

    let overlap = fpre.len().min(bpre.len());
    let mut out = Vec::with_capacity(f.len().max(b.len()));
    for i in 0..overlap {
        out.push(unify(fpre[i], bpre[i])?);
    }
    let longer_pre = if fpre.len() >= bpre.len() { fpre } else { bpre };
    out.extend_from_slice(&longer_pre[overlap..]);
    out.push("*");

    let overlap = fsuf.len().min(bsuf.len());
    let longer_suf = if fsuf.len() >= bsuf.len() { fsuf } else { bsuf };
    let mut tail = Vec::with_capacity(longer_suf.len());
    for i in 0..overlap {
        let fs = fsuf[fsuf.len() - 1 - i];
        let bs = bsuf[bsuf.len() - 1 - i];
        tail.push(unify(fs, bs)?);
    }
    out.extend_from_slice(&longer_suf[..longer_suf.len() - overlap]);
    out.extend(tail.into_iter().rev());
    Some(out)
}

/// Definite match of a full URI against a pattern.
pub(crate) fn pattern_matches(pattern: &str, uri: &str) -> bool {
    let p: Vec<&str> = pattern.split('/').collect();
    let u: Vec<&str> = uri.split('/').collect();
    match p.iter().position(|s| *s == "*") {
        None => p.len() == u.len() && p.iter().zip(&u).all(|(ps, us)| unify(ps, us).is_some()),
        Some(star) => {
            let pre = &p[..star];
            let suf = &p[star + 1..];
            if u.len() < pre.len() + suf.len() {
                return false;
            }
            pre.iter().zip(&u[..pre.len()]).all(|(ps, us)| unify(ps, us).is_some())
                && suf
                    .iter()
                    .zip(&u[u.len() - suf.len()..])
                    .all(|(ps, us)| unify(ps, us).is_some())
        }
    }
}

/// Pruning match of a URI prefix against a pattern: `true` means a
/// descendant of `uri` may still match, `false` rules the subtree out.
/// The leading pattern segment, when empty, stands for any namespace.
pub(crate) fn pattern_might_match(pattern: &str, uri: &str) -> bool {
    let lhs: Vec<&str> = pattern.split('/').collect();
    let rhs: Vec<&str> = uri.split('/').collect();
    if !lhs[0].is_empty() && rhs[0] != lhs[0] {
        return false;
    }
    let mut i = 1;
    while i < lhs.len() && i < rhs.len() {
        if lhs[i] == "*" {
            return true;
        }
        if lhs[i] == "+" || lhs[i] == rhs[i] {
            i += 1;
            continue;
        }
        return false;
    }
    // The pattern ran out of room; no descendant can fit. If the prefix
    // ran out instead, nothing is ruled out yet.
    i < lhs.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rb(a: &str, b: &str) -> Option<String> {
        restrict_by(a, b)
    }

    #[test]
    fn restriction_table() {
        assert_eq!(rb("foo", "foo"), Some("foo".to_owned()));
        assert_eq!(rb("foo/bar", "foo"), None);
        assert_eq!(rb("foo/+", "foo"), None);
        assert_eq!(rb("foo/bar", "foo/bop"), None);
        assert_eq!(rb("foo/+", "foo/bop"), Some("foo/bop".to_owned()));
        assert_eq!(rb("foo/bar", "*/bar"), Some("foo/bar".to_owned()));
        assert_eq!(rb("foo/+", "*/bar"), Some("foo/bar".to_owned()));
        assert_eq!(rb("foo/*", "foo/bar/baz"), Some("foo/bar/baz".to_owned()));
        assert_eq!(rb("foo/*", "foo"), Some("foo".to_owned()));
        assert_eq!(rb("a/*/z", "a/b/c/z"), Some("a/b/c/z".to_owned()));
        assert_eq!(rb("a/*/z", "a/z"), Some("a/z".to_owned()));
        assert_eq!(rb("a/*/z", "b/z"), None);
    }

    #[test]
    fn restriction_of_two_stars() {
        assert_eq!(rb("foo/*", "foo/bar/*"), Some("foo/bar/*".to_owned()));
        assert_eq!(rb("x/*", "*/y"), Some("x/*/y".to_owned()));
        assert_eq!(rb("a/*", "b/*"), None);
    }

    #[test]
    fn definite_matching() {
        assert!(pattern_matches("a/b/c", "a/b/c"));
        assert!(!pattern_matches("a/b", "a/b/c"));
        assert!(pattern_matches("a/+/c", "a/b/c"));
        assert!(!pattern_matches("a/+/c", "a/b/d"));
        assert!(pattern_matches("a/*", "a"));
        assert!(pattern_matches("a/*", "a/b/c/d"));
        assert!(pattern_matches("*/d", "a/b/c/d"));
        assert!(!pattern_matches("*/d", "a/b/c"));
        assert!(pattern_matches("a/*/d", "a/d"));
    }

    #[test]
    fn pruning_cannot_rule_out_descendants() {
        // A star leaves the subtree open.
        assert!(pattern_might_match("ns/*/x", "ns/anything"));
        // Namespace mismatch prunes immediately.
        assert!(!pattern_might_match("ns/a", "other/a"));
        // Empty namespace segment accepts any root.
        assert!(pattern_might_match("/a/b", "whatever/a"));
        // The pattern has no room left for descendants.
        assert!(!pattern_might_match("ns/a", "ns/a"));
        // The prefix is shorter than the pattern; still possible.
        assert!(pattern_might_match("ns/a/b/c", "ns/a"));
        // Diverging literal segment prunes.
        assert!(!pattern_might_match("ns/a/b", "ns/x"));
    }
}
