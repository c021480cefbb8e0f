//! Git output parsers

use once_cell::sync::Lazy;
use regex::Regex;

use super::types::*;

static REF_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(HEAD ->)|(?:tag:))?\s*(refs/(remotes|heads|tags|stash)(?:/(.*))?)$")
        .expect("reference pattern is valid")
});

static LOG_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\S+)\|([^|]+)?\|([^|]+)?\|(\S+)?\|([^|]+)?\|(.+)?$")
        .expect("log pattern is valid")
});

static SHOW_REF_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\S+)\s+(.*)?$").expect("show-ref pattern is valid"));

/// Parse one reference decoration attached to `hash`.
///
/// `None` yields a synthetic commit reference named after the short hash.
/// Text that is not a `refs/...` path becomes an `other` reference.
pub fn parse_reference(hash: &str, raw: Option<&str>) -> GitRef {
    let raw = match raw.map(str::trim) {
        Some(raw) if !raw.is_empty() => raw,
        _ => {
            return GitRef {
                hash: hash.to_string(),
                name: hash.get(..7).unwrap_or(hash).to_string(),
                ref_type: RefType::Commit,
                remote: None,
                current: false,
                fullname: hash.to_string(),
                order: RefType::Commit.order(),
            }
        }
    };

    let Some(caps) = REF_PATTERN.captures(raw) else {
        return GitRef {
            hash: hash.to_string(),
            name: raw.to_string(),
            ref_type: RefType::Other,
            remote: None,
            current: false,
            fullname: raw.to_string(),
            order: RefType::Other.order(),
        };
    };

    let current = caps.get(1).is_some();
    let fullname = caps.get(2).map_or(raw, |m| m.as_str());
    let suffix = caps.get(4).map(|m| m.as_str()).filter(|s| !s.is_empty());

    let (ref_type, remote) = match caps.get(3).map(|m| m.as_str()) {
        Some("remotes") => (
            RefType::Remote,
            suffix.and_then(|s| s.split('/').next()).map(String::from),
        ),
        Some("heads") => (RefType::Branch, None),
        Some("tags") => (RefType::Tag, None),
        Some("stash") => (RefType::Stash, None),
        _ => (RefType::Other, None),
    };

    GitRef {
        hash: hash.to_string(),
        name: suffix.unwrap_or(fullname).to_string(),
        ref_type,
        remote,
        current,
        fullname: fullname.to_string(),
        order: ref_type.order(),
    }
}

/// Sort references into canonical order in place.
pub fn sort_references(refs: &mut [GitRef]) {
    refs.sort_by(GitRef::canonical_cmp);
}

/// Parse one `--pretty=%H|%P|%D|%aI|%an|%s` line.
///
/// Lines that do not match the layout, blank ones included, yield `None`.
pub fn parse_log_line(line: &str) -> Option<GitLog> {
    let caps = LOG_PATTERN.captures(line)?;
    let hash = caps.get(1)?.as_str();
    let field = |index: usize| caps.get(index).map_or("", |m| m.as_str());

    let parents = field(2)
        .split_whitespace()
        .map(String::from)
        .collect();

    let mut refs: Vec<GitRef> = field(3)
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(|r| parse_reference(hash, Some(r)))
        .collect();
    sort_references(&mut refs);

    Some(GitLog {
        hash: hash.to_string(),
        parents,
        refs,
        date: field(4).to_string(),
        author: field(5).to_string(),
        subject: field(6).to_string(),
    })
}

/// Parse one `git show-ref` line: `<hash> <refname>`.
pub fn parse_show_ref_line(line: &str) -> Option<GitRef> {
    let caps = SHOW_REF_PATTERN.captures(line)?;
    let hash = caps.get(1)?.as_str();
    Some(parse_reference(hash, caps.get(2).map(|m| m.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "0123456789abcdef0123456789abcdef01234567";

    #[test]
    fn test_parse_branch_reference() {
        let r = parse_reference(HASH, Some("refs/heads/main"));
        assert_eq!(r.hash, HASH);
        assert_eq!(r.name, "main");
        assert_eq!(r.ref_type, RefType::Branch);
        assert!(!r.current);
        assert_eq!(r.remote, None);
        assert_eq!(r.fullname, "refs/heads/main");
        assert_eq!(r.order, 1);
    }

    #[test]
    fn test_parse_current_branch_reference() {
        let r = parse_reference(HASH, Some("HEAD -> refs/heads/main"));
        assert_eq!(r.name, "main");
        assert_eq!(r.ref_type, RefType::Branch);
        assert!(r.current);
        assert_eq!(r.fullname, "refs/heads/main");
    }

    #[test]
    fn test_parse_remote_reference() {
        let r = parse_reference(HASH, Some("refs/remotes/origin/feature"));
        assert_eq!(r.ref_type, RefType::Remote);
        assert_eq!(r.remote.as_deref(), Some("origin"));
        assert_eq!(r.name, "origin/feature");
    }

    #[test]
    fn test_parse_tag_decoration() {
        let r = parse_reference(HASH, Some("tag: refs/tags/v1.0"));
        assert_eq!(r.ref_type, RefType::Tag);
        assert_eq!(r.name, "v1.0");
        assert!(!r.current);
    }

    #[test]
    fn test_parse_stash_reference_without_name() {
        let r = parse_reference(HASH, Some("refs/stash"));
        assert_eq!(r.ref_type, RefType::Stash);
        assert_eq!(r.name, "refs/stash");
    }

    #[test]
    fn test_parse_missing_reference_is_commit() {
        let r = parse_reference(HASH, None);
        assert_eq!(r.ref_type, RefType::Commit);
        assert_eq!(r.name, "0123456");
        assert_eq!(r.fullname, HASH);

        assert_eq!(parse_reference(HASH, Some("")).ref_type, RefType::Commit);
    }

    #[test]
    fn test_parse_unrecognized_reference_is_other() {
        let r = parse_reference(HASH, Some("HEAD"));
        assert_eq!(r.ref_type, RefType::Other);
        assert_eq!(r.name, "HEAD");
        assert_eq!(r.order, UNRESOLVED_ORDER);

        let r = parse_reference(HASH, Some("refs/notes/commits"));
        assert_eq!(r.ref_type, RefType::Other);
        assert_eq!(r.name, "refs/notes/commits");
    }

    #[test]
    fn test_sort_by_type_then_name() {
        let mut refs = vec![
            parse_reference(HASH, Some("refs/stash")),
            parse_reference(HASH, Some("refs/heads/main")),
            parse_reference(HASH, Some("refs/tags/v1")),
        ];
        sort_references(&mut refs);
        let types: Vec<RefType> = refs.iter().map(|r| r.ref_type).collect();
        assert_eq!(types, vec![RefType::Branch, RefType::Tag, RefType::Stash]);

        let mut refs = vec![
            parse_reference(HASH, Some("refs/heads/b")),
            parse_reference(HASH, Some("refs/heads/a")),
        ];
        sort_references(&mut refs);
        let names: Vec<&str> = refs.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_parse_log_line() {
        let log =
            parse_log_line("abc123|def456|refs/heads/main|2024-01-01T00:00:00Z|Alice|Fix bug")
                .unwrap();
        assert_eq!(log.hash, "abc123");
        assert_eq!(log.parents, vec!["def456"]);
        assert_eq!(log.refs.len(), 1);
        assert_eq!(log.refs[0].name, "main");
        assert_eq!(log.refs[0].ref_type, RefType::Branch);
        assert_eq!(log.date, "2024-01-01T00:00:00Z");
        assert_eq!(log.author, "Alice");
        assert_eq!(log.subject, "Fix bug");
    }

    #[test]
    fn test_parse_log_line_with_merge_and_decorations() {
        let line = "m1|p1 p2|tag: refs/tags/v2, HEAD -> refs/heads/main, refs/remotes/origin/main|2024-02-03T04:05:06+01:00|Bob Smith|Merge branch 'x' | keep pipes";
        let log = parse_log_line(line).unwrap();
        assert_eq!(log.parents, vec!["p1", "p2"]);
        assert!(log.is_merge());

        let names: Vec<&str> = log.refs.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["main", "origin/main", "v2"]);
        assert!(log.refs[0].current);
        assert_eq!(log.author, "Bob Smith");
        assert_eq!(log.subject, "Merge branch 'x' | keep pipes");
    }

    #[test]
    fn test_parse_root_commit_without_refs() {
        let log = parse_log_line("root|||2024-01-01T00:00:00Z|Alice|Initial commit").unwrap();
        assert!(log.parents.is_empty());
        assert!(log.refs.is_empty());
        assert_eq!(log.subject, "Initial commit");
    }

    #[test]
    fn test_unmatched_log_lines_are_skipped() {
        assert!(parse_log_line("").is_none());
        assert!(parse_log_line("not a log line").is_none());
        assert!(parse_log_line("abc|def").is_none());
    }

    #[test]
    fn test_parse_show_ref_line() {
        let r = parse_show_ref_line(&format!("{HASH} refs/remotes/upstream/dev")).unwrap();
        assert_eq!(r.hash, HASH);
        assert_eq!(r.remote.as_deref(), Some("upstream"));
        assert_eq!(r.name, "upstream/dev");

        assert!(parse_show_ref_line("").is_none());
    }
}
