//! Git record types

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Kind of a named pointer to a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefType {
    Branch,
    Remote,
    Tag,
    Stash,
    Commit,
    Other,
}

impl RefType {
    /// Sort key: branch < remote < tag < stash < commit < other.
    pub fn order(self) -> u32 {
        match self {
            RefType::Branch => 1,
            RefType::Remote => 2,
            RefType::Tag => 3,
            RefType::Stash => 4,
            RefType::Commit => 5,
            RefType::Other => UNRESOLVED_ORDER,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RefType::Branch => "branch",
            RefType::Remote => "remote",
            RefType::Tag => "tag",
            RefType::Stash => "stash",
            RefType::Commit => "commit",
            RefType::Other => "other",
        }
    }
}

/// Sort key given to anything that could not be classified.
pub const UNRESOLVED_ORDER: u32 = 999;

impl fmt::Display for RefType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitRef {
    pub hash: String,
    /// Short display name, e.g. `main` or `origin/main`
    pub name: String,
    #[serde(rename = "type")]
    pub ref_type: RefType,
    /// Owning remote for remote-tracking branches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    /// Whether `HEAD` points here
    #[serde(default)]
    pub current: bool,
    pub fullname: String,
    pub order: u32,
}

impl GitRef {
    /// Canonical order: sort key, then name.
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.order
            .cmp(&other.order)
            .then_with(|| self.name.cmp(&other.name))
    }
}

/// One commit from `git log`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLog {
    pub hash: String,
    /// Empty for root commits
    pub parents: Vec<String>,
    /// Sorted with [`GitRef::canonical_cmp`]
    pub refs: Vec<GitRef>,
    /// ISO-8601 author date; empty when git printed none
    pub date: String,
    pub author: String,
    pub subject: String,
}

impl GitLog {
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    pub fn short_hash(&self) -> &str {
        self.hash.get(..7).unwrap_or(&self.hash)
    }
}

/// Selection flags for [`crate::git::GitReader::log`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogOptions {
    #[serde(default)]
    pub max_count: Option<u32>,
    #[serde(default)]
    pub skip: Option<u32>,
    #[serde(default)]
    pub all: bool,
    #[serde(default)]
    pub branches: bool,
    #[serde(default)]
    pub tags: bool,
    #[serde(default)]
    pub remotes: bool,
    #[serde(default)]
    pub simplify: bool,
}

impl Default for LogOptions {
    /// Every ref, simplified to decorated commits.
    fn default() -> Self {
        Self {
            max_count: None,
            skip: None,
            all: true,
            branches: false,
            tags: false,
            remotes: false,
            simplify: true,
        }
    }
}

impl LogOptions {
    /// Options with every flag off.
    pub fn none() -> Self {
        Self {
            all: false,
            simplify: false,
            ..Self::default()
        }
    }

    /// Arguments for `git log`, flags in a fixed order.
    pub fn to_args(&self) -> Vec<String> {
        let mut args: Vec<String> = [
            "log",
            "--no-color",
            "--decorate=full",
            "--pretty=%H|%P|%D|%aI|%an|%s",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        if let Some(count) = self.max_count.filter(|&n| n > 0) {
            args.push("-n".to_string());
            args.push(count.to_string());
        }
        if let Some(skip) = self.skip.filter(|&n| n > 0) {
            args.push(format!("--skip={skip}"));
        }
        if self.all {
            args.push("--all".to_string());
        }
        if self.branches {
            args.push("--branches".to_string());
        }
        if self.tags {
            args.push("--tags".to_string());
        }
        if self.remotes {
            args.push("--remotes".to_string());
        }
        if self.simplify {
            args.push("--simplify-by-decoration".to_string());
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_args() {
        assert_eq!(
            LogOptions::default().to_args(),
            vec![
                "log",
                "--no-color",
                "--decorate=full",
                "--pretty=%H|%P|%D|%aI|%an|%s",
                "--all",
                "--simplify-by-decoration",
            ]
        );
    }

    #[test]
    fn test_log_args_follow_fixed_order() {
        let options = LogOptions {
            max_count: Some(50),
            skip: Some(100),
            all: false,
            branches: true,
            tags: true,
            remotes: true,
            simplify: false,
        };
        assert_eq!(
            &options.to_args()[4..],
            ["-n", "50", "--skip=100", "--branches", "--tags", "--remotes"]
        );
    }

    #[test]
    fn test_zero_count_and_skip_are_omitted() {
        let options = LogOptions {
            max_count: Some(0),
            skip: Some(0),
            ..LogOptions::none()
        };
        assert_eq!(options.to_args().len(), 4);
    }

    #[test]
    fn test_ref_type_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&RefType::Remote).unwrap(), "\"remote\"");
        assert_eq!(RefType::Stash.to_string(), "stash");
        assert!(RefType::Stash.order() < RefType::Commit.order());
        assert!(RefType::Commit.order() < RefType::Other.order());
    }

    #[test]
    fn test_short_hash() {
        let log = GitLog {
            hash: "0123456789abcdef".to_string(),
            parents: vec!["a".to_string(), "b".to_string()],
            refs: Vec::new(),
            date: String::new(),
            author: String::new(),
            subject: String::new(),
        };
        assert_eq!(log.short_hash(), "0123456");
        assert!(log.is_merge());
    }
}
