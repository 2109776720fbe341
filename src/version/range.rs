//! npm-style dependency range handling on top of the `semver` crate.
//!
//! `semver::VersionReq` follows Cargo's grammar, where a bare `1.2.3` means
//! `^1.2.3` and comparators are comma separated. npm ranges are translated
//! into that grammar before parsing: bare versions become exact matches,
//! whitespace separated comparators are joined with commas and hyphen ranges
//! become a `>=`/`<=` pair. `||` alternatives are kept as a list.
use regex::Regex;
use semver::{Version, VersionReq};
use std::sync::LazyLock;

static CARET_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\^[\w\-+.]+$").unwrap());

static TILDE_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^~[\w\-+.]+$").unwrap());

const OPERATORS: [&str; 6] = [">=", "<=", ">", "<", "=", "~"];

/// A parsed npm dependency range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRange {
    /// `*`, `x`, `X` or empty.
    Any,
    /// A plain version, optionally written with `=` or `v`.
    Exact(Version),
    /// One or more alternatives joined with `||`.
    Alternatives(Vec<VersionReq>),
}

impl VersionRange {
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            VersionRange::Any => true,
            VersionRange::Exact(exact) => exact == version,
            VersionRange::Alternatives(reqs) => {
                reqs.iter().any(|req| req.matches(version))
            }
        }
    }
}

/// Parse a version leniently: surrounding whitespace, a leading `=` or `v`.
pub fn parse_version(raw: &str) -> Option<Version> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('=').unwrap_or(trimmed).trim_start();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    Version::parse(trimmed).ok()
}

pub fn parse_range(raw: &str) -> Option<VersionRange> {
    let raw = raw.trim();

    if is_wildcard(raw) {
        return Some(VersionRange::Any);
    }

    if let Some(exact) = parse_version(raw) {
        return Some(VersionRange::Exact(exact));
    }

    let mut reqs = vec![];

    for alternative in raw.split("||") {
        let alternative = alternative.trim();

        if is_wildcard(alternative) {
            return Some(VersionRange::Any);
        }

        let translated = translate_comparators(alternative)?;
        reqs.push(VersionReq::parse(&translated).ok()?);
    }

    Some(VersionRange::Alternatives(reqs))
}

/// True when `version` falls within `range`. Unparseable input never
/// satisfies anything except a wildcard.
pub fn satisfies(version: &str, range: &str) -> bool {
    let Some(range) = parse_range(range) else {
        return false;
    };

    if range == VersionRange::Any {
        return true;
    }

    parse_version(version).is_some_and(|v| range.matches(&v))
}

/// Rewrite `existing` so it points at `new_version`, keeping its operator
/// style. Only caret, tilde and exact forms can be rewritten.
pub fn update_range(existing: &str, new_version: &str) -> Option<String> {
    let existing = existing.trim();

    if CARET_RANGE.is_match(existing) {
        return Some(format!("^{new_version}"));
    }

    if TILDE_RANGE.is_match(existing) {
        return Some(format!("~{new_version}"));
    }

    if parse_version(existing).is_some() {
        if existing.starts_with('=') {
            return Some(format!("={new_version}"));
        }
        return Some(new_version.to_string());
    }

    None
}

fn is_wildcard(raw: &str) -> bool {
    matches!(raw, "" | "*" | "x" | "X")
}

fn translate_comparators(alternative: &str) -> Option<String> {
    let tokens: Vec<&str> = alternative.split_whitespace().collect();

    // a - b
    if tokens.len() == 3 && tokens[1] == "-" {
        return Some(format!(
            ">={}, <={}",
            strip_v(tokens[0]),
            strip_v(tokens[2])
        ));
    }

    let mut comparators = vec![];
    let mut pending_op: Option<&str> = None;

    for token in tokens {
        if OPERATORS.contains(&token) || token == "^" {
            pending_op = Some(token);
            continue;
        }

        let token = match pending_op.take() {
            Some(op) => format!("{op}{token}"),
            None => token.to_string(),
        };

        comparators.push(translate_comparator(&token));
    }

    if pending_op.is_some() || comparators.is_empty() {
        return None;
    }

    Some(comparators.join(", "))
}

fn translate_comparator(token: &str) -> String {
    let op_len = token
        .find(|c: char| c.is_ascii_alphanumeric() || c == '*')
        .unwrap_or(token.len());
    let (op, version) = token.split_at(op_len);

    // 1.x -> 1, 1.2.* -> 1.2; a partial version matches like a wildcard
    let version = strip_v(version)
        .split('.')
        .take_while(|part| !matches!(*part, "x" | "X" | "*"))
        .collect::<Vec<_>>()
        .join(".");

    if version.is_empty() {
        return "*".to_string();
    }

    if op.is_empty() {
        format!("={version}")
    } else {
        format!("{op}{version}")
    }
}

fn strip_v(raw: &str) -> &str {
    raw.strip_prefix('v').unwrap_or(raw)
}
