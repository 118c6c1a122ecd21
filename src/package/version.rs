//! Composer version strings.
//!
//! Normalization follows Composer's rules (`1.2` becomes `1.2.0.0`,
//! `v2.0-beta1` becomes `2.0.0.0-beta1`, `1.0.x-dev` becomes
//! `1.0.9999999.9999999-dev`), and ordering follows PHP's
//! `version_compare`.

use anyhow::{Result, bail};
use regex::Regex;
use std::cmp::Ordering;
use std::sync::LazyLock;

const MODIFIER: &str = r"[._-]?(?:(stable|beta|b|RC|alpha|a|patch|pl|p)((?:[.-]?\d+)*)?)?([.-]?dev)?";

static CLASSICAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)^v?(\d{{1,5}})(\.\d+)?(\.\d+)?(\.\d+)?{}$", MODIFIER))
        .expect("valid classical version regex")
});

static DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)^v?(\d{{4}}(?:[.:-]?\d{{2}}){{1,6}}(?:[.:-]?\d{{1,3}}){{0,2}}){}$",
        MODIFIER
    ))
    .expect("valid date version regex")
});

static STABILITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i){}(?:\+.*)?$", MODIFIER)).expect("valid stability regex")
});

static BRANCH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^v?(\d+)(\.(?:\d+|[x*]))?(\.(?:\d+|[x*]))?(\.(?:\d+|[x*]))?$")
        .expect("valid branch regex")
});

/// Placeholder used for wildcard branch segments (`1.0.x-dev`).
const BRANCH_WILDCARD: &str = "9999999";

/// Release stability, from most to least stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stability {
    Stable,
    RC,
    Beta,
    Alpha,
    Dev,
}

impl Stability {
    pub fn parse(flag: &str) -> Option<Self> {
        match flag.to_ascii_lowercase().as_str() {
            "stable" => Some(Stability::Stable),
            "rc" => Some(Stability::RC),
            "beta" => Some(Stability::Beta),
            "alpha" => Some(Stability::Alpha),
            "dev" => Some(Stability::Dev),
            _ => None,
        }
    }
}

/// Normalizes a version string the way Composer stores `version_normalized`.
pub fn normalize(version: &str) -> Result<String> {
    let original = version;
    let mut version = version.trim();

    // "1.0.x-dev as 1.0.0": the alias is not the real version
    if let Some((real, _alias)) = version.split_once(" as ") {
        version = real.trim();
    }

    // strip a trailing stability flag ("1.0@beta")
    if let Some((head, flag)) = version.rsplit_once('@') {
        if Stability::parse(flag).is_some() {
            version = head;
        }
    }

    if matches!(version.to_ascii_lowercase().as_str(), "master" | "trunk" | "default") {
        return Ok(format!("dev-{}", version));
    }

    if version.get(..4).is_some_and(|p| p.eq_ignore_ascii_case("dev-")) {
        return Ok(format!("dev-{}", &version[4..]));
    }

    // build metadata does not take part in ordering
    let version = match version.split_once('+') {
        Some((head, _)) if !head.is_empty() && !head.contains(char::is_whitespace) => head,
        _ => version,
    };

    if let Some(caps) = CLASSICAL.captures(version) {
        let mut normalized = caps[1].to_string();
        for i in 2..=4 {
            normalized.push_str(caps.get(i).map(|m| m.as_str()).unwrap_or(".0"));
        }
        return Ok(append_modifier(normalized, &caps, 5));
    }

    if let Some(caps) = DATE.captures(version) {
        let normalized: String = caps[1]
            .chars()
            .map(|c| if c.is_ascii_digit() { c } else { '.' })
            .collect();
        return Ok(append_modifier(normalized, &caps, 2));
    }

    let lower = version.to_ascii_lowercase();
    if let Some(branch) = lower
        .strip_suffix("dev")
        .map(|b| b.trim_end_matches(['.', '-']))
    {
        let normalized = normalize_branch(&version[..branch.len()]);
        if !normalized.starts_with("dev-") {
            return Ok(normalized);
        }
    }

    bail!("Invalid version string \"{}\"", original)
}

fn append_modifier(mut version: String, caps: &regex::Captures<'_>, index: usize) -> String {
    if let Some(modifier) = caps.get(index).map(|m| m.as_str()) {
        if modifier.eq_ignore_ascii_case("stable") {
            return version;
        }
        let number = caps
            .get(index + 1)
            .map(|m| m.as_str().trim_start_matches(['.', '-']))
            .unwrap_or("");
        version.push('-');
        version.push_str(expand_stability(modifier));
        version.push_str(number);
    }
    if caps.get(index + 2).is_some() {
        version.push_str("-dev");
    }
    version
}

fn expand_stability(modifier: &str) -> &'static str {
    match modifier.to_ascii_lowercase().as_str() {
        "a" | "alpha" => "alpha",
        "b" | "beta" => "beta",
        "p" | "pl" | "patch" => "patch",
        "rc" => "RC",
        _ => "stable",
    }
}

/// Normalizes a branch name: numeric branches get wildcard segments filled
/// in (`1.0.x` -> `1.0.9999999.9999999-dev`), anything else becomes `dev-<name>`.
pub fn normalize_branch(name: &str) -> String {
    let name = name.trim();

    if let Some(caps) = BRANCH.captures(name) {
        let mut parts = vec![caps[1].to_string()];
        for i in 2..=4 {
            let segment = caps
                .get(i)
                .map(|m| m.as_str().trim_start_matches('.'))
                .unwrap_or("x");
            parts.push(if segment == "x" || segment == "X" || segment == "*" {
                BRANCH_WILDCARD.to_string()
            } else {
                segment.to_string()
            });
        }
        return format!("{}-dev", parts.join("."));
    }

    format!("dev-{}", name)
}

/// Stability of a (pretty or normalized) version.
pub fn stability(version: &str) -> Stability {
    let version = version.split('#').next().unwrap_or(version).trim();
    let lower = version.to_ascii_lowercase();

    if lower.starts_with("dev-") || lower.ends_with("-dev") {
        return Stability::Dev;
    }

    let Some(caps) = STABILITY.captures(version) else {
        return Stability::Stable;
    };

    if caps.get(3).is_some() {
        return Stability::Dev;
    }

    match caps.get(1).map(|m| m.as_str().to_ascii_lowercase()).as_deref() {
        Some("beta" | "b") => Stability::Beta,
        Some("alpha" | "a") => Stability::Alpha,
        Some("rc") => Stability::RC,
        _ => Stability::Stable,
    }
}

/// Whether a version denotes a development branch.
pub fn is_dev(version: &str) -> bool {
    stability(version) == Stability::Dev
}

/// Check if two version strings match.
///
/// Handles the 'v' prefix flexibly (e.g., "v1.0.0" matches "1.0.0").
pub fn versions_match(v1: &str, v2: &str) -> bool {
    let n1 = v1.strip_prefix('v').unwrap_or(v1);
    let n2 = v2.strip_prefix('v').unwrap_or(v2);
    n1 == n2
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Number(String),
    Word(String),
}

/// Splits a version into PHP's canonical segments: separators `-`, `_`, `+`
/// and `.` delimit, and every switch between digits and letters starts a new
/// segment.
fn canonical_segments(version: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut current_is_digit = false;

    let mut flush = |current: &mut String, is_digit: bool| {
        if current.is_empty() {
            return;
        }
        let text = std::mem::take(current);
        segments.push(if is_digit {
            Segment::Number(text)
        } else {
            Segment::Word(text)
        });
    };

    for c in version.chars() {
        if matches!(c, '.' | '-' | '_' | '+') {
            flush(&mut current, current_is_digit);
            continue;
        }
        let is_digit = c.is_ascii_digit();
        if !current.is_empty() && is_digit != current_is_digit {
            flush(&mut current, current_is_digit);
        }
        current_is_digit = is_digit;
        current.push(c);
    }
    flush(&mut current, current_is_digit);

    segments
}

/// Rank of a non-numeric segment; a number ranks as `#`.
fn special_rank(word: &str) -> i8 {
    const FORMS: [(&str, i8); 10] = [
        ("dev", 0),
        ("alpha", 1),
        ("a", 1),
        ("beta", 2),
        ("b", 2),
        ("RC", 3),
        ("rc", 3),
        ("#", 4),
        ("pl", 5),
        ("p", 5),
    ];
    FORMS
        .iter()
        .find(|(name, _)| word.starts_with(name))
        .map(|(_, rank)| *rank)
        .unwrap_or(-6)
}

fn compare_numbers(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn compare_segments(a: &Segment, b: &Segment) -> Ordering {
    match (a, b) {
        (Segment::Number(x), Segment::Number(y)) => compare_numbers(x, y),
        (Segment::Word(x), Segment::Word(y)) => special_rank(x).cmp(&special_rank(y)),
        (Segment::Number(_), Segment::Word(y)) => special_rank("#").cmp(&special_rank(y)),
        (Segment::Word(x), Segment::Number(_)) => special_rank(x).cmp(&special_rank("#")),
    }
}

/// Orders two versions with the semantics of PHP's `version_compare`.
///
/// Numeric segments compare numerically; words rank
/// `dev < alpha < beta < RC < (number) < patch`, unknown words lowest.
/// A trailing numeric segment makes a version newer (`1.0 < 1.0.0`),
/// a trailing pre-release word makes it older (`1.0.0-dev < 1.0.0`).
pub fn version_compare(a: &str, b: &str) -> Ordering {
    let left = canonical_segments(a);
    let right = canonical_segments(b);

    for (x, y) in left.iter().zip(right.iter()) {
        let ordering = compare_segments(x, y);
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    match left.len().cmp(&right.len()) {
        Ordering::Greater => match &left[right.len()] {
            Segment::Number(_) => Ordering::Greater,
            Segment::Word(w) => special_rank(w).cmp(&special_rank("#")),
        },
        Ordering::Less => match &right[left.len()] {
            Segment::Number(_) => Ordering::Less,
            Segment::Word(w) => special_rank("#").cmp(&special_rank(w)),
        },
        Ordering::Equal => Ordering::Equal,
    }
}
