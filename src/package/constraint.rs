//! Composer version constraints.
//!
//! Supported syntax: `*`, exact versions, `=`/`==`/`!=`/`<>`/`<`/`<=`/`>`/`>=`,
//! wildcards (`1.0.*`), tilde (`~1.2`), caret (`^1.2.3`), hyphen ranges
//! (`1.0 - 2.0`), AND by space or comma, OR by `||`, `dev-` branches and
//! `@stability` flags.

use anyhow::{Context, Result, anyhow, bail};
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use super::version::{Stability, normalize, version_compare};

static OR_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\|\|?\s*").expect("valid or regex"));

static OPERATOR_SPACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(>=|<=|!=|==|<>|>|<|=|\^|~)\s+").expect("valid operator regex")
});

static ALIAS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+as\s+\S+").expect("valid alias regex"));

static HYPHEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\S+)\s+-\s+(\S+)$").expect("valid hyphen regex"));

static AND_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s,]+").expect("valid and regex"));

static ANY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^v?[xX*](\.[xX*])*$").expect("valid any regex"));

static WILDCARD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^v?(\d+)(?:\.(\d+))?(?:\.(\d+))?(?:\.[xX*])+$").expect("valid wildcard regex")
});

static RANGE_HEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^v?(\d+)(?:\.(\d+))?(?:\.(\d+))?(?:\.(\d+))?([._-]?(?:stable|beta|b|RC|alpha|a|patch|pl|p)(?:[.-]?\d+)*)?([.-]?dev)?$")
        .expect("valid range regex")
});

static COMPARISON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(<>|!=|>=?|<=?|==?)?\s*(.+)$").expect("valid comparison regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Operator {
    fn parse(op: &str) -> Self {
        match op {
            "!=" | "<>" => Operator::Ne,
            "<" => Operator::Lt,
            "<=" => Operator::Le,
            ">" => Operator::Gt,
            ">=" => Operator::Ge,
            _ => Operator::Eq,
        }
    }

    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Operator::Eq => ordering == Ordering::Equal,
            Operator::Ne => ordering != Ordering::Equal,
            Operator::Lt => ordering == Ordering::Less,
            Operator::Le => ordering != Ordering::Greater,
            Operator::Gt => ordering == Ordering::Greater,
            Operator::Ge => ordering != Ordering::Less,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
        };
        f.write_str(op)
    }
}

/// A parsed constraint over normalized versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    Any,
    Single { op: Operator, version: String },
    All(Vec<Constraint>),
    AnyOf(Vec<Constraint>),
}

impl Constraint {
    /// Parses a constraint string; fails on anything that is not valid Composer syntax.
    pub fn parse(input: &str) -> Result<Self> {
        parse_constraints(input)
            .with_context(|| format!("Could not parse version constraint {}", input.trim()))
    }

    fn single(op: Operator, version: String) -> Self {
        Constraint::Single { op, version }
    }

    /// Whether a normalized version satisfies the constraint.
    ///
    /// `dev-` branches only ever satisfy `==`/`!=` against a branch name.
    pub fn matches(&self, version: &str) -> bool {
        match self {
            Constraint::Any => true,
            Constraint::Single { op, version: bound } => compare(version, *op, bound),
            Constraint::All(parts) => parts.iter().all(|c| c.matches(version)),
            Constraint::AnyOf(parts) => parts.iter().any(|c| c.matches(version)),
        }
    }

    /// The exact version this constraint pins, if it is a plain `==`.
    pub fn exact_version(&self) -> Option<&str> {
        match self {
            Constraint::Single {
                op: Operator::Eq,
                version,
            } => Some(version),
            _ => None,
        }
    }
}

fn compare(version: &str, op: Operator, bound: &str) -> bool {
    let version_is_branch = version.starts_with("dev-");
    let bound_is_branch = bound.starts_with("dev-");

    if op == Operator::Ne && (version_is_branch || bound_is_branch) {
        return version != bound;
    }
    if version_is_branch && bound_is_branch {
        return op == Operator::Eq && version == bound;
    }
    if version_is_branch || bound_is_branch {
        return false;
    }

    op.accepts(version_compare(version, bound))
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Any => f.write_str("*"),
            Constraint::Single { op, version } => write!(f, "{} {}", op, version),
            Constraint::All(parts) => {
                let parts: Vec<String> = parts.iter().map(|c| c.to_string()).collect();
                write!(f, "[{}]", parts.join(" "))
            }
            Constraint::AnyOf(parts) => {
                let parts: Vec<String> = parts.iter().map(|c| c.to_string()).collect();
                write!(f, "[{}]", parts.join(" || "))
            }
        }
    }
}

fn parse_constraints(input: &str) -> Result<Constraint> {
    let input = ALIAS.replace_all(input.trim(), "");
    if input.is_empty() {
        bail!("empty constraint");
    }

    let mut alternatives = Vec::new();
    for branch in OR_SPLIT.split(&input) {
        if branch.is_empty() {
            bail!("empty alternative");
        }
        alternatives.push(parse_conjunction(branch)?);
    }

    Ok(simplify(alternatives, Constraint::AnyOf))
}

fn parse_conjunction(branch: &str) -> Result<Constraint> {
    let branch = OPERATOR_SPACE.replace_all(branch.trim(), "$1");

    if let Some(caps) = HYPHEN.captures(&branch) {
        return parse_hyphen_range(&caps[1], &caps[2]);
    }

    let mut parts = Vec::new();
    for atom in AND_SPLIT.split(&branch).filter(|a| !a.is_empty()) {
        parts.extend(parse_atom(atom)?);
    }

    if parts.is_empty() {
        bail!("empty constraint");
    }
    Ok(simplify(parts, Constraint::All))
}

fn simplify(mut parts: Vec<Constraint>, wrap: fn(Vec<Constraint>) -> Constraint) -> Constraint {
    if parts.len() == 1 {
        parts.remove(0)
    } else {
        wrap(parts)
    }
}

/// Drops `@stability` flags and `#reference` suffixes.
fn strip_flags(atom: &str) -> Result<&str> {
    let mut atom = atom;
    if let Some((head, flag)) = atom.rsplit_once('@') {
        if Stability::parse(flag).is_none() {
            bail!("unknown stability flag @{}", flag);
        }
        atom = head;
    }
    if atom.starts_with("dev-") {
        if let Some((head, _reference)) = atom.split_once('#') {
            atom = head;
        }
    }
    Ok(atom)
}

fn parse_atom(atom: &str) -> Result<Vec<Constraint>> {
    let atom = strip_flags(atom)?;

    if atom.is_empty() || ANY.is_match(atom) {
        return Ok(vec![Constraint::Any]);
    }

    if let Some(caps) = WILDCARD.captures(atom) {
        let numbers = captured_numbers(&caps, 1..=3)?;
        let position = numbers.iter().filter(|n| n.is_some()).count();
        let low = format!("{}-dev", bump(&numbers, position, 0)?);
        let high = format!("{}-dev", bump(&numbers, position, 1)?);
        return Ok(vec![
            Constraint::single(Operator::Ge, low),
            Constraint::single(Operator::Lt, high),
        ]);
    }

    if let Some(rest) = atom.strip_prefix('~') {
        let rest = rest.strip_prefix('>').unwrap_or(rest);
        return parse_tilde(rest);
    }

    if let Some(rest) = atom.strip_prefix('^') {
        return parse_caret(rest);
    }

    let caps = COMPARISON
        .captures(atom)
        .ok_or_else(|| anyhow!("invalid constraint {}", atom))?;
    let op = Operator::parse(caps.get(1).map(|m| m.as_str()).unwrap_or("="));
    let raw = &caps[2];
    let mut version = normalize(raw)?;

    // "<2.0" must exclude 2.0 pre-releases, ">=1.0" must include them
    if matches!(op, Operator::Lt | Operator::Ge)
        && !raw.starts_with("dev-")
        && !has_stability_suffix(&version)
    {
        version.push_str("-dev");
    }

    Ok(vec![Constraint::single(op, version)])
}

fn has_stability_suffix(normalized: &str) -> bool {
    normalized
        .rsplit_once('-')
        .is_some_and(|(_, suffix)| {
            let word: String = suffix.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
            matches!(
                word.to_ascii_lowercase().as_str(),
                "stable" | "rc" | "beta" | "alpha" | "dev" | "patch"
            )
        })
}

fn parse_tilde(rest: &str) -> Result<Vec<Constraint>> {
    let caps = RANGE_HEAD
        .captures(rest)
        .ok_or_else(|| anyhow!("invalid tilde constraint ~{}", rest))?;
    let numbers = captured_numbers(&caps, 1..=4)?;
    let position = numbers.iter().filter(|n| n.is_some()).count().max(1);

    let high = format!("{}-dev", bump(&numbers, (position - 1).max(1), 1)?);
    let low = normalize(&with_dev_suffix(rest, &caps))?;

    Ok(vec![
        Constraint::single(Operator::Ge, low),
        Constraint::single(Operator::Lt, high),
    ])
}

fn parse_caret(rest: &str) -> Result<Vec<Constraint>> {
    let caps = RANGE_HEAD
        .captures(rest)
        .ok_or_else(|| anyhow!("invalid caret constraint ^{}", rest))?;
    let numbers = captured_numbers(&caps, 1..=4)?;

    // the first non-zero component is the one that may not change
    let position = if numbers[0] != Some(0) || numbers[1].is_none() {
        1
    } else if numbers[1] != Some(0) || numbers[2].is_none() {
        2
    } else {
        3
    };

    let high = format!("{}-dev", bump(&numbers, position, 1)?);
    let low = normalize(&with_dev_suffix(rest, &caps))?;

    Ok(vec![
        Constraint::single(Operator::Ge, low),
        Constraint::single(Operator::Lt, high),
    ])
}

fn parse_hyphen_range(from: &str, to: &str) -> Result<Constraint> {
    let from_caps = RANGE_HEAD
        .captures(from)
        .ok_or_else(|| anyhow!("invalid range start {}", from))?;
    let to_caps = RANGE_HEAD
        .captures(to)
        .ok_or_else(|| anyhow!("invalid range end {}", to))?;

    let low = normalize(&with_dev_suffix(from, &from_caps))?;

    let to_numbers = captured_numbers(&to_caps, 1..=4)?;
    let has_modifier = to_caps.get(5).is_some() || to_caps.get(6).is_some();
    let upper = if (to_numbers[1].is_some() && to_numbers[2].is_some()) || has_modifier {
        Constraint::single(Operator::Le, normalize(to)?)
    } else {
        let position = if to_numbers[1].is_none() { 1 } else { 2 };
        Constraint::single(Operator::Lt, format!("{}-dev", bump(&to_numbers, position, 1)?))
    };

    Ok(Constraint::All(vec![
        Constraint::single(Operator::Ge, low),
        upper,
    ]))
}

/// Appends `-dev` to a range bound that carries no stability of its own.
fn with_dev_suffix(raw: &str, caps: &regex::Captures<'_>) -> String {
    if caps.get(5).is_none() && caps.get(6).is_none() {
        format!("{}-dev", raw)
    } else {
        raw.to_string()
    }
}

fn captured_numbers(
    caps: &regex::Captures<'_>,
    groups: std::ops::RangeInclusive<usize>,
) -> Result<Vec<Option<u64>>> {
    let mut numbers: Vec<Option<u64>> = groups
        .map(|i| {
            caps.get(i)
                .map(|m| m.as_str().parse::<u64>())
                .transpose()
                .context("version component out of range")
        })
        .collect::<Result<_>>()?;
    numbers.resize(4, None);
    Ok(numbers)
}

/// Builds a four-component version: components after `position` are zeroed
/// and the one at `position` (1-based) is incremented by `increment`.
fn bump(numbers: &[Option<u64>], position: usize, increment: u64) -> Result<String> {
    let mut parts = Vec::with_capacity(4);
    for i in 1..=4 {
        let n = numbers.get(i - 1).copied().flatten().unwrap_or(0);
        let part = if i > position {
            0
        } else if i == position {
            n.checked_add(increment)
                .context("version component out of range")?
        } else {
            n
        };
        parts.push(part.to_string());
    }
    Ok(parts.join("."))
}
