use std::fmt;

/// Relationship a package declares towards another package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkKind {
    Require,
    RequireDev,
    Provide,
    Conflict,
    Replace,
}

impl LinkKind {
    /// Key of the relationship in `composer.json`.
    pub fn key(&self) -> &'static str {
        match self {
            LinkKind::Require => "require",
            LinkKind::RequireDev => "require-dev",
            LinkKind::Provide => "provide",
            LinkKind::Conflict => "conflict",
            LinkKind::Replace => "replace",
        }
    }

    /// Section heading used when listing links.
    pub fn title(&self) -> &'static str {
        match self {
            LinkKind::Require => "requires",
            LinkKind::RequireDev => "requires (dev)",
            LinkKind::Provide => "provides",
            LinkKind::Conflict => "conflicts",
            LinkKind::Replace => "replaces",
        }
    }
}

/// A declared dependency edge: `source` relates to `target` under `pretty_constraint`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub source: String,
    pub target: String,
    pub kind: LinkKind,
    pub pretty_constraint: String,
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.target, self.pretty_constraint)
    }
}
