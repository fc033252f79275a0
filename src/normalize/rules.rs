/// Condition over a normalized key (uppercase, trimmed, accents stripped).
/// Needles are written in the same form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Contains(&'static str),
    ContainsAny(&'static [&'static str]),
    Equals(&'static str),
    All(Vec<Predicate>),
}

impl Predicate {
    pub fn matches(&self, key: &str) -> bool {
        match self {
            Predicate::Contains(needle) => key.contains(needle),
            Predicate::ContainsAny(needles) => needles.iter().any(|n| key.contains(n)),
            Predicate::Equals(exact) => key == *exact,
            Predicate::All(parts) => parts.iter().all(|p| p.matches(key)),
        }
    }
}

/// One entry of an ordered rule list: first matching rule wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeuristicRule {
    pub name: &'static str,
    pub predicate: Predicate,
    pub canonical: &'static str,
}

impl HeuristicRule {
    pub fn new(name: &'static str, predicate: Predicate, canonical: &'static str) -> Self {
        Self {
            name,
            predicate,
            canonical,
        }
    }

    pub fn matches(&self, key: &str) -> bool {
        self.predicate.matches(key)
    }
}

/// Evaluate `rules` in declaration order and return the first hit.
pub fn first_match<'a>(rules: &'a [HeuristicRule], key: &str) -> Option<&'a HeuristicRule> {
    rules.iter().find(|r| r.matches(key))
}
