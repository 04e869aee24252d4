use std::cmp::Ordering;
use std::str::FromStr;

const NUMERIC_PREFIX: &str = "0123456789.-";

#[derive(Debug)]
pub(crate) enum Key<'a> {
    String {
        s: &'a str
    },
    Number {
        n: f64
    },
}

impl<'a> Key<'a> {
    /// Build a comparable key for a leading field.
    ///
    /// A field is a number when it starts with one of `0123456789.-` and parses as `f64`,
    /// otherwise it is text. Each field is classified on its own so that the resulting order is
    /// total: numbers sort between text that starts below `-` (including the empty field) and all
    /// other text, and plain text keeps its usual order.
    pub(crate) fn new(field: &'a str) -> Key<'a> {
        if Self::looks_numeric(field) {
            if let Ok(n) = f64::from_str(field.trim()) {
                return Key::Number { n };
            }
        }
        Key::String { s: field }
    }

    fn looks_numeric(field: &str) -> bool {
        field.chars()
            .next()
            .map_or(false, |c| NUMERIC_PREFIX.contains(c))
    }

    fn rank(&self) -> u8 {
        match self {
            Key::String { s } if s.chars().next().map_or(true, |c| c < '-') => 0,
            Key::Number { .. } => 1,
            Key::String { .. } => 2,
        }
    }
}

impl Eq for Key<'_> {}

impl PartialEq<Self> for Key<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl PartialOrd<Self> for Key<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Key::String { s }, Key::String { s: o }) => { s.cmp(o) }
            (Key::Number { n }, Key::Number { n: o }) => {
                if n.is_nan() && o.is_nan() {
                    Ordering::Equal
                } else if !n.is_nan() && o.is_nan() {
                    Ordering::Greater
                } else if n.is_nan() && !o.is_nan() {
                    Ordering::Less
                } else {
                    n.partial_cmp(o).unwrap_or(Ordering::Equal)
                }
            }
            _ => self.rank().cmp(&other.rank()),
        }
    }
}
