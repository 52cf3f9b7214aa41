//! Value domains and constraints pushed down from the engine.
//!
//! A [`Constraint`] maps columns to the [`Domain`] of values the engine will
//! accept for them. Columns that do not appear are unconstrained.

use serde::{Deserialize, Serialize};

use crate::handle::ColumnHandle;

/// A comparable scalar used in filter domains.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Literal {
    Boolean(bool),
    BigInt(i64),
    Varchar(String),
    /// Milliseconds since the Unix epoch, UTC.
    Timestamp(i64),
}

impl Literal {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::Varchar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Literal::BigInt(i) | Literal::Timestamp(i) => Some(*i),
            _ => None,
        }
    }
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::BigInt(i) => write!(f, "{}", i),
            Literal::Varchar(s) => write!(f, "'{}'", s),
            Literal::Timestamp(t) => write!(f, "timestamp({})", t),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bound {
    Unbounded,
    Inclusive(Literal),
    Exclusive(Literal),
}

impl Bound {
    fn literal(&self) -> Option<&Literal> {
        match self {
            Bound::Unbounded => None,
            Bound::Inclusive(l) | Bound::Exclusive(l) => Some(l),
        }
    }
}

/// A contiguous interval of literals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub low: Bound,
    pub high: Bound,
}

impl Range {
    pub fn single(value: Literal) -> Self {
        Self {
            low: Bound::Inclusive(value.clone()),
            high: Bound::Inclusive(value),
        }
    }

    pub fn greater_than(value: Literal) -> Self {
        Self {
            low: Bound::Exclusive(value),
            high: Bound::Unbounded,
        }
    }

    pub fn greater_or_equal(value: Literal) -> Self {
        Self {
            low: Bound::Inclusive(value),
            high: Bound::Unbounded,
        }
    }

    pub fn less_than(value: Literal) -> Self {
        Self {
            low: Bound::Unbounded,
            high: Bound::Exclusive(value),
        }
    }

    pub fn less_or_equal(value: Literal) -> Self {
        Self {
            low: Bound::Unbounded,
            high: Bound::Inclusive(value),
        }
    }

    pub fn between(low: Literal, high: Literal) -> Self {
        Self {
            low: Bound::Inclusive(low),
            high: Bound::Inclusive(high),
        }
    }

    /// The value of a `[v, v]` range.
    pub fn single_value(&self) -> Option<&Literal> {
        match (&self.low, &self.high) {
            (Bound::Inclusive(a), Bound::Inclusive(b)) if a == b => Some(a),
            _ => None,
        }
    }

    pub fn includes(&self, value: &Literal) -> bool {
        let above_low = match &self.low {
            Bound::Unbounded => true,
            Bound::Inclusive(l) => value >= l,
            Bound::Exclusive(l) => value > l,
        };
        let below_high = match &self.high {
            Bound::Unbounded => true,
            Bound::Inclusive(h) => value <= h,
            Bound::Exclusive(h) => value < h,
        };
        above_low && below_high
    }

    /// Overlap of two ranges, `None` when they are disjoint.
    pub fn intersect(&self, other: &Range) -> Option<Range> {
        let low = tighter_low(&self.low, &other.low);
        let high = tighter_high(&self.high, &other.high);
        let range = Range { low, high };
        if range.is_empty() {
            None
        } else {
            Some(range)
        }
    }

    fn is_empty(&self) -> bool {
        match (&self.low, &self.high) {
            (Bound::Unbounded, _) | (_, Bound::Unbounded) => false,
            (Bound::Inclusive(l), Bound::Inclusive(h)) => l > h,
            (low, high) => match (low.literal(), high.literal()) {
                (Some(l), Some(h)) => l >= h,
                _ => false,
            },
        }
    }
}

fn tighter_low(a: &Bound, b: &Bound) -> Bound {
    match (a, b) {
        (Bound::Unbounded, other) | (other, Bound::Unbounded) => other.clone(),
        _ => {
            let (la, lb) = (a.literal(), b.literal());
            if la > lb {
                a.clone()
            } else if lb > la {
                b.clone()
            } else if matches!(a, Bound::Exclusive(_)) {
                a.clone()
            } else {
                b.clone()
            }
        }
    }
}

fn tighter_high(a: &Bound, b: &Bound) -> Bound {
    match (a, b) {
        (Bound::Unbounded, other) | (other, Bound::Unbounded) => other.clone(),
        _ => {
            let (ha, hb) = (a.literal(), b.literal());
            if ha < hb {
                a.clone()
            } else if hb < ha {
                b.clone()
            } else if matches!(a, Bound::Exclusive(_)) {
                a.clone()
            } else {
                b.clone()
            }
        }
    }
}

/// The set of values a column may take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// No constraint.
    All,
    /// A discrete set, kept sorted and de-duplicated. Empty means no value matches.
    Values(Vec<Literal>),
    /// A union of ranges.
    Ranges(Vec<Range>),
}

impl Domain {
    pub fn single(value: Literal) -> Self {
        Domain::Values(vec![value])
    }

    pub fn values(values: impl IntoIterator<Item = Literal>) -> Self {
        let mut values: Vec<Literal> = values.into_iter().collect();
        values.sort();
        values.dedup();
        Domain::Values(values)
    }

    pub fn ranges(ranges: Vec<Range>) -> Self {
        Domain::Ranges(ranges)
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Domain::All)
    }

    /// True when no value can satisfy the domain.
    pub fn is_none(&self) -> bool {
        match self {
            Domain::All => false,
            Domain::Values(v) => v.is_empty(),
            Domain::Ranges(r) => r.is_empty(),
        }
    }

    pub fn includes(&self, value: &Literal) -> bool {
        match self {
            Domain::All => true,
            Domain::Values(values) => values.binary_search(value).is_ok(),
            Domain::Ranges(ranges) => ranges.iter().any(|r| r.includes(value)),
        }
    }

    /// The only value admitted by this domain, if there is exactly one.
    pub fn single_value(&self) -> Option<&Literal> {
        match self {
            Domain::Values(values) if values.len() == 1 => values.first(),
            Domain::Ranges(ranges) if ranges.len() == 1 => ranges[0].single_value(),
            _ => None,
        }
    }

    /// All admitted values when the domain is a finite set of points.
    pub fn discrete_values(&self) -> Option<Vec<Literal>> {
        match self {
            Domain::All => None,
            Domain::Values(values) => Some(values.clone()),
            Domain::Ranges(ranges) => {
                let points: Option<Vec<Literal>> =
                    ranges.iter().map(|r| r.single_value().cloned()).collect();
                points.map(|mut p| {
                    p.sort();
                    p.dedup();
                    p
                })
            }
        }
    }

    /// Smallest value the domain admits as a lower bound, `None` if unbounded below.
    pub fn lower_bound(&self) -> Option<&Literal> {
        match self {
            Domain::All => None,
            Domain::Values(values) => values.first(),
            Domain::Ranges(ranges) => {
                let lows: Option<Vec<&Literal>> = ranges.iter().map(|r| r.low.literal()).collect();
                lows.and_then(|l| l.into_iter().min())
            }
        }
    }

    /// Values admitted by either domain.
    pub fn union(&self, other: &Domain) -> Domain {
        match (self, other) {
            (Domain::All, _) | (_, Domain::All) => Domain::All,
            (Domain::Values(a), Domain::Values(b)) => {
                Domain::values(a.iter().chain(b.iter()).cloned())
            }
            (a, b) => Domain::Ranges(a.as_ranges().into_iter().chain(b.as_ranges()).collect()),
        }
    }

    fn as_ranges(&self) -> Vec<Range> {
        match self {
            Domain::All => vec![Range {
                low: Bound::Unbounded,
                high: Bound::Unbounded,
            }],
            Domain::Values(values) => values.iter().cloned().map(Range::single).collect(),
            Domain::Ranges(ranges) => ranges.clone(),
        }
    }

    pub fn intersect(&self, other: &Domain) -> Domain {
        match (self, other) {
            (Domain::All, d) | (d, Domain::All) => d.clone(),
            (Domain::Values(a), Domain::Values(b)) => {
                Domain::Values(a.iter().filter(|v| b.contains(v)).cloned().collect())
            }
            (Domain::Values(values), ranges @ Domain::Ranges(_))
            | (ranges @ Domain::Ranges(_), Domain::Values(values)) => Domain::Values(
                values.iter().filter(|v| ranges.includes(v)).cloned().collect(),
            ),
            (Domain::Ranges(a), Domain::Ranges(b)) => Domain::Ranges(
                a.iter()
                    .flat_map(|ra| b.iter().filter_map(move |rb| ra.intersect(rb)))
                    .collect(),
            ),
        }
    }
}

/// One entry of a [`Constraint`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDomain {
    pub column: ColumnHandle,
    pub domain: Domain,
}

/// Column → domain mapping. Entries are kept sorted by column name and never
/// hold [`Domain::All`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraint {
    column_domains: Vec<ColumnDomain>,
}

impl Constraint {
    /// The unconstrained constraint.
    pub fn all() -> Self {
        Self::default()
    }

    /// Build from entries; repeated columns are intersected.
    pub fn from_domains(entries: impl IntoIterator<Item = (ColumnHandle, Domain)>) -> Self {
        entries
            .into_iter()
            .fold(Self::all(), |acc, (column, domain)| {
                let merged = match acc.domain(&column.name) {
                    Some(existing) => existing.intersect(&domain),
                    None => domain,
                };
                acc.with_domain(column, merged)
            })
    }

    pub fn is_all(&self) -> bool {
        self.column_domains.is_empty()
    }

    /// True when some column admits no value at all.
    pub fn is_none(&self) -> bool {
        self.column_domains.iter().any(|cd| cd.domain.is_none())
    }

    pub fn column_domains(&self) -> &[ColumnDomain] {
        &self.column_domains
    }

    pub fn domain(&self, column: &str) -> Option<&Domain> {
        self.column_domains
            .iter()
            .find(|cd| cd.column.name == column)
            .map(|cd| &cd.domain)
    }

    /// Copy with `column`'s domain replaced; `Domain::All` removes the entry.
    pub fn with_domain(&self, column: ColumnHandle, domain: Domain) -> Self {
        let mut column_domains: Vec<ColumnDomain> = self
            .column_domains
            .iter()
            .filter(|cd| cd.column.name != column.name)
            .cloned()
            .collect();
        if !domain.is_all() {
            column_domains.push(ColumnDomain { column, domain });
            column_domains.sort_by(|a, b| a.column.name.cmp(&b.column.name));
        }
        Self { column_domains }
    }

    pub fn intersect(&self, other: &Constraint) -> Self {
        Self::from_domains(
            self.column_domains
                .iter()
                .chain(other.column_domains.iter())
                .map(|cd| (cd.column.clone(), cd.domain.clone())),
        )
    }

    /// Keep only the entries matching `predicate`.
    pub fn filter(&self, predicate: impl Fn(&ColumnDomain) -> bool) -> Self {
        Self {
            column_domains: self
                .column_domains
                .iter()
                .filter(|cd| predicate(cd))
                .cloned()
                .collect(),
        }
    }

    /// Whether `value` is admitted for `column` (unconstrained columns admit everything).
    pub fn allows(&self, column: &str, value: &Literal) -> bool {
        self.domain(column).map_or(true, |d| d.includes(value))
    }
}
