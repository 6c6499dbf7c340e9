//! Ordering directives.
//!
//! A directive is a field name, optionally prefixed or suffixed with `-` for descending
//! order: `"created_at"`, `"-created_at"` and `"created_at-"`. Directive order is tie-break
//! order.
use sea_orm::{Order, QueryOrder, Select};

use crate::{LedgerError, Record, ResultLedger, fields::catalog};

/// Order used when a manager is built without one: insertion order.
pub const DEFAULT_ORDER_BY: [&str; 2] = ["created_at", "id"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn inverted(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

impl From<Direction> for Order {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Asc => Order::Asc,
            Direction::Desc => Order::Desc,
        }
    }
}

/// Ordered mapping from field name to direction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrderSpec {
    keys: Vec<(String, Direction)>,
}

impl OrderSpec {
    /// Parses a list of directives. A field given twice keeps its first position and takes
    /// the last direction.
    pub fn parse<I, S>(directives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut spec = Self::default();
        for directive in directives {
            let (name, direction) = parse_directive(directive.as_ref());
            spec.push(name, direction);
        }
        spec
    }

    fn push(&mut self, name: &str, direction: Direction) {
        match self.keys.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = direction,
            None => self.keys.push((name.to_string(), direction)),
        }
    }

    /// Flips every direction, keeping the field order.
    pub fn invert(&self) -> Self {
        Self {
            keys: self
                .keys
                .iter()
                .map(|(name, direction)| (name.clone(), direction.inverted()))
                .collect(),
        }
    }

    pub fn direction(&self, field: &str) -> Option<Direction> {
        self.keys
            .iter()
            .find_map(|(name, direction)| (name == field).then_some(*direction))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Direction)> {
        self.keys
            .iter()
            .map(|(name, direction)| (name.as_str(), *direction))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Checks every field against the catalog of `E`.
    pub fn validate<E: Record>(&self) -> ResultLedger<()> {
        let catalog = catalog::<E>();
        let unknown: Vec<String> = self
            .keys
            .iter()
            .filter(|(name, _)| !catalog.contains(name))
            .map(|(name, _)| name.clone())
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(LedgerError::InvalidOrderField(unknown))
        }
    }
}

fn parse_directive(directive: &str) -> (&str, Direction) {
    let directive = directive.trim();
    if let Some(name) = directive.strip_prefix('-') {
        (name.trim(), Direction::Desc)
    } else if let Some(name) = directive.strip_suffix('-') {
        (name.trim(), Direction::Desc)
    } else {
        (directive, Direction::Asc)
    }
}

/// An [`OrderSpec`] resolved to the columns of `E`.
#[derive(Clone, Debug)]
pub struct OrderBy<E: Record> {
    spec: OrderSpec,
    columns: Vec<E::Column>,
}

impl<E: Record> OrderBy<E> {
    pub fn new(spec: OrderSpec) -> ResultLedger<Self> {
        spec.validate::<E>()?;
        let catalog = catalog::<E>();
        let columns = spec
            .iter()
            .map(|(name, _)| catalog.resolve(name).map(|field| field.column()))
            .collect::<ResultLedger<Vec<_>>>()?;
        Ok(Self { spec, columns })
    }

    pub fn parse<I, S>(directives: I) -> ResultLedger<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(OrderSpec::parse(directives))
    }

    pub fn spec(&self) -> &OrderSpec {
        &self.spec
    }

    /// Appends the ORDER BY clause to `select`. `reverse` inverts the spec, so reading the
    /// first rows in reverse mirrors reading the last rows.
    pub fn apply(&self, select: Select<E>, reverse: bool) -> Select<E> {
        let spec = if reverse {
            self.spec.invert()
        } else {
            self.spec.clone()
        };
        spec.iter()
            .zip(self.columns.iter())
            .fold(select, |select, ((_, direction), column)| {
                select.order_by(*column, direction.into())
            })
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::entries;

    #[test]
    fn parse_prefix_and_suffix() {
        let spec = OrderSpec::parse(["-created_at", "id", "sum-"]);
        let keys: Vec<_> = spec.iter().collect();
        assert_eq!(
            keys,
            vec![
                ("created_at", Direction::Desc),
                ("id", Direction::Asc),
                ("sum", Direction::Desc),
            ]
        );
    }

    #[test]
    fn invert_flips_directions_in_place() {
        let spec = OrderSpec::parse(["-created_at", "id"]).invert();
        assert_eq!(spec.direction("created_at"), Some(Direction::Asc));
        assert_eq!(spec.direction("id"), Some(Direction::Desc));
        assert_eq!(
            spec.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            vec!["created_at", "id"]
        );
    }

    #[test]
    fn repeated_field_keeps_first_position() {
        let spec = OrderSpec::parse(["id", "sum", "-id"]);
        let keys: Vec<_> = spec.iter().collect();
        assert_eq!(keys, vec![("id", Direction::Desc), ("sum", Direction::Asc)]);
    }

    #[test]
    fn validate_names_every_unknown_field() {
        let err = OrderSpec::parse(["-foo", "id", "bar-"])
            .validate::<entries::Entity>()
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::InvalidOrderField(vec!["foo".to_string(), "bar".to_string()])
        );
    }

    #[test]
    fn default_order_is_valid_for_entries() {
        assert!(OrderBy::<entries::Entity>::parse(DEFAULT_ORDER_BY).is_ok());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn invert_is_an_involution(
            directives in prop::collection::vec("-?[a-z_]{1,12}-?", 0..8)
        ) {
            let spec = OrderSpec::parse(&directives);
            prop_assert_eq!(spec.invert().invert(), spec);
        }
    }
}
