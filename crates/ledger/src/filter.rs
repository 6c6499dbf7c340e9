//! Textual filter expressions.
//!
//! The grammar is a single comparison, `<field> <op> <value>`, with optional whitespace
//! around the operator. Operators are `>`, `>=`, `<`, `<=`, `==` and `!=`, matched
//! longest-first. Several expressions given to a manager are joined with AND.
use std::{fmt, str::FromStr};

use sea_orm::{ColumnTrait, Condition, Value, sea_query::SimpleExpr};

use crate::{LedgerError, Record, ResultLedger, fields::catalog};

const OPERATOR_SYMBOLS: [char; 4] = ['<', '>', '=', '!'];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl Operator {
    /// Longest symbols first, so `>=` is never read as `>`.
    const BY_LENGTH: [Operator; 6] = [
        Operator::Ge,
        Operator::Le,
        Operator::Eq,
        Operator::Ne,
        Operator::Gt,
        Operator::Lt,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "==",
            Self::Ne => "!=",
        }
    }

    fn split_prefix(input: &str) -> Option<(Self, &str)> {
        Self::BY_LENGTH.iter().find_map(|operator| {
            input
                .strip_prefix(operator.symbol())
                .map(|rest| (*operator, rest))
        })
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A parsed, not yet validated, comparison.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterExpression {
    field: String,
    operator: Operator,
    value: String,
}

impl FilterExpression {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    pub fn parse(expr: &str) -> ResultLedger<Self> {
        let invalid = |reason: &str| LedgerError::InvalidFilter(format!("{reason} in `{expr}`"));

        let input = expr.trim();
        let split = input
            .find(|c: char| c.is_whitespace() || OPERATOR_SYMBOLS.contains(&c))
            .unwrap_or(input.len());
        let (field, rest) = input.split_at(split);
        if field.is_empty() || !field.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(invalid("missing field name"));
        }

        let (operator, rest) =
            Operator::split_prefix(rest.trim_start()).ok_or_else(|| invalid("unknown operator"))?;
        let value = rest.trim();
        if value.starts_with(OPERATOR_SYMBOLS) {
            return Err(invalid("unexpected operator symbol"));
        }

        Ok(Self::new(field, operator, value))
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Resolves the expression against the catalog of `E`: the field must exist, the value
    /// must be non-empty and a valid literal of the field's type.
    pub fn validate<E: Record>(&self) -> ResultLedger<Filter<E>> {
        let field = catalog::<E>().get(&self.field).ok_or_else(|| {
            LedgerError::InvalidFilter(format!("unknown field `{}` in `{self}`", self.field))
        })?;
        if self.value.is_empty() {
            return Err(LedgerError::InvalidFilter(format!("empty value in `{self}`")));
        }
        let value = field.parse_literal(&self.value).ok_or_else(|| {
            LedgerError::InvalidFilter(format!(
                "`{}` is not a valid {} in `{self}`",
                self.value,
                field.kind()
            ))
        })?;
        Ok(Filter {
            expression: self.clone(),
            column: field.column(),
            value,
        })
    }
}

impl FromStr for FilterExpression {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.field, self.operator, self.value)
    }
}

/// A filter validated against the catalog of `E`, ready to be compiled.
#[derive(Clone, Debug)]
pub struct Filter<E: Record> {
    expression: FilterExpression,
    column: E::Column,
    value: Value,
}

impl<E: Record> Filter<E> {
    pub fn parse(expr: &str) -> ResultLedger<Self> {
        FilterExpression::parse(expr)?.validate()
    }

    /// Parses and validates every expression, failing on the first invalid one.
    pub fn parse_all<I, S>(exprs: I) -> ResultLedger<Vec<Self>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        exprs
            .into_iter()
            .map(|expr| Self::parse(expr.as_ref()))
            .collect()
    }

    pub fn expression(&self) -> &FilterExpression {
        &self.expression
    }

    /// Compiles the filter into a predicate on its column.
    pub fn build(&self) -> SimpleExpr {
        let value = self.value.clone();
        match self.expression.operator {
            Operator::Gt => self.column.gt(value),
            Operator::Ge => self.column.gte(value),
            Operator::Lt => self.column.lt(value),
            Operator::Le => self.column.lte(value),
            Operator::Eq => ColumnTrait::eq(&self.column, value),
            Operator::Ne => ColumnTrait::ne(&self.column, value),
        }
    }
}

/// Joins filters with AND.
pub(crate) fn condition<E: Record>(filters: &[Filter<E>]) -> Condition {
    filters
        .iter()
        .fold(Condition::all(), |condition, filter| condition.add(filter.build()))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::entries;

    #[test]
    fn parse_picks_longest_operator() {
        let expr = FilterExpression::parse("sum >= 100").unwrap();
        assert_eq!(expr, FilterExpression::new("sum", Operator::Ge, "100"));

        let expr = FilterExpression::parse("sum<-5").unwrap();
        assert_eq!(expr, FilterExpression::new("sum", Operator::Lt, "-5"));

        let expr = FilterExpression::parse("description != 'tea'").unwrap();
        assert_eq!(expr.operator(), Operator::Ne);
        assert_eq!(expr.value(), "'tea'");
    }

    #[test]
    fn parse_rejects_malformed_expressions() {
        for expr in ["invalid_expression", "id=1", "id===1", "==1", "id => 1", ""] {
            assert!(
                matches!(
                    FilterExpression::parse(expr),
                    Err(LedgerError::InvalidFilter(_))
                ),
                "{expr} should not parse"
            );
        }
    }

    #[test]
    fn validate_rejects_unknown_fields_and_empty_values() {
        for expr in ["absent_field=1", "absent_field==1", "id==", "sum>abc"] {
            assert!(
                matches!(
                    Filter::<entries::Entity>::parse(expr),
                    Err(LedgerError::InvalidFilter(_))
                ),
                "{expr} should not validate"
            );
        }
    }

    #[test]
    fn validated_filter_builds() {
        let filter = Filter::<entries::Entity>::parse("sum>100").unwrap();
        assert_eq!(filter.expression().field(), "sum");
        let _predicate = filter.build();
    }

    #[test]
    fn display_is_compact() {
        let expr = FilterExpression::parse("sum  <=  3").unwrap();
        assert_eq!(expr.to_string(), "sum<=3");
    }

    fn operators() -> impl Strategy<Value = Operator> {
        prop_oneof![
            Just(Operator::Gt),
            Just(Operator::Ge),
            Just(Operator::Lt),
            Just(Operator::Le),
            Just(Operator::Eq),
            Just(Operator::Ne),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn unknown_fields_never_validate(
            field in "zz_[a-z]{1,8}",
            operator in operators(),
            value in 0_i64..10_000,
        ) {
            let expr = format!("{field}{operator}{value}");
            let result = Filter::<entries::Entity>::parse(&expr);
            prop_assert!(matches!(result, Err(LedgerError::InvalidFilter(_))));
        }

        #[test]
        fn known_integer_fields_validate(
            field in prop_oneof![Just("id"), Just("sum"), Just("user_id"), Just("category_id")],
            operator in operators(),
            value in -10_000_i64..10_000,
            spaced in any::<bool>(),
        ) {
            let gap = if spaced { " " } else { "" };
            let expr = format!("{field}{gap}{operator}{gap}{value}");
            let filter = Filter::<entries::Entity>::parse(&expr).unwrap();
            prop_assert_eq!(filter.expression().operator(), operator);
            prop_assert_eq!(filter.expression().value(), value.to_string());
        }
    }
}
