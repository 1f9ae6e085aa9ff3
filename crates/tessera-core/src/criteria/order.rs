//! Sort order of a query.

use std::str::FromStr;

use crate::error::DomainError;

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum OrderType {
    /// Ascending; nulls first.
    Asc,
    /// Descending; nulls last.
    Desc,
    /// No ordering.
    #[default]
    None,
}

impl OrderType {
    /// Returns `true` for `Desc`.
    #[must_use]
    pub fn is_desc(self) -> bool {
        matches!(self, Self::Desc)
    }
}

impl FromStr for OrderType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            "none" | "" => Ok(Self::None),
            other => Err(DomainError::invalid(format!("unknown order type: {other}"))),
        }
    }
}

/// Field and direction to sort by. The field may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Order {
    /// Field path; may be empty.
    pub order_by: String,
    /// Direction.
    pub order_type: OrderType,
}

impl Order {
    /// No ordering.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Ascending order on `field`.
    #[must_use]
    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, OrderType::Asc)
    }

    /// Descending order on `field`.
    #[must_use]
    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, OrderType::Desc)
    }

    /// Order on `field` in the given direction.
    #[must_use]
    pub fn new(field: impl Into<String>, order_type: OrderType) -> Self {
        Self {
            order_by: field.into().trim().to_owned(),
            order_type,
        }
    }

    /// Parses an order from an optional field and a direction token.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` on an unknown direction.
    pub fn from_values(field: Option<&str>, order_type: Option<&str>) -> Result<Self, DomainError> {
        let order_type = order_type.map_or(Ok(OrderType::None), str::parse)?;
        Ok(Self::new(field.unwrap_or_default(), order_type))
    }

    /// Returns `true` when the order names a field and a direction.
    #[must_use]
    pub fn has_order(&self) -> bool {
        !self.order_by.is_empty() && self.order_type != OrderType::None
    }
}
