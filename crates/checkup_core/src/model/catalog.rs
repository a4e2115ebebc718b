//! Catalog entities: checkup items, check groups and bundled packages.
//!
//! # Responsibility
//! - Define the persisted shape of groups, items and packages (setmeals).
//! - Provide field validation used by repository write paths.
//!
//! # Invariants
//! - The descriptive-field structs carry no identity; identity is added
//!   by the persisted wrappers (`CheckGroup`, `Setmeal`).
//! - Cache encodings serialize these structs directly, so field layout is
//!   an external contract and must stay stable.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Target audience restriction for a group or package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
}

/// Atomic checkup item.
///
/// Items are owned and lifecycle-managed by the record store; this core
/// only reads them through group associations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckItem {
    pub id: i64,
    pub code: Option<String>,
    pub name: String,
    pub price: Option<f64>,
}

/// Descriptive fields of a check group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckGroupFields {
    pub code: Option<String>,
    pub name: String,
    pub help_code: Option<String>,
    pub sex: Option<Sex>,
    pub remark: Option<String>,
    pub attention: Option<String>,
}

/// Persisted check group: store-assigned id plus descriptive fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckGroup {
    pub id: i64,
    #[serde(flatten)]
    pub fields: CheckGroupFields,
}

/// Descriptive fields of a bundled checkup package (setmeal).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetmealFields {
    pub name: String,
    pub code: Option<String>,
    pub help_code: Option<String>,
    pub sex: Option<Sex>,
    pub age: Option<String>,
    pub price: Option<f64>,
    pub remark: Option<String>,
    pub attention: Option<String>,
    /// Image reference shown on the public listing.
    pub img: Option<String>,
}

/// Persisted package: store-assigned id plus descriptive fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setmeal {
    pub id: i64,
    #[serde(flatten)]
    pub fields: SetmealFields,
}

/// One group within an expanded package detail, with its linked items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDetail {
    pub group: CheckGroup,
    pub items: Vec<CheckItem>,
}

/// Fully expanded package graph: package, its groups, their items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetmealDetail {
    pub setmeal: Setmeal,
    pub groups: Vec<GroupDetail>,
}

/// Aggregate report row: booking count per package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetmealBookingCount {
    pub name: String,
    pub bookings: i64,
}

/// Field validation error raised before any SQL mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogValidationError {
    /// Entity name is empty or whitespace-only.
    EmptyName { entity: &'static str },
    /// Price is negative or not a finite number.
    InvalidPrice { entity: &'static str, price: f64 },
}

impl Display for CatalogValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName { entity } => write!(f, "{entity} name must not be empty"),
            Self::InvalidPrice { entity, price } => {
                write!(f, "{entity} price `{price}` must be finite and non-negative")
            }
        }
    }
}

impl Error for CatalogValidationError {}

impl CheckGroupFields {
    /// Validates descriptive fields before persistence.
    pub fn validate(&self) -> Result<(), CatalogValidationError> {
        validate_name("check group", &self.name)
    }
}

impl SetmealFields {
    /// Validates descriptive fields before persistence.
    pub fn validate(&self) -> Result<(), CatalogValidationError> {
        validate_name("setmeal", &self.name)?;
        if let Some(price) = self.price {
            if !price.is_finite() || price < 0.0 {
                return Err(CatalogValidationError::InvalidPrice {
                    entity: "setmeal",
                    price,
                });
            }
        }
        Ok(())
    }
}

fn validate_name(entity: &'static str, name: &str) -> Result<(), CatalogValidationError> {
    if name.trim().is_empty() {
        return Err(CatalogValidationError::EmptyName { entity });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{CatalogValidationError, CheckGroupFields, Setmeal, SetmealFields, Sex};

    fn group_fields(name: &str) -> CheckGroupFields {
        CheckGroupFields {
            code: None,
            name: name.to_string(),
            help_code: None,
            sex: None,
            remark: None,
            attention: None,
        }
    }

    #[test]
    fn group_name_must_not_be_blank() {
        assert!(group_fields("Blood Panel").validate().is_ok());
        assert_eq!(
            group_fields("   ").validate(),
            Err(CatalogValidationError::EmptyName {
                entity: "check group"
            })
        );
    }

    #[test]
    fn setmeal_price_must_be_finite_and_non_negative() {
        let mut fields = SetmealFields {
            name: "Basic".to_string(),
            code: None,
            help_code: None,
            sex: Some(Sex::Female),
            age: None,
            price: Some(199.0),
            remark: None,
            attention: None,
            img: None,
        };
        assert!(fields.validate().is_ok());

        fields.price = Some(-1.0);
        assert!(fields.validate().is_err());

        fields.price = Some(f64::NAN);
        assert!(fields.validate().is_err());
    }

    #[test]
    fn setmeal_json_shape_is_flat() {
        let setmeal = Setmeal {
            id: 7,
            fields: SetmealFields {
                name: "Basic".to_string(),
                code: Some("BSC".to_string()),
                help_code: None,
                sex: Some(Sex::Male),
                age: Some("18-60".to_string()),
                price: Some(299.5),
                remark: None,
                attention: None,
                img: Some("basic.jpg".to_string()),
            },
        };

        let encoded = serde_json::to_string(&setmeal).expect("setmeal should encode");
        let value: serde_json::Value =
            serde_json::from_str(&encoded).expect("encoded setmeal should parse");
        assert_eq!(value["id"], 7);
        assert_eq!(value["name"], "Basic");
        assert_eq!(value["sex"], "male");

        let decoded: Setmeal = serde_json::from_str(&encoded).expect("setmeal should decode");
        assert_eq!(decoded, setmeal);
    }
}
