//! Converter registry: cell text <-> typed member values.
//!
//! Every member bound to a CSV column goes through [`BlueprintValue`].
//! Scalars parse an empty cell as their default value; `Option<T>` maps
//! the empty cell to `None` so "absent" and "zero" stay distinguishable.

use chrono::NaiveDate;

use crate::error::{ConvertError, ConvertResult};

/// Separator between items of a list cell (`Vec<T>` members).
pub const LIST_SEPARATOR: char = '|';

/// Date format used for `NaiveDate` cells.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A type that can be read from and written to a single CSV cell.
///
/// Implementations must round-trip: `parse_cell(&x.to_cell()) == Ok(x)`.
pub trait BlueprintValue: Sized {
    /// Parse a raw cell.
    fn parse_cell(raw: &str) -> ConvertResult<Self>;

    /// Render the value as a cell.
    fn to_cell(&self) -> String;
}

macro_rules! impl_numeric {
    ($($ty:ty),* $(,)?) => {$(
        impl BlueprintValue for $ty {
            fn parse_cell(raw: &str) -> ConvertResult<Self> {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return Ok(<$ty>::default());
                }
                trimmed
                    .parse::<$ty>()
                    .map_err(|e| ConvertError::new(raw, stringify!($ty), e.to_string()))
            }

            fn to_cell(&self) -> String {
                self.to_string()
            }
        }
    )*};
}

impl_numeric!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

impl BlueprintValue for String {
    fn parse_cell(raw: &str) -> ConvertResult<Self> {
        Ok(raw.to_string())
    }

    fn to_cell(&self) -> String {
        self.clone()
    }
}

impl BlueprintValue for bool {
    fn parse_cell(raw: &str) -> ConvertResult<Self> {
        match raw.trim().to_lowercase().as_str() {
            "" | "false" | "0" | "no" => Ok(false),
            "true" | "1" | "yes" => Ok(true),
            _ => Err(ConvertError::new(raw, "bool", "expected true/false, 1/0 or yes/no")),
        }
    }

    fn to_cell(&self) -> String {
        self.to_string()
    }
}

impl BlueprintValue for char {
    fn parse_cell(raw: &str) -> ConvertResult<Self> {
        let mut chars = raw.chars();
        match (chars.next(), chars.next()) {
            (None, _) => Ok(char::default()),
            (Some(c), None) => Ok(c),
            _ => Err(ConvertError::new(raw, "char", "expected a single character")),
        }
    }

    fn to_cell(&self) -> String {
        self.to_string()
    }
}

impl BlueprintValue for NaiveDate {
    fn parse_cell(raw: &str) -> ConvertResult<Self> {
        NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
            .map_err(|e| ConvertError::new(raw, "NaiveDate", e.to_string()))
    }

    fn to_cell(&self) -> String {
        self.format(DATE_FORMAT).to_string()
    }
}

impl<T: BlueprintValue> BlueprintValue for Option<T> {
    fn parse_cell(raw: &str) -> ConvertResult<Self> {
        if raw.trim().is_empty() {
            Ok(None)
        } else {
            T::parse_cell(raw).map(Some)
        }
    }

    fn to_cell(&self) -> String {
        self.as_ref().map(T::to_cell).unwrap_or_default()
    }
}

impl<T: BlueprintValue> BlueprintValue for Vec<T> {
    fn parse_cell(raw: &str) -> ConvertResult<Self> {
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        raw.split(LIST_SEPARATOR).map(|item| T::parse_cell(item.trim())).collect()
    }

    fn to_cell(&self) -> String {
        self.iter()
            .map(T::to_cell)
            .collect::<Vec<_>>()
            .join(&LIST_SEPARATOR.to_string())
    }
}

/// Register `FromStr + Display` types (typically game enums) as blueprint values.
///
/// ```rust,ignore
/// #[derive(Debug, Clone, Copy, PartialEq, Default)]
/// enum Rarity { #[default] Common, Rare }
/// // impl FromStr and Display for Rarity ...
/// blueprints::blueprint_value_from_str!(Rarity);
/// ```
#[macro_export]
macro_rules! blueprint_value_from_str {
    ($($ty:ty),+ $(,)?) => {$(
        impl $crate::record::BlueprintValue for $ty {
            fn parse_cell(raw: &str) -> ::std::result::Result<Self, $crate::error::ConvertError> {
                raw.trim().parse::<$ty>().map_err(|e| {
                    $crate::error::ConvertError::new(raw, ::std::any::type_name::<$ty>(), e.to_string())
                })
            }

            fn to_cell(&self) -> ::std::string::String {
                self.to_string()
            }
        }
    )+};
}
