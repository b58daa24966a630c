//! Property deserialization helpers.
//!
//! Provides the `FromTiledProperty` trait for reading typed values out of
//! `tiled::Properties` bags.

use tiled::{Properties, PropertyValue};

/// Trait for types that can be read from a Tiled property value.
///
/// # Example
///
/// ```
/// use tiled::PropertyValue;
/// use bevy_mapstream_core::properties::FromTiledProperty;
///
/// let prop = PropertyValue::IntValue(7);
/// assert_eq!(i64::from_property(&prop), Some(7));
/// ```
pub trait FromTiledProperty: Sized {
    /// Returns `Some(value)` if conversion succeeds, `None` otherwise.
    fn from_property(value: &PropertyValue) -> Option<Self>;
}

impl FromTiledProperty for bool {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::BoolValue(b) => Some(*b),
            // Converted maps sometimes store flags as strings
            PropertyValue::StringValue(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Some(true),
                "false" | "0" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

impl FromTiledProperty for i32 {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::IntValue(i) => Some(*i),
            PropertyValue::FloatValue(f) => Some(*f as i32),
            PropertyValue::StringValue(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl FromTiledProperty for i64 {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        i32::from_property(value).map(i64::from)
    }
}

impl FromTiledProperty for u32 {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        match i32::from_property(value) {
            Some(i) if i >= 0 => Some(i as u32),
            _ => None,
        }
    }
}

impl FromTiledProperty for String {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::StringValue(s) | PropertyValue::FileValue(s) => Some(s.clone()),
            _ => None,
        }
    }
}

/// Read a typed property, `None` when missing or of the wrong type.
pub fn property<T: FromTiledProperty>(properties: &Properties, name: &str) -> Option<T> {
    properties.get(name).and_then(T::from_property)
}

/// Read a non-empty string property.
pub fn non_empty_string(properties: &Properties, name: &str) -> Option<String> {
    property::<String>(properties, name).filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_conversions() {
        let mut properties = Properties::new();
        properties.insert("flag".into(), PropertyValue::StringValue("True".into()));
        properties.insert("count".into(), PropertyValue::StringValue(" 12 ".into()));
        properties.insert("negative".into(), PropertyValue::IntValue(-3));
        properties.insert("blank".into(), PropertyValue::StringValue("  ".into()));
        properties.insert("music".into(), PropertyValue::FileValue("town.ogg".into()));

        assert_eq!(property::<bool>(&properties, "flag"), Some(true));
        assert_eq!(property::<i32>(&properties, "count"), Some(12));
        assert_eq!(property::<u32>(&properties, "negative"), None);
        assert_eq!(property::<i64>(&properties, "negative"), Some(-3));
        assert_eq!(non_empty_string(&properties, "blank"), None);
        assert_eq!(
            non_empty_string(&properties, "music").as_deref(),
            Some("town.ogg")
        );
        assert_eq!(property::<String>(&properties, "missing"), None);
    }
}
