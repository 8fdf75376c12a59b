use std::collections::HashMap;

// A single value of a registry entry property.
// The registry schema is not fixed, so every property can hold any of these
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Integer(i64),
    // Only used for values that don't fit in an i64
    Unsigned(u64),
    Float(f64),
    Bool(bool),
    String(String),
    Data(Vec<u8>),
    Array(Vec<RawValue>),
    Record(RawRecord),
}

impl RawValue {
    // Return the value as a signed integer, floating point values are
    // truncated toward zero and unsigned values wrap around like a cast
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            RawValue::Integer(value) => Some(*value),
            RawValue::Unsigned(value) => Some(*value as i64),
            RawValue::Float(value) if value.is_finite() => Some(value.trunc() as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RawValue::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&[u8]> {
        match self {
            RawValue::Data(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&RawRecord> {
        match self {
            RawValue::Record(value) => Some(value),
            _ => None,
        }
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Integer(value)
    }
}

impl From<u64> for RawValue {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(value) => RawValue::Integer(value),
            Err(_) => RawValue::Unsigned(value),
        }
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Float(value)
    }
}

impl From<bool> for RawValue {
    fn from(value: bool) -> Self {
        RawValue::Bool(value)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::String(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::String(value)
    }
}

impl From<Vec<u8>> for RawValue {
    fn from(value: Vec<u8>) -> Self {
        RawValue::Data(value)
    }
}

impl From<RawRecord> for RawValue {
    fn from(value: RawRecord) -> Self {
        RawValue::Record(value)
    }
}

// A registry entry as reported by the OS: an unordered set of
// loosely typed properties.
//
// The typed getters return None both when the key is missing and
// when the stored value has a different type than the requested one
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    properties: HashMap<String, RawValue>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    // Insert a property, replacing any previous value with the same key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<RawValue>) {
        self.properties.insert(key.into(), value.into());
    }

    // Builder style variant of insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&RawValue> {
        self.properties.get(key)
    }

    pub fn get_integer(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(RawValue::as_integer)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(RawValue::as_str)
    }

    pub fn get_data(&self, key: &str) -> Option<&[u8]> {
        self.get(key).and_then(RawValue::as_data)
    }

    pub fn get_record(&self, key: &str) -> Option<&RawRecord> {
        self.get(key).and_then(RawValue::as_record)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrong_type_reads_as_absent() {
        let record = RawRecord::new()
            .with("model", "not bytes")
            .with("vendor-id", vec![0xdeu8, 0x10, 0x00, 0x00])
            .with("VRAM,totalMB", 8192i64);

        assert_eq!(record.get_data("model"), None);
        assert_eq!(record.get_str("vendor-id"), None);
        assert_eq!(record.get_record("VRAM,totalMB"), None);
        assert_eq!(record.get_integer("missing"), None);
        assert_eq!(record.get_integer("VRAM,totalMB"), Some(8192));
    }

    #[test]
    fn numbers_convert_to_integers() {
        assert_eq!(RawValue::Float(42.9).as_integer(), Some(42));
        assert_eq!(RawValue::Float(-3.7).as_integer(), Some(-3));
        assert_eq!(RawValue::Float(f64::NAN).as_integer(), None);
        assert_eq!(RawValue::Unsigned(u64::MAX).as_integer(), Some(-1));
        assert_eq!(RawValue::Bool(true).as_integer(), None);

        assert_eq!(RawValue::from(7u64), RawValue::Integer(7));
        assert_eq!(RawValue::from(u64::MAX), RawValue::Unsigned(u64::MAX));
    }

    #[test]
    fn nested_records_are_reachable() {
        let stats = RawRecord::new().with("vramUsedBytes", 1024i64);
        let record = RawRecord::new().with("PerformanceStatistics", stats.clone());

        assert_eq!(record.get_record("PerformanceStatistics"), Some(&stats));
        assert_eq!(
            record
                .get_record("PerformanceStatistics")
                .and_then(|s| s.get_integer("vramUsedBytes")),
            Some(1024)
        );
    }
}
