use serde::{Deserialize, Serialize};

/// A value stored in the registry key/value store (C10, §3 `RegistryEntry`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegistryValue {
    Number { value: f64, decimals: u8 },
    Text(String),
}

impl RegistryValue {
    pub fn number(value: f64, decimals: u8) -> Self {
        RegistryValue::Number { value, decimals }
    }

    pub fn text(value: impl Into<String>) -> Self {
        RegistryValue::Text(value.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_and_text_constructors_round_trip_through_json() {
        let n = RegistryValue::number(42.0, 0);
        let json = serde_json::to_value(&n).unwrap();
        let back: RegistryValue = serde_json::from_value(json).unwrap();
        assert_eq!(back, n);

        let s = RegistryValue::text("hello");
        let json = serde_json::to_value(&s).unwrap();
        let back: RegistryValue = serde_json::from_value(json).unwrap();
        assert_eq!(back, s);
    }
}
