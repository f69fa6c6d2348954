use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// A batch quantity with its unit, stored and displayed as "80 kg".
///
/// Kilograms are the only unit the supply chain uses today; the unit is kept
/// explicit so documents stay self-describing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weight {
    pub value: f64,
    pub unit: WeightUnit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightUnit {
    Kilograms,
}

#[derive(Debug, Error)]
#[error("invalid weight: {0:?}")]
pub struct ParseWeightError(String);

impl Weight {
    pub fn kilograms(value: f64) -> Self {
        Self {
            value,
            unit: WeightUnit::Kilograms,
        }
    }

    pub fn value_kg(&self) -> f64 {
        self.value
    }
}

impl std::fmt::Display for Weight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.value.fract() == 0.0 {
            write!(f, "{} kg", self.value as i64)
        } else {
            write!(f, "{} kg", self.value)
        }
    }
}

impl std::str::FromStr for Weight {
    type Err = ParseWeightError;

    /// Accepts the document forms "80 kg", "150kg", and a bare number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let numeric = trimmed
            .strip_suffix("kg")
            .or_else(|| trimmed.strip_suffix("Kg"))
            .or_else(|| trimmed.strip_suffix("KG"))
            .unwrap_or(trimmed)
            .trim();
        let value: f64 = numeric
            .parse()
            .map_err(|_| ParseWeightError(s.to_string()))?;
        if !value.is_finite() {
            return Err(ParseWeightError(s.to_string()));
        }
        Ok(Weight::kilograms(value))
    }
}

impl Serialize for Weight {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Weight {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_whole_values_without_fraction() {
        assert_eq!(Weight::kilograms(80.0).to_string(), "80 kg");
        assert_eq!(Weight::kilograms(12.5).to_string(), "12.5 kg");
    }

    #[test]
    fn parses_document_forms() {
        let spaced: Weight = "100 kg".parse().unwrap();
        assert_eq!(spaced.value_kg(), 100.0);
        let compact: Weight = "150kg".parse().unwrap();
        assert_eq!(compact.value_kg(), 150.0);
        let bare: Weight = "42".parse().unwrap();
        assert_eq!(bare.value_kg(), 42.0);
    }

    #[test]
    fn rejects_garbage() {
        assert!("heavy".parse::<Weight>().is_err());
        assert!("NaN kg".parse::<Weight>().is_err());
    }

    #[test]
    fn serde_round_trips_as_string() {
        let weight = Weight::kilograms(80.0);
        let json = serde_json::to_string(&weight).unwrap();
        assert_eq!(json, "\"80 kg\"");
        let back: Weight = serde_json::from_str(&json).unwrap();
        assert_eq!(back, weight);
    }
}
