use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::product::ProductId;
use crate::domain::week::parse_day;

/// A quantity as handed over by the record store: usually a number, sometimes text.
/// Anything else (null, booleans, objects) is kept as `Other` and never parses.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawQuantity {
    Number(f64),
    Text(String),
    Other(Value),
}

impl Default for RawQuantity {
    fn default() -> Self {
        Self::Other(Value::Null)
    }
}

impl RawQuantity {
    /// Finite, non-negative value or `None`. Accepts a decimal comma in text form.
    pub fn value(&self) -> Option<f64> {
        let value = match self {
            Self::Number(value) => *value,
            Self::Text(text) => text.trim().replace(',', ".").parse::<f64>().ok()?,
            Self::Other(_) => return None,
        };
        (value.is_finite() && value >= 0.0).then_some(value)
    }
}

impl From<f64> for RawQuantity {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// One day of sales or losses for a product, exactly as stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MovementRecord {
    pub product_id: ProductId,
    #[serde(default, deserialize_with = "lenient_text")]
    pub date: String,
    #[serde(default)]
    pub quantity: RawQuantity,
}

pub type SalesRecord = MovementRecord;
pub type LossRecord = MovementRecord;

impl MovementRecord {
    pub fn new(product_id: impl Into<String>, date: impl Into<String>, quantity: f64) -> Self {
        Self {
            product_id: ProductId(product_id.into()),
            date: date.into(),
            quantity: RawQuantity::Number(quantity),
        }
    }

    pub fn parse(&self) -> Option<DatedQuantity> {
        let date = parse_day(&self.date)?;
        let quantity = self.quantity.value()?;
        Some(DatedQuantity { date, quantity })
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DatedQuantity {
    pub date: NaiveDate,
    pub quantity: f64,
}

/// Reads any JSON scalar as text. `null` becomes empty, so the row fails to parse later
/// instead of failing the whole document.
pub(crate) fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(text) => text,
        other => other.to_string(),
    })
}
