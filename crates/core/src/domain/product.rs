use chrono::Weekday;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub String);

impl ProductId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProductId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub sector: String,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default = "default_active")]
    pub active: bool,
    /// Weekdays on which the product is baked, in any order.
    #[serde(default)]
    pub production_days: Vec<Weekday>,
}

impl Product {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        sector: impl Into<String>,
    ) -> Self {
        Self {
            id: ProductId(id.into()),
            name: name.into(),
            sector: sector.into(),
            unit: default_unit(),
            active: true,
            production_days: Vec::new(),
        }
    }
}

fn default_unit() -> String {
    "un".to_string()
}

fn default_active() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use chrono::Weekday;

    use super::Product;

    #[test]
    fn catalog_entries_fill_defaults() {
        let raw = r#"{"id": "sonho", "name": "Sonho", "sector": "Confeitaria",
                      "production_days": ["Tue", "Friday"]}"#;
        let product: Product = serde_json::from_str(raw).expect("product parses");

        assert_eq!(product.unit, "un");
        assert!(product.active);
        assert_eq!(product.production_days, vec![Weekday::Tue, Weekday::Fri]);
    }
}
