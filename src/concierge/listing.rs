use serde::{Deserialize, Serialize};

use crate::concierge::history::PriceHistory;

pub type PropertyId = u32;

/// Fallback home price used when a listing has no parseable price.
pub const DEFAULT_HOME_PRICE: f64 = 985_000.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    pub address: String,
    pub city: String,
    /// Currency-formatted, e.g. `$985,000`. Parsed on demand.
    pub price: String,
    pub beds: u8,
    pub baths: f32,
    pub sqft: u32,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub nearby_amenities: Vec<Amenity>,
    #[serde(default)]
    pub pros: Vec<String>,
    #[serde(default)]
    pub cons: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub match_reason: String,
    pub ai_score: u8,
    pub investment_rating: String,
    #[serde(default)]
    pub financials: Option<Financials>,
    #[serde(default)]
    pub investment: Option<InvestmentProjection>,
    #[serde(default)]
    pub qa: Vec<QaEntry>,
    #[serde(default)]
    pub virtual_tour: Vec<TourRoom>,
    #[serde(default)]
    pub schools: Vec<School>,
    #[serde(default)]
    pub history: Option<PriceHistory>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Financials {
    #[serde(default)]
    pub monthly_payment: Option<String>,
    #[serde(default)]
    pub down_payment: Option<String>,
    #[serde(default)]
    pub property_tax: Option<String>,
    #[serde(default)]
    pub home_insurance: Option<String>,
    #[serde(default)]
    pub hoa: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvestmentProjection {
    #[serde(default)]
    pub rating: Option<String>,
    #[serde(default)]
    pub growth_rate: Option<String>,
    #[serde(default)]
    pub projected_value: Option<String>,
    #[serde(default)]
    pub appreciation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaEntry {
    pub keywords: Vec<String>,
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TourRoom {
    pub room: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct School {
    pub name: String,
    pub rating: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Amenity {
    #[serde(rename = "type")]
    pub kind: AmenityKind,
    pub name: String,
    pub distance: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AmenityKind {
    School,
    Park,
    Shopping,
    Gym,
    Cafe,
    Transit,
    Entertainment,
    #[serde(other)]
    Other,
}

impl AmenityKind {
    /// Icon the renderer should draw for this kind of amenity.
    pub fn icon(self) -> &'static str {
        match self {
            AmenityKind::School => "graduation-cap",
            AmenityKind::Shopping => "shopping-bag",
            AmenityKind::Gym => "dumbbell",
            AmenityKind::Cafe => "coffee",
            AmenityKind::Transit => "train",
            AmenityKind::Entertainment => "music",
            AmenityKind::Park | AmenityKind::Other => "map-pin",
        }
    }
}

impl Property {
    /// Listing price as a number, `None` when the fixture string does not
    /// parse or is not a positive amount.
    pub fn price_value(&self) -> Option<f64> {
        parse_currency(&self.price).filter(|price| *price > 0.0)
    }

    /// Monthly HOA fee from the financials block, 0 when absent or malformed.
    pub fn hoa_monthly(&self) -> f64 {
        self.financials
            .as_ref()
            .and_then(|f| f.hoa.as_deref())
            .and_then(parse_currency)
            .unwrap_or(0.0)
    }

    /// Address up to the first comma.
    pub fn headline(&self) -> &str {
        self.address.split(',').next().unwrap_or(&self.address).trim()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Parses `$1,250,000` or `$350/mo` style strings.
pub fn parse_currency(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix("/mo").unwrap_or(trimmed);
    let cleaned: String = trimmed
        .chars()
        .filter(|c| *c != '$' && *c != ',' && !c.is_whitespace())
        .collect();

    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Some(value),
        _ => None,
    }
}

/// Whole-dollar US currency, e.g. `$4,981`.
pub fn format_currency(amount: f64) -> String {
    let rounded = amount.round();
    let sign = if rounded < 0.0 { "-" } else { "" };
    format!("{}${}", sign, group_thousands(rounded.abs() as u64))
}

pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_currency_strings() {
        assert_eq!(parse_currency("$985,000"), Some(985_000.0));
        assert_eq!(parse_currency("$1,250,000"), Some(1_250_000.0));
        assert_eq!(parse_currency("$350/mo"), Some(350.0));
        assert_eq!(parse_currency(" $1,200.50 "), Some(1_200.5));
    }

    #[test]
    fn malformed_currency_is_none() {
        assert_eq!(parse_currency("$1.2M"), None);
        assert_eq!(parse_currency("call for price"), None);
        assert_eq!(parse_currency(""), None);
        assert_eq!(parse_currency("-$5"), None);
    }

    #[test]
    fn formats_whole_dollars() {
        assert_eq!(format_currency(4980.6), "$4,981");
        assert_eq!(format_currency(100.0), "$100");
        assert_eq!(format_currency(1_250_000.0), "$1,250,000");
        assert_eq!(format_currency(0.0), "$0");
    }

    #[test]
    fn amenity_icons_default_to_map_pin() {
        let kind: AmenityKind = serde_json::from_str("\"Museum\"").unwrap();
        assert_eq!(kind, AmenityKind::Other);
        assert_eq!(kind.icon(), "map-pin");
        assert_eq!(AmenityKind::School.icon(), "graduation-cap");
        assert_eq!(AmenityKind::Transit.icon(), "train");
    }

    #[test]
    fn optional_sections_default_to_absent() {
        let json = r#"{
            "id": 7, "address": "1 Test Way, Springfield", "city": "Springfield",
            "price": "$500,000", "beds": 2, "baths": 1.5, "sqft": 900,
            "match_reason": "Fits", "ai_score": 70, "investment_rating": "B"
        }"#;
        let property: Property = serde_json::from_str(json).unwrap();
        assert!(property.financials.is_none());
        assert!(property.investment.is_none());
        assert!(property.qa.is_empty());
        assert!(property.virtual_tour.is_empty());
        assert_eq!(property.hoa_monthly(), 0.0);
        assert_eq!(property.headline(), "1 Test Way");
    }
}
