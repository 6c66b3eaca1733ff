//! Side-by-side comparison of up to three listings.

use rand::Rng;
use serde::Serialize;

use crate::concierge::listing::{group_thousands, Property, PropertyId};

pub const MAX_COMPARE: usize = 3;
pub const MIN_COMPARE: usize = 2;

const DEFAULT_RATING: &str = "B+";
const DEFAULT_APPRECIATION: &str = "+12% (5yr)";
const DEFAULT_SCHOOL_RATING: &str = "8/10";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Grade {
    Green,
    Blue,
    Orange,
}

impl Grade {
    /// Colour band from the leading letter of a rating such as `A+`.
    pub fn for_rating(rating: &str) -> Self {
        if rating.starts_with('A') {
            Grade::Green
        } else if rating.starts_with('B') {
            Grade::Blue
        } else {
            Grade::Orange
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompareCell {
    pub content: String,
    pub highlight: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<Grade>,
}

impl CompareCell {
    fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            highlight: false,
            grade: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompareRow {
    pub label: &'static str,
    pub cells: Vec<CompareCell>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompareColumn {
    pub id: PropertyId,
    pub headline: String,
    pub price: String,
    pub image: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonTable {
    pub columns: Vec<CompareColumn>,
    pub rows: Vec<CompareRow>,
    pub verdicts: Vec<String>,
}

/// Builds the comparison grid. Projected appreciation and noise level are
/// drawn from `rng`.
pub fn build_table<R: Rng + ?Sized>(properties: &[&Property], rng: &mut R) -> ComparisonTable {
    let best_score = properties.iter().map(|p| p.ai_score).max().unwrap_or(0);

    let columns = properties
        .iter()
        .map(|p| CompareColumn {
            id: p.id,
            headline: p.headline().to_string(),
            price: p.price.clone(),
            image: p.image.clone(),
        })
        .collect();

    let row = |label: &'static str, cells: Vec<CompareCell>| CompareRow { label, cells };

    let rows = vec![
        row(
            "AI Match Score",
            properties
                .iter()
                .map(|p| CompareCell {
                    highlight: p.ai_score >= best_score,
                    ..CompareCell::text(format!("{}%", p.ai_score))
                })
                .collect(),
        ),
        row(
            "Beds / Baths",
            properties
                .iter()
                .map(|p| CompareCell::text(format!("{}bd / {}ba", p.beds, p.baths)))
                .collect(),
        ),
        row(
            "SqFt",
            properties
                .iter()
                .map(|p| CompareCell::text(format!("{} sqft", group_thousands(u64::from(p.sqft)))))
                .collect(),
        ),
        row(
            "Investment Rating",
            properties
                .iter()
                .map(|p| {
                    let rating = investment_rating(p);
                    CompareCell {
                        grade: Some(Grade::for_rating(rating)),
                        ..CompareCell::text(rating)
                    }
                })
                .collect(),
        ),
        row(
            "Projected Appr.",
            properties
                .iter()
                .map(|p| {
                    let projected = p.investment.as_ref().and_then(|i| i.projected_value.as_ref());
                    match projected {
                        Some(_) => CompareCell::text(format!("+{}% (5yr)", rng.gen_range(10..25))),
                        None => CompareCell::text(DEFAULT_APPRECIATION),
                    }
                })
                .collect(),
        ),
        row(
            "School Rating",
            properties
                .iter()
                .map(|p| match p.schools.first() {
                    Some(school) => CompareCell::text(format!("{}/10", school.rating)),
                    None => CompareCell::text(DEFAULT_SCHOOL_RATING),
                })
                .collect(),
        ),
        row(
            "Noise Level",
            properties
                .iter()
                .map(|_| {
                    CompareCell::text(if rng.gen_bool(0.5) {
                        "Low (Quiet St)"
                    } else {
                        "Medium"
                    })
                })
                .collect(),
        ),
    ];

    let verdicts = properties.iter().map(|p| verdict(p)).collect();

    ComparisonTable {
        columns,
        rows,
        verdicts,
    }
}

fn investment_rating(property: &Property) -> &str {
    property
        .investment
        .as_ref()
        .and_then(|i| i.rating.as_deref())
        .or(Some(property.investment_rating.as_str()).filter(|r| !r.is_empty()))
        .unwrap_or(DEFAULT_RATING)
}

fn verdict(property: &Property) -> String {
    let street = property.address.split(' ').nth(1).unwrap_or(&property.address);
    format!(
        "{} However, consider that {} offers better long-term value due to the upcoming school district rezoning.",
        property.match_reason, street
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn property(id: PropertyId, score: u8, rating: &str, projected: bool) -> Property {
        let mut value = serde_json::json!({
            "id": id, "address": format!("{} Oakwood Ave, San Jose", id), "city": "San Jose",
            "price": "$900,000", "beds": 3, "baths": 2.5, "sqft": 1850,
            "match_reason": "Great fit.", "ai_score": score, "investment_rating": rating
        });
        if projected {
            value["investment"] = serde_json::json!({ "projected_value": "$1.1M" });
        }
        serde_json::from_value(value).unwrap()
    }

    fn row<'a>(table: &'a ComparisonTable, label: &str) -> &'a CompareRow {
        table.rows.iter().find(|r| r.label == label).unwrap()
    }

    #[test]
    fn highest_score_is_highlighted() {
        let a = property(1, 98, "A+", false);
        let b = property(2, 89, "B", false);
        let table = build_table(&[&a, &b], &mut StdRng::seed_from_u64(7));
        let scores = row(&table, "AI Match Score");
        assert!(scores.cells[0].highlight);
        assert!(!scores.cells[1].highlight);
        assert_eq!(scores.cells[0].content, "98%");
    }

    #[test]
    fn rating_bands_follow_leading_letter() {
        let a = property(1, 90, "A+", false);
        let b = property(2, 90, "B+", false);
        let c = property(3, 90, "C", false);
        let table = build_table(&[&a, &b, &c], &mut StdRng::seed_from_u64(7));
        let grades: Vec<_> = row(&table, "Investment Rating")
            .cells
            .iter()
            .map(|c| c.grade.unwrap())
            .collect();
        assert_eq!(grades, vec![Grade::Green, Grade::Blue, Grade::Orange]);
        assert!(row(&table, "AI Match Score").cells.iter().all(|c| c.highlight));
    }

    #[test]
    fn same_seed_gives_same_table() {
        let a = property(1, 90, "A", true);
        let b = property(2, 80, "B", true);
        let first = build_table(&[&a, &b], &mut StdRng::seed_from_u64(42));
        let second = build_table(&[&a, &b], &mut StdRng::seed_from_u64(42));
        for label in ["Projected Appr.", "Noise Level"] {
            let x: Vec<_> = row(&first, label).cells.iter().map(|c| c.content.clone()).collect();
            let y: Vec<_> = row(&second, label).cells.iter().map(|c| c.content.clone()).collect();
            assert_eq!(x, y);
        }
    }

    #[test]
    fn appreciation_defaults_without_projection() {
        let a = property(1, 90, "A", false);
        let b = property(2, 80, "B", true);
        let table = build_table(&[&a, &b], &mut StdRng::seed_from_u64(1));
        let cells = &row(&table, "Projected Appr.").cells;
        assert_eq!(cells[0].content, DEFAULT_APPRECIATION);
        let pct: u32 = cells[1].content[1..].split('%').next().unwrap().parse().unwrap();
        assert!((10..25).contains(&pct));
    }

    #[test]
    fn fixed_rows_and_verdicts() {
        let a = property(1, 90, "A", false);
        let b = property(2, 80, "B", false);
        let table = build_table(&[&a, &b], &mut StdRng::seed_from_u64(1));
        assert_eq!(table.columns[0].headline, "1 Oakwood Ave");
        assert_eq!(row(&table, "Beds / Baths").cells[0].content, "3bd / 2.5ba");
        assert_eq!(row(&table, "SqFt").cells[0].content, "1,850 sqft");
        assert_eq!(row(&table, "School Rating").cells[0].content, DEFAULT_SCHOOL_RATING);
        assert!(table.verdicts[0].starts_with("Great fit. However, consider that Oakwood offers"));
    }
}
