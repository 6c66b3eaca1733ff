use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceHistory {
    pub built: u16,
    pub sales: Vec<Sale>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sale {
    pub year: u16,
    pub price: f64,
    pub event: String,
    #[serde(default)]
    pub is_current: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Appreciation {
    pub total_percent: f64,
    pub annual_percent: f64,
}

impl Appreciation {
    pub fn total_label(&self) -> String {
        signed_percent(self.total_percent)
    }

    pub fn annual_label(&self) -> String {
        signed_percent(self.annual_percent)
    }
}

impl PriceHistory {
    /// Growth from the earliest to the latest sale. `None` with fewer than two
    /// sales or a non-positive starting price.
    pub fn appreciation(&self) -> Option<Appreciation> {
        let first = self.sales.iter().min_by_key(|s| s.year)?;
        let last = self.sales.iter().max_by_key(|s| s.year)?;
        if first.price <= 0.0 || last.year <= first.year {
            return None;
        }

        let ratio = last.price / first.price;
        let years = f64::from(last.year - first.year);
        Some(Appreciation {
            total_percent: (ratio - 1.0) * 100.0,
            annual_percent: (ratio.powf(1.0 / years) - 1.0) * 100.0,
        })
    }
}

fn signed_percent(value: f64) -> String {
    if value >= 0.0 {
        format!("+{:.1}%", value)
    } else {
        format!("{:.1}%", value)
    }
}
