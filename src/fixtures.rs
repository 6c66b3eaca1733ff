use crate::{
    brand::Brand,
    concierge::{
        intake::Question,
        listing::{Property, PropertyId},
        visits::Visit,
    },
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, path::Path};
use tracing::warn;

const BUILTIN: &str = include_str!("../demo/fixtures.json");

/// Static content a session is built from: questions, listings, the visit
/// list a new session starts with, branding and the client profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub brand: Brand,
    pub profile: ClientProfile,
    pub questions: Vec<Question>,
    pub listings: Vec<Property>,
    #[serde(default)]
    pub visits: Vec<Visit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientProfile {
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub preferences: Vec<PreferenceRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferenceRow {
    pub label: String,
    pub value: String,
}

impl Catalog {
    /// The demo catalog compiled into the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN).context("Failed to parse built-in fixtures")
    }

    /// Load a catalog from a JSON file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read fixtures from {}", path.display()))?;
        Self::from_json(&raw)
            .with_context(|| format!("Failed to parse fixtures in {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let mut catalog: Catalog = serde_json::from_str(raw)?;
        catalog.link_visits();
        Ok(catalog)
    }

    pub fn listing(&self, id: PropertyId) -> Option<&Property> {
        self.listings.iter().find(|p| p.id == id)
    }

    pub fn listing_by_address(&self, address: &str) -> Option<&Property> {
        self.listings.iter().find(|p| p.address == address)
    }

    /// Fills in listing ids on visit records that only carry an address.
    /// Addresses shared by several listings are left unlinked.
    fn link_visits(&mut self) {
        let mut seen = HashSet::new();
        let shared: HashSet<&str> = self
            .listings
            .iter()
            .filter(|p| !seen.insert(p.address.as_str()))
            .map(|p| p.address.as_str())
            .collect();

        for address in &shared {
            warn!("Address {} is shared by several listings; visits for it stay address-keyed", address);
        }

        for visit in self.visits.iter_mut().filter(|v| v.listing_id.is_none()) {
            if shared.contains(visit.property.as_str()) {
                continue;
            }
            visit.listing_id = self
                .listings
                .iter()
                .find(|p| p.address == visit.property)
                .map(|p| p.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concierge::visits::VisitStatus;

    #[test]
    fn builtin_catalog_parses() {
        let catalog = Catalog::builtin().unwrap();
        assert_eq!(catalog.questions.len(), 5);
        assert_eq!(catalog.listings.len(), 3);
        assert_eq!(catalog.brand.ai_name, "Alfred");
        assert_eq!(catalog.profile.name, "Yash");

        let ids: HashSet<_> = catalog.listings.iter().map(|p| p.id).collect();
        assert_eq!(ids.len(), catalog.listings.len());
    }

    #[test]
    fn builtin_visits_are_linked_to_listings() {
        let catalog = Catalog::builtin().unwrap();
        assert_eq!(catalog.visits.len(), 2);
        assert_eq!(catalog.visits[0].listing_id, Some(1));
        assert_eq!(catalog.visits[1].status, VisitStatus::Confirmed);
        assert_eq!(catalog.visits[1].listing_id, Some(2));
    }

    #[test]
    fn one_listing_has_no_optional_sections() {
        let catalog = Catalog::builtin().unwrap();
        let bare = catalog.listing(3).unwrap();
        assert!(bare.financials.is_none());
        assert!(bare.virtual_tour.is_empty());
        assert!(bare.qa.is_empty());
    }

    #[tokio::test]
    async fn missing_file_reports_path() {
        let err = Catalog::load("/nonexistent/fixtures.json").await.unwrap_err();
        assert!(err.to_string().contains("/nonexistent/fixtures.json"));
    }

    #[test]
    fn shared_addresses_stay_unlinked() {
        let mut catalog = Catalog::builtin().unwrap();
        let mut twin = catalog.listings[0].clone();
        twin.id = 99;
        catalog.listings.push(twin);
        for visit in &mut catalog.visits {
            visit.listing_id = None;
        }
        catalog.link_visits();
        assert_eq!(catalog.visits[0].listing_id, None);
        assert_eq!(catalog.visits[1].listing_id, Some(2));
    }
}
