//! Serializable snapshot of a dashboard, as sent to clients.

use serde::Serialize;

use crate::concierge::{
    compare::{ComparisonTable, MIN_COMPARE},
    dashboard::{Dashboard, RequestStatus, SheetTab, Tab, ViewMode},
    history::Appreciation,
    intake::IntakeView,
    listing::{AmenityKind, Coordinates, Property, PropertyId},
    mortgage::{self, MortgageBreakdown, MortgageInputs},
    property_chat::PropertyChatView,
    tour::TourView,
    visits::VisitView,
};
use crate::fixtures::ClientProfile;

/// Map center used when no listing carries coordinates.
pub const DEFAULT_MAP_CENTER: Coordinates = Coordinates {
    lat: 37.3382,
    lng: -121.8863,
};
pub const DEFAULT_MAP_ZOOM: u8 = 11;

const REALTOR_PICK: &str = "Realtor Pick";

#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub tab: Tab,
    pub title: String,
    pub dark_mode: bool,
    pub view_mode: ViewMode,
    pub intake: IntakeView,
    pub listings: ListingsView,
    pub compare: CompareView,
    pub sheet: Option<SheetView>,
    pub schedule_form: Option<ScheduleFormView>,
    pub request_status: RequestStatus,
    pub visits: Vec<VisitView>,
    pub property_chat: Option<PropertyChatView>,
    pub profile: ClientProfile,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ListingsView {
    Empty {
        title: &'static str,
        hint: &'static str,
        start_chat: bool,
    },
    Cards {
        cards: Vec<CardView>,
        compare_toggle: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        map: Option<MapView>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct CardView {
    pub id: PropertyId,
    pub address: String,
    pub city: String,
    pub price: String,
    pub beds: u8,
    pub baths: f32,
    pub sqft: u32,
    pub image: String,
    pub match_reason: String,
    pub ai_score: u8,
    pub realtor_pick: bool,
    pub saved: bool,
    pub compare_selected: bool,
    pub visit_button: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct MapView {
    pub center: Coordinates,
    pub zoom: u8,
    pub markers: Vec<MapMarker>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MapMarker {
    pub id: PropertyId,
    pub position: Coordinates,
    pub address: String,
    pub price: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompareView {
    pub active: bool,
    pub selected: Vec<PropertyId>,
    pub can_open: bool,
    pub table: Option<ComparisonTable>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AmenityView {
    pub kind: AmenityKind,
    pub icon: &'static str,
    pub name: String,
    pub distance: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalculatorView {
    pub inputs: MortgageInputs,
    pub breakdown: MortgageBreakdown,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryView {
    pub total: String,
    pub annual: String,
    pub appreciation: Appreciation,
}

#[derive(Debug, Clone, Serialize)]
pub struct SheetView {
    pub property: Property,
    pub tab: SheetTab,
    pub amenities: Vec<AmenityView>,
    pub has_visit: bool,
    pub tour_button: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<HistoryView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tour: Option<TourView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calculator: Option<CalculatorView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleFormView {
    pub property_id: PropertyId,
    pub address: String,
}

impl Dashboard {
    pub fn view(&self) -> DashboardView {
        DashboardView {
            tab: self.tab,
            title: self.title(),
            dark_mode: self.dark_mode,
            view_mode: self.view_mode,
            intake: self.intake.view(),
            listings: self.listings_view(),
            compare: CompareView {
                active: self.compare.active,
                selected: self.compare.selection.clone(),
                can_open: self.compare.active && self.compare.selection.len() >= MIN_COMPARE,
                table: self.compare.table.clone(),
            },
            sheet: self.sheet_view(),
            schedule_form: self.schedule_form.and_then(|id| {
                self.catalog.listing(id).map(|p| ScheduleFormView {
                    property_id: id,
                    address: p.address.clone(),
                })
            }),
            request_status: self.request_status,
            visits: self.visits.visits().iter().map(|v| v.view()).collect(),
            property_chat: self.property_chat.as_ref().map(|c| c.view()),
            profile: self.catalog.profile.clone(),
        }
    }

    fn title(&self) -> String {
        match self.tab {
            Tab::Chat => self.catalog.brand.ai_name.clone(),
            Tab::Matches => "Top Matches".to_string(),
            Tab::Saved => "Saved Homes".to_string(),
            Tab::Visits => "Your Visits".to_string(),
            Tab::Profile => "Profile".to_string(),
        }
    }

    fn listings_view(&self) -> ListingsView {
        let shown = self.displayed();
        if shown.is_empty() {
            return match self.tab {
                Tab::Saved => ListingsView::Empty {
                    title: "No Saved Properties",
                    hint: "Tap the heart on a listing to keep it here.",
                    start_chat: false,
                },
                _ => ListingsView::Empty {
                    title: "No Matches Yet",
                    hint: "Chat with your concierge to get personalized recommendations.",
                    start_chat: true,
                },
            };
        }

        let cards = shown.iter().map(|p| self.card(p)).collect();
        let map = (self.view_mode == ViewMode::Map).then(|| map_view(&shown));
        ListingsView::Cards {
            cards,
            compare_toggle: self.view_mode == ViewMode::List && shown.len() > 1,
            map,
        }
    }

    fn card(&self, property: &Property) -> CardView {
        let compare_selected = self.compare.selection.contains(&property.id);
        let visit_button = if self.compare.active {
            if compare_selected {
                "Selected"
            } else {
                "Tap to Compare"
            }
        } else if self.visits.has_visit_for(property) {
            "Request Sent"
        } else {
            "Request Visit"
        };

        CardView {
            id: property.id,
            address: property.address.clone(),
            city: property.city.clone(),
            price: property.price.clone(),
            beds: property.beds,
            baths: property.baths,
            sqft: property.sqft,
            image: property.image.clone(),
            match_reason: property.match_reason.clone(),
            ai_score: property.ai_score,
            realtor_pick: property.has_tag(REALTOR_PICK),
            saved: self.saved.contains(&property.id),
            compare_selected,
            visit_button,
        }
    }

    /// The detail sheet; hidden while the schedule form covers it.
    fn sheet_view(&self) -> Option<SheetView> {
        if self.schedule_form.is_some() {
            return None;
        }
        let selection = self.selection.as_ref()?;
        let property = self.catalog.listing(selection.property_id)?;
        let has_visit = self.visits.has_visit_for(property);

        let tour_button = match self.request_status {
            RequestStatus::Loading => "Sending Request...",
            RequestStatus::Success => "Request Sent!",
            RequestStatus::Idle if has_visit => "View Visit Status",
            RequestStatus::Idle => "Schedule Private Tour",
        };

        let amenities = property
            .nearby_amenities
            .iter()
            .map(|a| AmenityView {
                kind: a.kind,
                icon: a.kind.icon(),
                name: a.name.clone(),
                distance: a.distance.clone(),
            })
            .collect();

        let history = property
            .history
            .as_ref()
            .and_then(|h| h.appreciation())
            .map(|appreciation| HistoryView {
                total: appreciation.total_label(),
                annual: appreciation.annual_label(),
                appreciation,
            });

        Some(SheetView {
            property: property.clone(),
            tab: selection.sheet_tab,
            amenities,
            has_visit,
            tour_button,
            history,
            tour: (selection.sheet_tab == SheetTab::Tour)
                .then(|| selection.tour.view(&property.virtual_tour)),
            calculator: (selection.sheet_tab == SheetTab::Calculator).then(|| CalculatorView {
                inputs: selection.calculator,
                breakdown: mortgage::calculate(&selection.calculator),
            }),
        })
    }
}

fn map_view(shown: &[&Property]) -> MapView {
    let markers: Vec<MapMarker> = shown
        .iter()
        .filter_map(|p| {
            p.coordinates.map(|position| MapMarker {
                id: p.id,
                position,
                address: p.address.clone(),
                price: p.price.clone(),
            })
        })
        .collect();

    MapView {
        center: DEFAULT_MAP_CENTER,
        zoom: DEFAULT_MAP_ZOOM,
        markers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concierge::intake::IntakeTimings;
    use crate::fixtures::Catalog;
    use std::sync::Arc;

    fn ready() -> Dashboard {
        let mut d = Dashboard::new(Arc::new(Catalog::builtin().unwrap()), IntakeTimings::default());
        d.run_intake_to_completion();
        d
    }

    #[test]
    fn fresh_dashboard_shows_empty_matches() {
        let mut d = Dashboard::new(Arc::new(Catalog::builtin().unwrap()), IntakeTimings::default());
        let view = d.view();
        assert_eq!(view.title, "Alfred");
        assert!(view.dark_mode);
        d.set_tab(Tab::Matches);
        match d.view().listings {
            ListingsView::Empty { title, start_chat, .. } => {
                assert_eq!(title, "No Matches Yet");
                assert!(start_chat);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn saved_tab_empty_state() {
        let mut d = ready();
        d.set_tab(Tab::Saved);
        assert!(matches!(
            d.view().listings,
            ListingsView::Empty { title: "No Saved Properties", start_chat: false, .. }
        ));
    }

    #[test]
    fn cards_carry_badges_and_visit_labels() {
        let d = ready();
        let ListingsView::Cards { cards, compare_toggle, map } = d.view().listings else {
            panic!("expected cards");
        };
        assert_eq!(cards.len(), 3);
        assert!(compare_toggle);
        assert!(map.is_none());
        assert!(cards[0].realtor_pick);
        assert_eq!(cards[0].visit_button, "Request Sent");
        assert_eq!(cards[2].visit_button, "Request Visit");
    }

    #[test]
    fn map_view_skips_listings_without_coordinates() {
        let mut d = ready();
        d.set_view_mode(ViewMode::Map);
        let ListingsView::Cards { compare_toggle, map, .. } = d.view().listings else {
            panic!("expected cards");
        };
        assert!(!compare_toggle);
        let map = map.unwrap();
        assert_eq!(map.zoom, DEFAULT_MAP_ZOOM);
        let ids: Vec<_> = map.markers.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn sheet_shows_calculator_and_history() {
        let mut d = ready();
        d.tap_card(1).unwrap();
        let sheet = d.view().sheet.unwrap();
        assert_eq!(sheet.tour_button, "View Visit Status");
        assert!(sheet.calculator.is_none());
        assert_eq!(sheet.history.as_ref().unwrap().total, "+31.3%");
        assert_eq!(sheet.amenities[0].icon, "graduation-cap");
        assert_eq!(sheet.amenities[1].icon, "map-pin");

        d.set_sheet_tab(SheetTab::Calculator).unwrap();
        let calc = d.view().sheet.unwrap().calculator.unwrap();
        assert!((calc.breakdown.total_monthly - 5967.20).abs() < 0.01);
    }

    #[test]
    fn schedule_form_hides_sheet() {
        let mut d = ready();
        d.request_visit(3).unwrap();
        let view = d.view();
        assert!(view.sheet.is_none());
        assert_eq!(view.schedule_form.unwrap().address, "3300 Downtown Lofts #4B");
    }

    #[test]
    fn compare_cards_use_selection_labels() {
        let mut d = ready();
        d.toggle_compare_mode();
        d.tap_card(2).unwrap();
        let view = d.view();
        assert!(!view.compare.can_open);
        let ListingsView::Cards { cards, .. } = view.listings else {
            panic!("expected cards");
        };
        assert_eq!(cards[1].visit_button, "Selected");
        assert_eq!(cards[0].visit_button, "Tap to Compare");
    }
}
