use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::concierge::listing::{Property, PropertyId};

pub type VisitId = u64;

pub const REALTOR_NOTE: &str = "Realtor suggests: Tuesday, 4:00 PM";
pub const UNSCHEDULED: &str = "TBD";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisitStatus {
    Pending,
    Confirmed,
    Declined,
    #[serde(alias = "Action Needed")]
    Reschedule,
    Completed,
}

impl VisitStatus {
    pub fn label(self) -> &'static str {
        match self {
            VisitStatus::Pending => "Pending",
            VisitStatus::Confirmed => "Confirmed",
            VisitStatus::Declined => "Declined",
            VisitStatus::Reschedule => "Action Needed",
            VisitStatus::Completed => "Completed",
        }
    }

    pub fn tone(self) -> VisitTone {
        match self {
            VisitStatus::Confirmed | VisitStatus::Completed => VisitTone::Positive,
            VisitStatus::Declined | VisitStatus::Reschedule => VisitTone::Negative,
            VisitStatus::Pending => VisitTone::Waiting,
        }
    }

    /// The realtor turned the request down; the client can pick a new time.
    pub fn needs_new_time(self) -> bool {
        matches!(self, VisitStatus::Declined | VisitStatus::Reschedule)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisitTone {
    Positive,
    Negative,
    Waiting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RealtorResponse {
    Accept,
    Decline,
    Reschedule,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    pub id: VisitId,
    /// Address of the listing. Legacy records are joined to listings by this.
    pub property: String,
    #[serde(default)]
    pub listing_id: Option<PropertyId>,
    pub date: String,
    pub time: String,
    pub status: VisitStatus,
    #[serde(default)]
    pub note: Option<String>,
}

impl Visit {
    /// Records carrying a listing id match on id; older ones fall back to the
    /// address string.
    pub fn is_for(&self, property: &Property) -> bool {
        match self.listing_id {
            Some(id) => id == property.id,
            None => self.property == property.address,
        }
    }

    pub fn view(&self) -> VisitView {
        VisitView {
            id: self.id,
            property: self.property.clone(),
            date: self.date.clone(),
            time: self.time.clone(),
            status: self.status,
            label: self.status.label(),
            tone: self.status.tone(),
            note: self.note.clone(),
            can_pick_new_time: self.status.needs_new_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VisitView {
    pub id: VisitId,
    pub property: String,
    pub date: String,
    pub time: String,
    pub status: VisitStatus,
    pub label: &'static str,
    pub tone: VisitTone,
    pub note: Option<String>,
    pub can_pick_new_time: bool,
}

/// Display labels for a requested slot, e.g. `SUN, MAR 15` / `4:00 PM`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleSlot {
    pub date: String,
    pub time: String,
}

impl ScheduleSlot {
    /// Blank fields give `TBD`; input that does not parse is kept verbatim.
    pub fn from_form(date: &str, time: &str) -> Self {
        let (date, time) = (date.trim(), time.trim());
        if date.is_empty() || time.is_empty() {
            return Self {
                date: UNSCHEDULED.to_string(),
                time: UNSCHEDULED.to_string(),
            };
        }

        let combined = format!("{}T{}", date, time);
        let parsed = NaiveDateTime::parse_from_str(&combined, "%Y-%m-%dT%H:%M")
            .or_else(|_| NaiveDateTime::parse_from_str(&combined, "%Y-%m-%dT%H:%M:%S"));

        match parsed {
            Ok(at) => Self {
                date: at.format("%a, %b %-d").to_string().to_uppercase(),
                time: at.format("%-I:%M %p").to_string(),
            },
            Err(_) => Self {
                date: date.to_string(),
                time: time.to_string(),
            },
        }
    }
}

/// Visit records, newest first.
#[derive(Debug, Clone, Default)]
pub struct VisitBook {
    visits: Vec<Visit>,
    next_id: VisitId,
}

impl VisitBook {
    pub fn new(visits: Vec<Visit>) -> Self {
        let next_id = visits.iter().map(|v| v.id).max().map_or(1, |max| max + 1);
        Self { visits, next_id }
    }

    pub fn visits(&self) -> &[Visit] {
        &self.visits
    }

    pub fn get(&self, id: VisitId) -> Option<&Visit> {
        self.visits.iter().find(|v| v.id == id)
    }

    pub fn has_visit_for(&self, property: &Property) -> bool {
        self.visits.iter().any(|v| v.is_for(property))
    }

    /// Adds a pending request and drops earlier declined or rescheduled
    /// records for the same listing.
    pub fn book(&mut self, property: &Property, slot: ScheduleSlot) -> &Visit {
        self.visits
            .retain(|v| !(v.is_for(property) && v.status.needs_new_time()));

        let visit = Visit {
            id: self.next_id,
            property: property.address.clone(),
            listing_id: Some(property.id),
            date: slot.date,
            time: slot.time,
            status: VisitStatus::Pending,
            note: None,
        };
        self.next_id += 1;
        self.visits.insert(0, visit);
        &self.visits[0]
    }

    /// Applies a realtor's answer to the newest record.
    pub fn respond_newest(&mut self, response: RealtorResponse) -> Option<&Visit> {
        let newest = self.visits.first_mut()?;
        match response {
            RealtorResponse::Accept => newest.status = VisitStatus::Confirmed,
            RealtorResponse::Decline => {
                newest.status = VisitStatus::Declined;
                newest.note = Some(REALTOR_NOTE.to_string());
            }
            RealtorResponse::Reschedule => {
                newest.status = VisitStatus::Reschedule;
                newest.note = Some(REALTOR_NOTE.to_string());
            }
        }
        Some(newest)
    }
}
