//! Client dashboard state.
//!
//! Owns the active tab, the selected listing and every overlay flag, and turns
//! user actions into transitions. Delayed work (intake steps, visit requests,
//! property-chat replies) is returned to the caller as data to be scheduled.

use std::collections::BTreeSet;
use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::chat::ChatMessage;
use crate::concierge::{
    compare::{self, ComparisonTable, MAX_COMPARE, MIN_COMPARE},
    intake::{Applied, IntakeFlow, IntakeStep, IntakeTimings, Scheduled},
    listing::{Property, PropertyId},
    mortgage::{self, MortgageBreakdown, MortgageInputs},
    property_chat::PropertyChat,
    tour::TourCursor,
    visits::{RealtorResponse, ScheduleSlot, Visit, VisitBook, VisitId},
};
use crate::error::ConciergeError;
use crate::fixtures::Catalog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
    Chat,
    Matches,
    Saved,
    Visits,
    Profile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetTab {
    Overview,
    Tour,
    Calculator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    List,
    Map,
}

/// Progress of the tour request started from the detail sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Idle,
    Loading,
    Success,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CardTap {
    Opened,
    CompareAdded,
    CompareRemoved,
    CompareFull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveToggle {
    Saved,
    Unsaved,
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitAction {
    Ignored,
    ShowVisits,
    ScheduleFormOpened,
}

/// A submitted schedule form waiting for its simulated round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingVisit {
    pub property_id: PropertyId,
    pub date: String,
    pub time: String,
}

/// A property-chat question waiting for its canned reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReply {
    pub generation: u64,
    pub seq: u64,
    pub property_id: PropertyId,
    pub query: String,
}

#[derive(Debug, Clone)]
pub(crate) struct Selection {
    pub(crate) property_id: PropertyId,
    pub(crate) sheet_tab: SheetTab,
    pub(crate) tour: TourCursor,
    pub(crate) calculator: MortgageInputs,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct CompareState {
    pub(crate) active: bool,
    pub(crate) selection: Vec<PropertyId>,
    pub(crate) table: Option<ComparisonTable>,
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    pub(crate) catalog: Arc<Catalog>,
    pub(crate) tab: Tab,
    pub(crate) intake: IntakeFlow,
    pub(crate) matches: Vec<PropertyId>,
    pub(crate) saved: BTreeSet<PropertyId>,
    pub(crate) compare: CompareState,
    pub(crate) selection: Option<Selection>,
    pub(crate) schedule_form: Option<PropertyId>,
    pub(crate) request_status: RequestStatus,
    pub(crate) visits: VisitBook,
    pub(crate) property_chat: Option<PropertyChat>,
    pub(crate) chat_generation: u64,
    pub(crate) view_mode: ViewMode,
    pub(crate) dark_mode: bool,
}

impl Dashboard {
    pub fn new(catalog: Arc<Catalog>, timings: IntakeTimings) -> Self {
        let greeting = catalog.brand.greeting(&catalog.profile.name);
        let intake = IntakeFlow::new(catalog.questions.clone(), greeting, timings);
        let visits = VisitBook::new(catalog.visits.clone());
        Self {
            catalog,
            tab: Tab::Chat,
            intake,
            matches: Vec::new(),
            saved: BTreeSet::new(),
            compare: CompareState::default(),
            selection: None,
            schedule_form: None,
            request_status: RequestStatus::Idle,
            visits,
            property_chat: None,
            chat_generation: 0,
            view_mode: ViewMode::List,
            dark_mode: true,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn tab(&self) -> Tab {
        self.tab
    }

    pub fn set_tab(&mut self, tab: Tab) {
        self.tab = tab;
    }

    // ---------------------------------------------------------------------
    // Intake
    // ---------------------------------------------------------------------

    pub fn intake(&self) -> &IntakeFlow {
        &self.intake
    }

    pub fn start_intake(&mut self) -> Option<Scheduled> {
        self.intake.start()
    }

    /// Advances the intake; on completion the match list is filled and the
    /// matches tab shown.
    pub fn apply_intake(&mut self, step: IntakeStep) -> Applied {
        let applied = self.intake.apply(step);
        if applied.completed {
            self.matches = self.catalog.listings.iter().map(|p| p.id).collect();
            self.tab = Tab::Matches;
            info!(
                "Intake complete with {} answers, {} matches ready",
                self.intake.answers().len(),
                self.matches.len()
            );
        }
        applied
    }

    pub fn toggle_option(&mut self, option: &str) -> Result<Vec<String>, ConciergeError> {
        self.intake.toggle_option(option).map(|s| s.to_vec())
    }

    pub fn send_answer(&mut self, text: Option<&str>) -> Result<(ChatMessage, Scheduled), ConciergeError> {
        self.intake.submit(text)
    }

    // ---------------------------------------------------------------------
    // Listings
    // ---------------------------------------------------------------------

    fn property(&self, id: PropertyId) -> Result<&Property, ConciergeError> {
        self.catalog
            .listing(id)
            .ok_or(ConciergeError::UnknownProperty(id))
    }

    /// A listing from the current match list. Listings not shown to the
    /// client cannot be acted on.
    fn matched(&self, id: PropertyId) -> Result<&Property, ConciergeError> {
        if !self.matches.contains(&id) {
            return Err(ConciergeError::UnknownProperty(id));
        }
        self.property(id)
    }

    pub fn matches(&self) -> impl Iterator<Item = &Property> {
        self.matches.iter().filter_map(|id| self.catalog.listing(*id))
    }

    /// Listings shown on the current tab: all matches, or only saved ones.
    pub fn displayed(&self) -> Vec<&Property> {
        match self.tab {
            Tab::Saved => self.matches().filter(|p| self.saved.contains(&p.id)).collect(),
            _ => self.matches().collect(),
        }
    }

    pub fn selected_property(&self) -> Option<&Property> {
        self.selection
            .as_ref()
            .and_then(|s| self.catalog.listing(s.property_id))
    }

    fn selection_mut(&mut self) -> Result<&mut Selection, ConciergeError> {
        self.selection.as_mut().ok_or(ConciergeError::NoPropertySelected)
    }

    fn open_sheet(&mut self, id: PropertyId) -> Result<(), ConciergeError> {
        let calculator = MortgageInputs::for_property(self.property(id)?);
        self.selection = Some(Selection {
            property_id: id,
            sheet_tab: SheetTab::Overview,
            tour: TourCursor::default(),
            calculator,
        });
        Ok(())
    }

    /// Tapping a card opens its detail sheet, or in compare mode toggles it
    /// in the comparison.
    pub fn tap_card(&mut self, id: PropertyId) -> Result<CardTap, ConciergeError> {
        self.matched(id)?;

        if !self.compare.active {
            self.open_sheet(id)?;
            return Ok(CardTap::Opened);
        }

        let selection = &mut self.compare.selection;
        if let Some(pos) = selection.iter().position(|p| *p == id) {
            selection.remove(pos);
            Ok(CardTap::CompareRemoved)
        } else if selection.len() < MAX_COMPARE {
            selection.push(id);
            Ok(CardTap::CompareAdded)
        } else {
            debug!("Compare selection full, ignoring {}", id);
            Ok(CardTap::CompareFull)
        }
    }

    pub fn close_property(&mut self) {
        self.selection = None;
        self.request_status = RequestStatus::Idle;
        self.schedule_form = None;
        self.property_chat = None;
    }

    pub fn set_sheet_tab(&mut self, tab: SheetTab) -> Result<(), ConciergeError> {
        self.selection_mut()?.sheet_tab = tab;
        Ok(())
    }

    pub fn set_calculator(
        &mut self,
        down_payment_percent: u8,
        interest_rate_percent: f64,
        loan_term_years: u32,
    ) -> Result<MortgageBreakdown, ConciergeError> {
        let selection = self.selection_mut()?;
        selection.calculator =
            selection
                .calculator
                .with_sliders(down_payment_percent, interest_rate_percent, loan_term_years)?;
        Ok(mortgage::calculate(&selection.calculator))
    }

    pub fn next_room(&mut self) -> Result<(), ConciergeError> {
        let rooms = self.selected_property().map(|p| p.virtual_tour.len());
        let rooms = rooms.ok_or(ConciergeError::NoPropertySelected)?;
        self.selection_mut()?.tour.next(rooms);
        Ok(())
    }

    pub fn previous_room(&mut self) -> Result<(), ConciergeError> {
        let rooms = self.selected_property().map(|p| p.virtual_tour.len());
        let rooms = rooms.ok_or(ConciergeError::NoPropertySelected)?;
        self.selection_mut()?.tour.previous(rooms);
        Ok(())
    }

    pub fn toggle_saved(&mut self, id: PropertyId) -> Result<SaveToggle, ConciergeError> {
        self.matched(id)?;
        if self.compare.active {
            return Ok(SaveToggle::Ignored);
        }
        if self.saved.remove(&id) {
            Ok(SaveToggle::Unsaved)
        } else {
            self.saved.insert(id);
            Ok(SaveToggle::Saved)
        }
    }

    pub fn saved(&self) -> &BTreeSet<PropertyId> {
        &self.saved
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.view_mode = mode;
    }

    pub fn toggle_dark_mode(&mut self) -> bool {
        self.dark_mode = !self.dark_mode;
        self.dark_mode
    }

    // ---------------------------------------------------------------------
    // Compare
    // ---------------------------------------------------------------------

    /// Enters or leaves compare mode. Either way the selection starts empty
    /// and the comparison view is closed.
    pub fn toggle_compare_mode(&mut self) -> bool {
        self.compare.active = !self.compare.active;
        self.compare.selection.clear();
        self.compare.table = None;
        self.compare.active
    }

    pub fn compare_selection(&self) -> &[PropertyId] {
        &self.compare.selection
    }

    pub fn open_compare<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<&ComparisonTable, ConciergeError> {
        if !self.compare.active {
            return Err(ConciergeError::CompareInactive);
        }
        if self.compare.selection.len() < MIN_COMPARE {
            return Err(ConciergeError::CompareNeedsTwo);
        }

        let chosen: Vec<&Property> = self
            .matches()
            .filter(|p| self.compare.selection.contains(&p.id))
            .collect();
        let table = compare::build_table(&chosen, rng);
        Ok(self.compare.table.insert(table))
    }

    pub fn close_compare(&mut self) {
        self.compare.table = None;
    }

    // ---------------------------------------------------------------------
    // Visits
    // ---------------------------------------------------------------------

    pub fn visits(&self) -> &VisitBook {
        &self.visits
    }

    pub fn request_status(&self) -> RequestStatus {
        self.request_status
    }

    /// "Request visit" on a listing card.
    pub fn request_visit(&mut self, id: PropertyId) -> Result<VisitAction, ConciergeError> {
        let property = self.matched(id)?;
        if self.compare.active {
            return Ok(VisitAction::Ignored);
        }
        if self.visits.has_visit_for(property) {
            self.tab = Tab::Visits;
            return Ok(VisitAction::ShowVisits);
        }
        self.open_sheet(id)?;
        self.schedule_form = Some(id);
        Ok(VisitAction::ScheduleFormOpened)
    }

    /// "Schedule private tour" in the detail sheet.
    pub fn schedule_tour(&mut self) -> Result<VisitAction, ConciergeError> {
        let property = self.selected_property().ok_or(ConciergeError::NoPropertySelected)?;
        let (id, has_visit) = (property.id, self.visits.has_visit_for(property));
        if self.request_status == RequestStatus::Loading {
            return Ok(VisitAction::Ignored);
        }
        if has_visit && self.request_status == RequestStatus::Idle {
            self.close_property();
            self.tab = Tab::Visits;
            return Ok(VisitAction::ShowVisits);
        }
        self.schedule_form = Some(id);
        Ok(VisitAction::ScheduleFormOpened)
    }

    /// "Pick new time" on a declined or rescheduled visit.
    pub fn pick_new_time(&mut self, visit_id: VisitId) -> Result<(), ConciergeError> {
        let visit = self
            .visits
            .get(visit_id)
            .ok_or(ConciergeError::UnknownVisit(visit_id))?;
        let listing = match visit.listing_id {
            Some(id) => self.catalog.listing(id),
            None => self.catalog.listing_by_address(&visit.property),
        };
        let id = listing
            .map(|p| p.id)
            .ok_or_else(|| ConciergeError::UnknownAddress(visit.property.clone()))?;

        self.open_sheet(id)?;
        self.schedule_form = Some(id);
        Ok(())
    }

    pub fn cancel_schedule(&mut self) {
        self.schedule_form = None;
        self.selection = None;
        self.property_chat = None;
    }

    /// Validates and submits the schedule form. The visit itself is created
    /// by [`Self::complete_visit_request`] once the round trip finishes.
    pub fn submit_schedule(&mut self, date: &str, time: &str) -> Result<PendingVisit, ConciergeError> {
        let property_id = self.schedule_form.ok_or(ConciergeError::ScheduleFormClosed)?;
        if date.trim().is_empty() || time.trim().is_empty() {
            return Err(ConciergeError::ScheduleIncomplete);
        }

        self.schedule_form = None;
        self.request_status = RequestStatus::Loading;
        Ok(PendingVisit {
            property_id,
            date: date.to_string(),
            time: time.to_string(),
        })
    }

    pub fn complete_visit_request(&mut self, pending: &PendingVisit) -> Result<Visit, ConciergeError> {
        let property = self
            .catalog
            .listing(pending.property_id)
            .ok_or(ConciergeError::UnknownProperty(pending.property_id))?;
        let slot = ScheduleSlot::from_form(&pending.date, &pending.time);
        let visit = self.visits.book(property, slot).clone();

        if self
            .selection
            .as_ref()
            .is_some_and(|s| s.property_id == pending.property_id)
        {
            self.request_status = RequestStatus::Success;
        }
        info!("Visit {} requested for {}", visit.id, visit.property);
        Ok(visit)
    }

    /// Demo trigger standing in for the realtor answering the newest request.
    pub fn realtor_response(&mut self, response: RealtorResponse) -> Option<Visit> {
        let visit = self.visits.respond_newest(response).cloned();
        if let Some(visit) = &visit {
            info!("Realtor response {:?} applied to visit {}", response, visit.id);
        }
        visit
    }

    // ---------------------------------------------------------------------
    // Property chat
    // ---------------------------------------------------------------------

    pub fn open_property_chat(&mut self) -> Result<&PropertyChat, ConciergeError> {
        let id = self
            .selection
            .as_ref()
            .map(|s| s.property_id)
            .ok_or(ConciergeError::NoPropertySelected)?;
        let property = self
            .catalog
            .listing(id)
            .ok_or(ConciergeError::UnknownProperty(id))?;
        let reuse = self
            .property_chat
            .as_ref()
            .is_some_and(|c| c.property_id() == id);
        if !reuse {
            self.chat_generation += 1;
            self.property_chat = Some(PropertyChat::open(property, self.chat_generation));
        }
        self.property_chat
            .as_ref()
            .ok_or(ConciergeError::PropertyChatClosed)
    }

    pub fn property_chat(&self) -> Option<&PropertyChat> {
        self.property_chat.as_ref()
    }

    pub fn ask_property(&mut self, text: &str) -> Result<(ChatMessage, PendingReply), ConciergeError> {
        if text.trim().is_empty() {
            return Err(ConciergeError::EmptyQuery);
        }
        let chat = self
            .property_chat
            .as_mut()
            .ok_or(ConciergeError::PropertyChatClosed)?;
        let (message, seq) = chat.ask(text);
        Ok((
            message,
            PendingReply {
                generation: chat.generation(),
                seq,
                property_id: chat.property_id(),
                query: text.to_string(),
            },
        ))
    }

    /// Appends the canned reply, unless the overlay it was asked in has been
    /// closed since. A reopened overlay has a new generation.
    pub fn deliver_property_reply(&mut self, pending: &PendingReply) -> Option<ChatMessage> {
        let property = self.catalog.listing(pending.property_id)?;
        let chat = self.property_chat.as_mut()?;
        if chat.generation() != pending.generation || chat.property_id() != pending.property_id {
            return None;
        }
        chat.reply(pending.seq, property, &pending.query)
    }

    /// Drives the scripted intake to completion without timers, from
    /// whatever phase it is in, picking the first option for every question.
    #[cfg(test)]
    pub(crate) fn run_intake_to_completion(&mut self) {
        use super::intake::IntakePhase;

        self.start_intake();
        loop {
            let step = match self.intake.phase() {
                IntakePhase::Idle => IntakeStep::Begin,
                IntakePhase::Asking(i) => IntakeStep::Reveal(i),
                IntakePhase::AwaitingAnswer(_) => {
                    let options = self.intake.view().options.expect("options shown");
                    self.toggle_option(&options[0].label).expect("listed option");
                    self.send_answer(None).expect("answer accepted");
                    continue;
                }
                IntakePhase::Transitioning(i) => IntakeStep::Advance(i),
                IntakePhase::Finishing => IntakeStep::Close,
                IntakePhase::Completing => IntakeStep::Complete,
                IntakePhase::Done => return,
            };
            self.apply_intake(step);
        }
    }

    pub fn close_property_chat(&mut self) {
        self.property_chat = None;
    }
}
