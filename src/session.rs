//! One client's dashboard plus the timers that drive it.
//!
//! The dashboard itself is synchronous; this wrapper publishes what changed
//! on the event bus and turns returned delays into scheduler tasks. Timer
//! callbacks only hold a weak reference, so a torn-down session drops them.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use rand::{rngs::StdRng, SeedableRng};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::bus::{Channel, Event, EventBus};
use crate::chat::ChatMessage;
use crate::concierge::{
    compare::ComparisonTable,
    dashboard::{Dashboard, PendingReply, PendingVisit},
    intake::Scheduled,
    view::DashboardView,
    visits::{RealtorResponse, Visit},
};
use crate::config::Timings;
use crate::error::ConciergeError;
use crate::fixtures::Catalog;
use crate::manager::{Scheduler, TaskKey};

pub struct ConciergeSession {
    id: String,
    dashboard: Mutex<Dashboard>,
    rng: Mutex<StdRng>,
    event_bus: Arc<EventBus>,
    scheduler: Scheduler,
    timings: Timings,
    last_active: Mutex<Instant>,
    me: Weak<ConciergeSession>,
}

impl ConciergeSession {
    pub fn new(
        id: String,
        catalog: Arc<Catalog>,
        event_bus: Arc<EventBus>,
        timings: Timings,
        compare_seed: Option<u64>,
    ) -> Arc<Self> {
        let rng = match compare_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Arc::new_cyclic(|me| Self {
            id,
            dashboard: Mutex::new(Dashboard::new(catalog, timings.intake)),
            rng: Mutex::new(rng),
            event_bus,
            scheduler: Scheduler::new(),
            timings,
            last_active: Mutex::new(Instant::now()),
            me: me.clone(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn dashboard(&self) -> MutexGuard<'_, Dashboard> {
        self.dashboard.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn touch(&self) {
        *self.last_active.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        let last = *self.last_active.lock().unwrap_or_else(PoisonError::into_inner);
        now.saturating_duration_since(last)
    }

    pub fn snapshot(&self) -> DashboardView {
        self.dashboard().view()
    }

    /// Runs a synchronous transition against the dashboard.
    pub fn update<R>(&self, f: impl FnOnce(&mut Dashboard) -> R) -> R {
        self.touch();
        f(&mut self.dashboard())
    }

    pub fn pending_tasks(&self) -> usize {
        self.scheduler.pending()
    }

    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }

    fn publish_message(&self, channel: Channel, message: ChatMessage) {
        self.event_bus.publish(Event::ChatMessage {
            session: self.id.clone(),
            channel,
            message,
        });
    }

    fn publish_typing(&self, channel: Channel, typing: bool) {
        self.event_bus.publish(Event::Typing {
            session: self.id.clone(),
            channel,
            typing,
        });
    }

    fn publish_visit(&self, visit: Visit) {
        self.event_bus.publish(Event::VisitUpdated {
            session: self.id.clone(),
            visit,
        });
    }

    // ---------------------------------------------------------------------
    // Intake
    // ---------------------------------------------------------------------

    /// Triggers the first intake question. Repeated calls do nothing.
    pub fn start(&self) {
        let first = self.dashboard().start_intake();
        if let Some(scheduled) = first {
            self.schedule_intake(scheduled);
        }
    }

    fn schedule_intake(&self, scheduled: Scheduled) {
        let me = self.me.clone();
        self.scheduler
            .schedule(TaskKey::Intake, scheduled.delay, async move {
                match me.upgrade() {
                    Some(session) => session.run_intake_step(scheduled),
                    None => debug!("Session gone, dropping intake step {:?}", scheduled.step),
                }
            });
    }

    fn run_intake_step(&self, scheduled: Scheduled) {
        let (applied, matches) = {
            let mut dashboard = self.dashboard();
            let applied = dashboard.apply_intake(scheduled.step);
            (applied, dashboard.matches().count())
        };

        if let Some(typing) = applied.typing {
            self.publish_typing(Channel::Intake, typing);
        }
        if let Some(message) = applied.message {
            self.publish_message(Channel::Intake, message);
        }
        if applied.completed {
            self.event_bus.publish(Event::MatchesReady {
                session: self.id.clone(),
                count: matches,
            });
        }
        if let Some(next) = applied.next {
            self.schedule_intake(next);
        }
    }

    pub fn send_answer(&self, text: Option<&str>) -> Result<ChatMessage, ConciergeError> {
        self.touch();
        let (message, next) = self.dashboard().send_answer(text)?;
        self.publish_message(Channel::Intake, message.clone());
        self.schedule_intake(next);
        Ok(message)
    }

    // ---------------------------------------------------------------------
    // Visits
    // ---------------------------------------------------------------------

    pub fn submit_schedule(&self, date: &str, time: &str) -> Result<PendingVisit, ConciergeError> {
        self.touch();
        let pending = self.dashboard().submit_schedule(date, time)?;

        let me = self.me.clone();
        let job = pending.clone();
        self.scheduler.schedule(
            TaskKey::VisitRequest(pending.property_id),
            self.timings.visit_request,
            async move {
                match me.upgrade() {
                    Some(session) => session.finish_visit_request(&job),
                    None => debug!("Session gone, dropping visit request for {}", job.property_id),
                }
            },
        );
        Ok(pending)
    }

    fn finish_visit_request(&self, pending: &PendingVisit) {
        let result = self.dashboard().complete_visit_request(pending);
        match result {
            Ok(visit) => self.publish_visit(visit),
            Err(e) => warn!("Visit request for {} failed: {}", pending.property_id, e),
        }
    }

    pub fn realtor_response(&self, response: RealtorResponse) -> Option<Visit> {
        self.touch();
        let visit = self.dashboard().realtor_response(response);
        if let Some(visit) = &visit {
            self.publish_visit(visit.clone());
        } else {
            info!("No visits to respond to in session {}", self.id);
        }
        visit
    }

    // ---------------------------------------------------------------------
    // Compare
    // ---------------------------------------------------------------------

    pub fn open_compare(&self) -> Result<ComparisonTable, ConciergeError> {
        self.touch();
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        self.dashboard().open_compare(&mut *rng).cloned()
    }

    // ---------------------------------------------------------------------
    // Property chat
    // ---------------------------------------------------------------------

    pub fn ask_property(&self, text: &str) -> Result<ChatMessage, ConciergeError> {
        self.touch();
        let (message, pending) = self.dashboard().ask_property(text)?;
        self.publish_message(Channel::Property, message.clone());
        self.publish_typing(Channel::Property, true);

        let me = self.me.clone();
        let key = TaskKey::PropertyReply {
            generation: pending.generation,
            seq: pending.seq,
        };
        self.scheduler.schedule(
            key,
            self.timings.property_reply,
            async move {
                match me.upgrade() {
                    Some(session) => session.deliver_property_reply(&pending),
                    None => debug!("Session gone, dropping property reply {}", pending.seq),
                }
            },
        );
        Ok(message)
    }

    fn deliver_property_reply(&self, pending: &PendingReply) {
        let (reply, typing) = {
            let mut dashboard = self.dashboard();
            let reply = dashboard.deliver_property_reply(pending);
            let typing = dashboard.property_chat().is_some_and(|c| c.is_typing());
            (reply, typing)
        };

        match reply {
            Some(message) => {
                self.publish_message(Channel::Property, message);
                if !typing {
                    self.publish_typing(Channel::Property, false);
                }
            }
            None => debug!(
                "Property chat closed, dropping reply {} in session {}",
                pending.seq, self.id
            ),
        }
    }
}
