use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info};
use uuid::Uuid;

use crate::bus::{Event, EventBus, NotificationLevel};
use crate::concierge::listing::PropertyId;
use crate::config::{Config, Timings};
use crate::error::ConciergeError;
use crate::fixtures::Catalog;
use crate::session::ConciergeSession;

/// Upper bound on how often idle sessions are checked.
const REAP_INTERVAL: Duration = Duration::from_secs(30);

pub struct Manager {
    catalog: Arc<Catalog>,
    event_bus: Arc<EventBus>,
    timings: Timings,
    compare_seed: Option<u64>,
    session_ttl: Duration,
    sessions: Arc<Mutex<HashMap<String, Arc<ConciergeSession>>>>,
}

impl Manager {
    pub fn new(catalog: Arc<Catalog>, event_bus: Arc<EventBus>, config: &Config) -> Self {
        Self {
            catalog,
            event_bus,
            timings: config.timings(),
            compare_seed: config.compare_seed,
            session_ttl: config.session_ttl,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        self.event_bus.clone()
    }

    fn sessions(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<ConciergeSession>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Opens a dashboard for a new client and starts its intake chat.
    pub fn create_session(&self) -> Arc<ConciergeSession> {
        let session_id = format!("ses_{}", Uuid::new_v4().simple());
        let session = ConciergeSession::new(
            session_id.clone(),
            self.catalog.clone(),
            self.event_bus.clone(),
            self.timings,
            self.compare_seed,
        );

        self.sessions().insert(session_id.clone(), session.clone());
        session.start();

        info!("Session {} created", session_id);
        self.event_bus.publish(Event::SessionNotification {
            level: NotificationLevel::Success,
            message: format!("Session {} started", session_id),
            target: Some(session_id),
        });
        session
    }

    pub fn get(&self, session_id: &str) -> Result<Arc<ConciergeSession>, ConciergeError> {
        let session = self
            .sessions()
            .get(session_id)
            .cloned()
            .ok_or_else(|| ConciergeError::UnknownSession(session_id.to_string()))?;
        session.touch();
        Ok(session)
    }

    pub fn end_session(&self, session_id: &str) -> Result<(), ConciergeError> {
        let session = self
            .sessions()
            .remove(session_id)
            .ok_or_else(|| ConciergeError::UnknownSession(session_id.to_string()))?;
        session.shutdown();

        info!("Session {} ended", session_id);
        self.event_bus.publish(Event::SessionNotification {
            level: NotificationLevel::Info,
            message: format!("Session {} ended", session_id),
            target: Some(session_id.to_string()),
        });
        Ok(())
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions().contains_key(session_id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions().len()
    }

    /// Ends every session idle for longer than the TTL. Returns how many.
    pub fn reap_idle(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<String> = self
            .sessions()
            .iter()
            .filter(|(_, s)| s.idle_for(now) > self.session_ttl)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            if self.end_session(id).is_ok() {
                info!("Session {} reaped after idling", id);
            }
        }
        expired.len()
    }

    pub async fn start_reaper(&self) {
        let period = self.session_ttl.min(REAP_INTERVAL);
        let mut ticker = time::interval(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let reaped = self.reap_idle();
            if reaped > 0 {
                debug!("Reaper ended {} session(s), {} left", reaped, self.session_count());
            }
        }
    }
}

/// Names of the delayed jobs a session can have in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKey {
    Intake,
    VisitRequest(PropertyId),
    PropertyReply { generation: u64, seq: u64 },
}

/// Per-session delayed tasks. A task scheduled under a key that is already
/// pending replaces it.
#[derive(Default)]
pub struct Scheduler {
    tasks: Mutex<HashMap<TaskKey, JoinHandle<()>>>,
    closed: AtomicBool,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn tasks(&self) -> std::sync::MutexGuard<'_, HashMap<TaskKey, JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `job` after `delay`. Returns false once the scheduler is shut down.
    pub fn schedule<F>(&self, key: TaskKey, delay: Duration, job: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks();
        if self.closed.load(Ordering::SeqCst) {
            debug!("Scheduler closed, dropping {:?}", key);
            return false;
        }
        tasks.retain(|_, handle| !handle.is_finished());

        let handle = tokio::spawn(async move {
            time::sleep(delay).await;
            job.await;
        });
        if let Some(previous) = tasks.insert(key, handle) {
            previous.abort();
        }
        true
    }

    pub fn pending(&self) -> usize {
        self.tasks()
            .values()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    pub fn shutdown(&self) {
        let mut tasks = self.tasks();
        self.closed.store(true, Ordering::SeqCst);
        for (_, handle) in tasks.drain() {
            handle.abort();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn manager(ttl_secs: u64) -> Manager {
        let config = Config {
            session_ttl: Duration::from_secs(ttl_secs),
            compare_seed: Some(7),
            ..Config::default()
        };
        Manager::new(
            Arc::new(Catalog::builtin().unwrap()),
            Arc::new(EventBus::new()),
            &config,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_a_key_replaces_the_old_task() {
        let scheduler = Scheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        for n in [1, 10] {
            let fired = fired.clone();
            scheduler.schedule(TaskKey::Intake, Duration::from_millis(100), async move {
                fired.fetch_add(n, Ordering::SeqCst);
            });
        }
        time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_aborts_and_refuses_new_tasks() {
        let scheduler = Scheduler::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let key = TaskKey::PropertyReply { generation: 1, seq: 0 };
        scheduler.schedule(key, Duration::from_millis(100), async move {
            flag.store(true, Ordering::SeqCst);
        });
        assert_eq!(scheduler.pending(), 1);

        scheduler.shutdown();
        assert!(!scheduler.schedule(TaskKey::Intake, Duration::ZERO, async {}));
        time::sleep(Duration::from_millis(200)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn sessions_are_created_and_ended() {
        let manager = manager(1800);
        let session = manager.create_session();
        assert!(session.id().starts_with("ses_"));
        assert_eq!(manager.session_count(), 1);
        assert!(manager.get(session.id()).is_ok());

        manager.end_session(session.id()).unwrap();
        assert_eq!(manager.session_count(), 0);
        assert!(matches!(
            manager.get(session.id()),
            Err(ConciergeError::UnknownSession(id)) if id == session.id()
        ));
        assert!(manager.end_session(session.id()).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_sessions_are_reaped() {
        let manager = manager(60);
        let stale = manager.create_session();
        time::advance(Duration::from_secs(45)).await;
        let fresh = manager.create_session();
        time::advance(Duration::from_secs(30)).await;

        assert_eq!(manager.reap_idle(), 1);
        assert!(manager.get(stale.id()).is_err());
        assert!(manager.get(fresh.id()).is_ok());
    }
}
