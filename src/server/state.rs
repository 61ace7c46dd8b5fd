use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

use super::events::ViewEvent;
use crate::interaction::InteractionState;
use crate::scene::Scene;
use crate::settings::Settings;
use crate::tooltip::TooltipPresenter;

/// Mutable per-session state. One lock covers both so every event is
/// applied whole before the next one starts.
#[derive(Debug)]
pub struct Session {
    pub interaction: InteractionState,
    pub tooltip: TooltipPresenter,
}

// Application state shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub scene: Arc<Scene>,
    pub session: Arc<Mutex<Session>>,
    pub settings: Arc<Settings>,
    pub event_sender: broadcast::Sender<ViewEvent>,
}

impl AppState {
    pub fn new(scene: Scene, settings: Settings) -> Self {
        let (event_sender, _) = broadcast::channel(100);
        let session = Session {
            interaction: InteractionState::new(scene.viewport),
            tooltip: TooltipPresenter::default(),
        };
        Self {
            scene: Arc::new(scene),
            session: Arc::new(Mutex::new(session)),
            settings: Arc::new(settings),
            event_sender,
        }
    }

    /// Session state stays consistent even if a handler panicked while
    /// holding the lock, since every mutation replaces whole values.
    pub fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn image_dir(&self) -> PathBuf {
        PathBuf::from(&self.settings.image_dir)
    }

    /// Publishes to connected viewers. Having no subscribers is fine.
    pub fn publish(&self, event: ViewEvent) {
        let _ = self.event_sender.send(event);
    }
}
