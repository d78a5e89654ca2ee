use super::messages::{BeginEvent, StreamingError, TerminationEvent, TurnEvent};

pub type BeginHandler = Box<dyn Fn(&BeginEvent) + Send + Sync>;
pub type TurnHandler = Box<dyn Fn(&TurnEvent) + Send + Sync>;
pub type TerminationHandler = Box<dyn Fn(&TerminationEvent) + Send + Sync>;
pub type ErrorHandler = Box<dyn Fn(&StreamingError) + Send + Sync>;

/// Dispatch table for the four session lifecycle events.
///
/// Handlers are registered before the connection opens; no transcription
/// flows until then. Events for which no handler is registered are dropped
/// silently.
#[derive(Default)]
pub struct EventHandlers {
    on_begin: Option<BeginHandler>,
    on_turn: Option<TurnHandler>,
    on_termination: Option<TerminationHandler>,
    on_error: Option<ErrorHandler>,
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_begin(mut self, handler: impl Fn(&BeginEvent) + Send + Sync + 'static) -> Self {
        self.on_begin = Some(Box::new(handler));
        self
    }

    pub fn on_turn(mut self, handler: impl Fn(&TurnEvent) + Send + Sync + 'static) -> Self {
        self.on_turn = Some(Box::new(handler));
        self
    }

    pub fn on_termination(
        mut self,
        handler: impl Fn(&TerminationEvent) + Send + Sync + 'static,
    ) -> Self {
        self.on_termination = Some(Box::new(handler));
        self
    }

    pub fn on_error(mut self, handler: impl Fn(&StreamingError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(handler));
        self
    }

    pub fn dispatch_begin(&self, event: &BeginEvent) {
        if let Some(handler) = &self.on_begin {
            handler(event);
        }
    }

    pub fn dispatch_turn(&self, event: &TurnEvent) {
        if let Some(handler) = &self.on_turn {
            handler(event);
        }
    }

    pub fn dispatch_termination(&self, event: &TerminationEvent) {
        if let Some(handler) = &self.on_termination {
            handler(event);
        }
    }

    pub fn dispatch_error(&self, error: &StreamingError) {
        if let Some(handler) = &self.on_error {
            handler(error);
        }
    }
}
