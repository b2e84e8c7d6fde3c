//! Lifecycle state definition

use super::events::Event;

/// Lifecycle of one application on the runtime stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Lifecycle {
    /// `on_focus` and warm-up updates in progress, nothing rendered yet
    Focusing,
    /// Frame loop running
    Running,
    /// A nested application is on top of this one
    Suspended,
    /// Exit requested; the frame loop ends after the current phase
    Blurring,
}

impl Lifecycle {
    /// Whether the frame loop should keep iterating
    pub fn is_running(&self) -> bool {
        matches!(self, Lifecycle::Running)
    }

    /// Whether this application owns the display and input
    pub fn is_active(&self) -> bool {
        matches!(self, Lifecycle::Focusing | Lifecycle::Running)
    }

    /// Process an event and return the next state
    pub fn transition(self, event: Event) -> Self {
        use Event::*;
        use Lifecycle::*;

        match (self, event) {
            (Focusing, Focused) => Running,
            (Focusing, Exit) => Blurring,

            (Running, Launch) => Suspended,
            (Running, Exit) => Blurring,

            (Suspended, Resume) => Running,

            // Default: stay in current state
            _ => self,
        }
    }
}
