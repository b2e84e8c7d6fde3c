//! Events that trigger lifecycle transitions

/// Events that can trigger lifecycle transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// `on_focus` and the warm-up cycles have finished
    Focused,
    /// The application launched a nested application
    Launch,
    /// The nested application exited
    Resume,
    /// The application asked to exit
    Exit,
}
