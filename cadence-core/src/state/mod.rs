//! Application lifecycle state machine
//!
//! Every application on the runtime's stack is in exactly one lifecycle
//! state. Only the top of the stack can be `Focusing`, `Running` or
//! `Blurring`; everything below it is `Suspended`.

pub mod events;
pub mod machine;

pub use events::Event;
pub use machine::Lifecycle;
