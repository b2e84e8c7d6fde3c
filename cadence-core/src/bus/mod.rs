//! I2C transaction queue
//!
//! Every chip on the shared I2C bus is reached through one
//! [`TransactionQueue`]. Transactions are bounded write-then-read
//! exchanges that complete strictly in the order they were enqueued, with
//! at most one of them programmed into the controller at a time. The
//! controller's completion interrupt finishes the in-flight transaction
//! and starts the next one without involving the main loop.

pub mod queue;
pub mod transaction;

pub use queue::{BusError, Outcome, TransactionQueue};
pub use transaction::{Callback, Response, Ticket, MAX_READ_LEN, MAX_WRITE_LEN};
