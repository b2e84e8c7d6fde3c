//! Transaction and response types

use cadence_hal::i2c::{Cause, FIFO_DEPTH};
use heapless::Vec;

/// Maximum bytes written by one transaction (controller FIFO depth)
pub const MAX_WRITE_LEN: usize = FIFO_DEPTH;

/// Maximum bytes read by one transaction (controller FIFO depth)
pub const MAX_READ_LEN: usize = FIFO_DEPTH;

/// Completion callback, invoked from the bus interrupt
pub type Callback = fn(&Response);

/// Result of a completed transaction as seen by its callback
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Response {
    address: u8,
    cause: Cause,
    bytes: Vec<u8, MAX_READ_LEN>,
}

impl Response {
    pub(crate) fn new(address: u8, cause: Cause, bytes: Vec<u8, MAX_READ_LEN>) -> Self {
        Self {
            address,
            cause,
            bytes,
        }
    }

    /// Target address of the transaction
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Why the controller reported completion
    pub fn cause(&self) -> Cause {
        self.cause
    }

    /// Number of bytes the controller held for reading at completion
    ///
    /// An aborted transaction may report any count here; check
    /// [`cause`](Self::cause) to tell the two apart.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Received bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Copy received bytes into `dest`, returning how many were copied
    pub fn copy_to(&self, dest: &mut [u8]) -> usize {
        let n = self.bytes.len().min(dest.len());
        dest[..n].copy_from_slice(&self.bytes[..n]);
        n
    }
}

/// How the queue reports completion of a transaction
#[derive(Debug, Clone, Copy)]
pub(crate) enum Completion {
    /// Invoke the callback (if any) and release the slot
    Callback(Option<Callback>),
    /// Keep the response in the slot for the waiting caller
    Blocking,
}

/// One queued bus exchange
#[derive(Debug, Clone)]
pub(crate) struct Transaction {
    pub address: u8,
    pub write: Vec<u8, MAX_WRITE_LEN>,
    pub read_len: usize,
    pub completion: Completion,
}

impl Transaction {
    /// # Panics
    ///
    /// If `write` or `read_len` exceed the controller FIFO depth.
    pub fn new(address: u8, write: &[u8], read_len: usize, completion: Completion) -> Self {
        assert!(write.len() <= MAX_WRITE_LEN, "I2C write exceeds FIFO depth");
        assert!(read_len <= MAX_READ_LEN, "I2C read exceeds FIFO depth");

        let mut bytes = Vec::new();
        // Length checked above
        let _ = bytes.extend_from_slice(write);

        Self {
            address,
            write: bytes,
            read_len,
            completion,
        }
    }
}

/// Handle on a blocking transaction's slot
///
/// The generation distinguishes this use of the slot from any earlier or
/// later transaction stored in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ticket {
    pub(crate) index: usize,
    pub(crate) generation: u16,
}
