//! DMA display pipeline
//!
//! Streams pixel buffers into the display controller's RAM write. Two
//! transfers can be outstanding: the one DMA is draining and one queued
//! behind it, started straight from the completion interrupt so the
//! controller never waits on the main loop between buffers.
//!
//! The pipeline is shared between the main loop and the DMA interrupt,
//! so it is meant to live in a `static`:
//!
//! ```ignore
//! static DISPLAY: DisplayPipeline<Panel> =
//!     DisplayPipeline::new(St7789::spi0(0), Rect::wh(320, 240), RefreshDirection::ColumnFirst);
//!
//! #[interrupt]
//! unsafe fn DMA_IRQ_1() {
//!     DISPLAY.on_interrupt();
//! }
//! ```

use core::cell::RefCell;

use cadence_hal::{DisplayDriver, Pixel, Rect, RefreshDirection, Yield};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::Vec;
use portable_atomic::{AtomicBool, AtomicU32, Ordering};

use crate::backend::DisplayBackend;

/// Pixel buffer handed to the pipeline by value
pub type Buffer = &'static mut [Pixel];

/// Completion callback, invoked from interrupt context
pub type Callback = fn();

/// Number of completed buffers the pipeline holds until reclaimed
pub const MAX_BUFFERS: usize = 4;

/// Controller mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Accepting configuration commands
    Command,
    /// RAM write open, pixels flowing through DMA
    Streaming,
}

struct Transfer {
    buffer: Buffer,
    count: usize,
    on_complete: Option<Callback>,
}

impl Transfer {
    fn pixels(&self) -> &[Pixel] {
        &self.buffer[..self.count]
    }
}

struct Inner<D> {
    driver: D,
    mode: Mode,
    region: Rect,
    direction: RefreshDirection,
    in_flight: Option<Transfer>,
    queued: Option<Transfer>,
    free: Vec<Buffer, MAX_BUFFERS>,
    completed: u32,
}

/// Interrupt-driven DMA display pipeline
pub struct DisplayPipeline<D: DisplayDriver> {
    inner: Mutex<CriticalSectionRawMutex, RefCell<Inner<D>>>,
    busy: AtomicU32,
    /// A completion callback is running
    in_callback: AtomicBool,
}

impl<D: DisplayDriver> DisplayPipeline<D> {
    /// Create a pipeline in command mode
    ///
    /// Nothing is sent to the controller until [`init`](Self::init).
    pub const fn new(driver: D, region: Rect, direction: RefreshDirection) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Inner {
                driver,
                mode: Mode::Command,
                region,
                direction,
                in_flight: None,
                queued: None,
                free: Vec::new(),
                completed: 0,
            })),
            busy: AtomicU32::new(0),
            in_callback: AtomicBool::new(false),
        }
    }

    /// Program the initial refresh direction and update region
    pub fn init(&self) {
        self.inner.lock(|cell| {
            let inner = &mut *cell.borrow_mut();
            inner.driver.set_refresh_direction(inner.direction);
            inner.driver.set_update_region(inner.region, inner.direction);
        });
    }

    /// Run `f` with exclusive access to the display driver
    pub fn with_driver<R>(&self, f: impl FnOnce(&mut D) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut().driver))
    }

    /// Current controller mode
    pub fn mode(&self) -> Mode {
        self.inner.lock(|cell| cell.borrow().mode)
    }

    /// Whether a DMA transfer is currently running
    pub fn in_flight(&self) -> bool {
        self.inner.lock(|cell| cell.borrow().in_flight.is_some())
    }

    /// Total number of transfers completed since creation
    pub fn completed_transfers(&self) -> u32 {
        self.inner.lock(|cell| cell.borrow().completed)
    }

    /// Number of outstanding transfers
    pub fn outstanding(&self) -> u32 {
        self.busy.load(Ordering::Acquire)
    }

    /// Queue `count` pixels of `buffer` for transfer
    ///
    /// Opens the RAM write if the controller is in command mode. If a
    /// transfer is already running the buffer is queued behind it; if
    /// the queue slot is also taken this spins until the running
    /// transfer completes.
    ///
    /// A completion callback may queue at most one buffer: the running
    /// transfer cannot complete while its own interrupt is being handled,
    /// so a second submission from the callback would spin forever.
    ///
    /// # Panics
    ///
    /// If `count` exceeds the buffer length, or (debug builds) if a
    /// completion callback submits while the queue slot is taken.
    pub fn submit(&self, buffer: Buffer, count: usize, on_complete: Option<Callback>) {
        assert!(count <= buffer.len(), "pixel count exceeds buffer");

        let mut transfer = Some(Transfer {
            buffer,
            count,
            on_complete,
        });

        while let Some(t) = transfer.take() {
            transfer = self.inner.lock(|cell| {
                let inner = &mut *cell.borrow_mut();

                if inner.queued.is_some() {
                    return Some(t);
                }

                if inner.mode == Mode::Command {
                    trace!("display: streaming");
                    inner.driver.begin_write();
                    inner.mode = Mode::Streaming;
                }

                // Counted before DMA can complete and decrement
                self.busy.fetch_add(1, Ordering::AcqRel);

                if inner.in_flight.is_none() {
                    inner.driver.start_transfer(t.pixels());
                    inner.in_flight = Some(t);
                } else {
                    inner.queued = Some(t);
                }
                None
            });

            if transfer.is_some() {
                debug_assert!(
                    !self.in_callback.load(Ordering::Acquire),
                    "completion callback queued more than one buffer"
                );
                core::hint::spin_loop();
            }
        }
    }

    /// Take back a buffer whose transfer has completed
    pub fn reclaim(&self) -> Option<Buffer> {
        self.inner.lock(|cell| cell.borrow_mut().free.pop())
    }

    /// Whether any submitted transfer has not completed yet
    pub fn busy(&self) -> bool {
        self.outstanding() != 0
    }

    /// DMA completion interrupt handler
    ///
    /// Starts the queued transfer (if any), invokes the completed
    /// transfer's callback and only then marks it complete in the busy
    /// counter, so a callback that submits the next buffer keeps the
    /// pipeline continuously busy.
    pub fn on_interrupt(&self) {
        let finished = self.inner.lock(|cell| {
            let inner = &mut *cell.borrow_mut();

            if !inner.driver.acknowledge() {
                return None;
            }

            let Some(done) = inner.in_flight.take() else {
                warn!("display: spurious DMA completion");
                return None;
            };

            if let Some(next) = inner.queued.take() {
                inner.driver.start_transfer(next.pixels());
                inner.in_flight = Some(next);
            }

            inner.completed = inner.completed.wrapping_add(1);
            if inner.free.push(done.buffer).is_err() {
                warn!("display: completed buffers not reclaimed");
            }

            Some(done.on_complete)
        });

        let Some(on_complete) = finished else {
            return;
        };

        if let Some(callback) = on_complete {
            self.in_callback.store(true, Ordering::Release);
            callback();
            self.in_callback.store(false, Ordering::Release);
        }

        self.busy.fetch_sub(1, Ordering::AcqRel);
    }

    /// Leave streaming mode, waiting for outstanding transfers first
    fn enter_command_mode(&self, y: &mut dyn Yield) {
        self.wait_idle(y);

        self.inner.lock(|cell| {
            let inner = &mut *cell.borrow_mut();
            if inner.mode == Mode::Streaming {
                trace!("display: command mode");
                inner.driver.end_write();
                inner.mode = Mode::Command;
            }
        });
    }

    /// Yield until every submitted transfer has completed
    pub fn wait_idle(&self, y: &mut dyn Yield) {
        while self.busy() {
            y.yield_now();
        }
    }

    /// Reprogram the update region
    pub fn set_update_region(&self, region: Rect, y: &mut dyn Yield) {
        self.enter_command_mode(y);

        self.inner.lock(|cell| {
            let inner = &mut *cell.borrow_mut();
            inner.driver.set_update_region(region, inner.direction);
            inner.region = region;
        });
    }

    /// Reprogram the refresh direction
    ///
    /// The update region is reprogrammed too, since its mapping onto
    /// the controller's address ranges depends on the direction.
    pub fn set_refresh_direction(&self, direction: RefreshDirection, y: &mut dyn Yield) {
        self.enter_command_mode(y);

        self.inner.lock(|cell| {
            let inner = &mut *cell.borrow_mut();
            inner.driver.set_refresh_direction(direction);
            inner.driver.set_update_region(inner.region, direction);
            inner.direction = direction;
        });
    }

    pub fn update_region(&self) -> Rect {
        self.inner.lock(|cell| cell.borrow().region)
    }

    pub fn refresh_direction(&self) -> RefreshDirection {
        self.inner.lock(|cell| cell.borrow().direction)
    }

    fn tearing(&self) -> bool {
        self.inner.lock(|cell| cell.borrow().driver.tearing())
    }

    /// Yield until the start of the next blanking interval
    ///
    /// If the controller is already blanking, waits for that interval to
    /// end first so the caller gets a full blanking period.
    pub fn wait_vsync(&self, y: &mut dyn Yield) {
        while self.tearing() {
            y.yield_now();
        }
        while !self.tearing() {
            y.yield_now();
        }
    }
}

impl<D: DisplayDriver> DisplayBackend for DisplayPipeline<D> {
    fn set_update_region(&self, region: Rect, y: &mut dyn Yield) {
        DisplayPipeline::set_update_region(self, region, y)
    }

    fn set_refresh_direction(&self, direction: RefreshDirection, y: &mut dyn Yield) {
        DisplayPipeline::set_refresh_direction(self, direction, y)
    }

    fn update_region(&self) -> Rect {
        DisplayPipeline::update_region(self)
    }

    fn refresh_direction(&self) -> RefreshDirection {
        DisplayPipeline::refresh_direction(self)
    }

    fn submit(&self, buffer: Buffer, count: usize, on_complete: Option<Callback>) {
        DisplayPipeline::submit(self, buffer, count, on_complete)
    }

    fn reclaim(&self) -> Option<Buffer> {
        DisplayPipeline::reclaim(self)
    }

    fn busy(&self) -> bool {
        DisplayPipeline::busy(self)
    }

    fn wait_vsync(&self, y: &mut dyn Yield) {
        DisplayPipeline::wait_vsync(self, y)
    }

    fn wait_idle(&self, y: &mut dyn Yield) {
        DisplayPipeline::wait_idle(self, y)
    }
}
