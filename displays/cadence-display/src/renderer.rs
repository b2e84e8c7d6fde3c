//! Column-wise double-buffered renderer
//!
//! A frame is produced one column at a time, from the last column of the
//! update region down to column 0, in the panel's native column-first
//! order. Two column buffers alternate: while DMA drains one, the next
//! column is computed into the other, so a frame costs roughly
//! `max(render, transfer)` instead of their sum.

use cadence_hal::{Pixel, Yield};
use heapless::{Deque, Vec};

use crate::backend::DisplayBackend;
use crate::pipeline::Buffer;

/// Something that can produce the pixels of one display column
pub trait ColumnSource {
    /// Fill `pixels` (top to bottom) with the contents of `column`
    fn render_column(&mut self, column: u16, pixels: &mut [Pixel]);
}

/// Double-buffered column renderer
pub struct ColumnRenderer {
    /// Buffers owned by the renderer and free for rendering
    idle: Vec<Buffer, 2>,
    /// Rendered columns waiting for the first submission of the frame
    ready: Deque<Buffer, 2>,
    /// Next column to render while streaming
    next: Option<u16>,
    /// Pixels per column of the prepared frame
    height: usize,
    wait_vsync: bool,
    /// The tearing signal was already awaited for the prepared frame
    synced: bool,
}

impl ColumnRenderer {
    /// Create a renderer owning both column buffers
    ///
    /// # Arguments
    ///
    /// * `front`, `back` - Column buffers, at least one column tall
    /// * `wait_vsync` - Wait for the tearing signal before the first
    ///   submission of each frame
    pub fn new(front: Buffer, back: Buffer, wait_vsync: bool) -> Self {
        let mut idle = Vec::new();
        let _ = idle.push(front);
        let _ = idle.push(back);
        Self {
            idle,
            ready: Deque::new(),
            next: None,
            height: 0,
            wait_vsync,
            synced: false,
        }
    }

    /// Whether a prepared frame is waiting to be streamed
    pub fn is_prepared(&self) -> bool {
        !self.ready.is_empty() || self.next.is_some()
    }

    fn take_back(&mut self, buffer: Buffer) {
        if self.idle.push(buffer).is_err() {
            warn!("renderer: more than two column buffers in circulation");
        }
    }

    fn render<S: ColumnSource + ?Sized>(&self, source: &mut S, column: u16, buffer: &mut [Pixel]) {
        assert!(self.height <= buffer.len(), "column taller than buffer");
        source.render_column(column, &mut buffer[..self.height]);
    }

    /// Render the last two columns of the update region
    ///
    /// Called once the display is idle; collects every buffer back from
    /// the display first.
    pub fn prepare<S: ColumnSource + ?Sized>(&mut self, source: &mut S, display: &dyn DisplayBackend) {
        while let Some(buffer) = self.ready.pop_front() {
            self.take_back(buffer);
        }
        while let Some(buffer) = display.reclaim() {
            self.take_back(buffer);
        }

        let region = display.update_region();
        self.height = region.height as usize;
        self.synced = false;

        let mut column = region.width.checked_sub(1);
        while let Some(c) = column {
            if self.ready.is_full() {
                break;
            }
            let Some(mut buffer) = self.idle.pop() else {
                break;
            };
            self.render(source, c, &mut buffer);
            let _ = self.ready.push_back(buffer);
            column = c.checked_sub(1);
        }
        self.next = column;
    }

    /// Wait for the tearing signal ahead of streaming the prepared frame
    ///
    /// No-op unless the renderer was built with `wait_vsync` and a frame is
    /// prepared. The following [`stream`](Self::stream) then submits
    /// without waiting again.
    pub fn wait_vsync(&mut self, display: &dyn DisplayBackend, y: &mut dyn Yield) {
        if self.wait_vsync && !self.synced && self.is_prepared() {
            display.wait_vsync(y);
            self.synced = true;
        }
    }

    /// Submit the prepared frame, rendering remaining columns as buffers free up
    ///
    /// Returns once column 0 has been submitted; the last transfers are
    /// still in flight.
    pub fn stream<S: ColumnSource + ?Sized>(
        &mut self,
        source: &mut S,
        display: &dyn DisplayBackend,
        y: &mut dyn Yield,
    ) {
        if !self.is_prepared() {
            return;
        }

        self.wait_vsync(display, y);
        self.synced = false;

        while let Some(buffer) = self.ready.pop_front() {
            display.submit(buffer, self.height, None);
        }

        while let Some(column) = self.next {
            let mut buffer = loop {
                if let Some(b) = self.idle.pop().or_else(|| display.reclaim()) {
                    break b;
                }
                y.yield_now();
            };
            self.render(source, column, &mut buffer);
            display.submit(buffer, self.height, None);
            self.next = column.checked_sub(1);
        }
    }
}
