//! Runtime object driving the application stack
//!
//! The runtime owns the stack of running applications and the column
//! renderer, and borrows the platform services and the display backend.
//! It is passed by reference into every application hook, so nested
//! applications are launched through the same object.

use cadence_display::{ColumnRenderer, DisplayBackend};
use cadence_hal::{Rect, RefreshDirection};
use heapless::Vec;

use super::{App, Platform};
use crate::config::{SchedulerConfig, MAX_NESTED_APPS};
use crate::state::{Event, Lifecycle};
use crate::timing::{elapsed_us, FpsCounter, PhaseTimings};

/// Scheduler errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RuntimeError {
    /// The application stack already holds `MAX_NESTED_APPS` entries
    NestingTooDeep,
}

#[derive(Debug, Clone, Copy)]
struct StackEntry {
    id: u16,
    state: Lifecycle,
    /// Display state to restore when this entry resumes
    region: Rect,
    direction: RefreshDirection,
}

/// Frame scheduler runtime
pub struct Runtime<'a> {
    platform: &'a mut dyn Platform,
    display: &'a dyn DisplayBackend,
    renderer: ColumnRenderer,
    stack: Vec<StackEntry, MAX_NESTED_APPS>,
    next_id: u16,
    fps: FpsCounter,
    timings: PhaseTimings,
    config: SchedulerConfig,
}

impl<'a> Runtime<'a> {
    /// Create a runtime with an empty application stack
    ///
    /// # Arguments
    ///
    /// * `platform` - Clock, cooperative yield, input and heartbeat
    /// * `display` - Display pipeline shared with the DMA interrupt
    /// * `renderer` - Column renderer owning both column buffers
    /// * `config` - Scheduler configuration
    pub fn new(
        platform: &'a mut dyn Platform,
        display: &'a dyn DisplayBackend,
        renderer: ColumnRenderer,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            platform,
            display,
            renderer,
            stack: Vec::new(),
            next_id: 0,
            fps: FpsCounter::new(),
            timings: PhaseTimings::default(),
            config,
        }
    }

    /// Run `app` until it exits
    ///
    /// Called from the firmware's entry point for the root application and
    /// from an application's `update` to launch a nested one. The caller
    /// is suspended until `app` exits, then its update region and refresh
    /// direction are restored.
    pub fn run(&mut self, app: &mut dyn App) -> Result<(), RuntimeError> {
        if self.stack.is_full() {
            warn!("runtime: app stack full");
            return Err(RuntimeError::NestingTooDeep);
        }

        let region = self.display.update_region();
        let direction = self.display.refresh_direction();
        if let Some(parent) = self.stack.last_mut() {
            debug!("runtime: app {} launches nested app", parent.id);
            parent.state = parent.state.transition(Event::Launch);
            parent.region = region;
            parent.direction = direction;
        }

        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        let entry = StackEntry {
            id,
            state: Lifecycle::Focusing,
            region,
            direction,
        };
        if self.stack.push(entry).is_err() {
            return Err(RuntimeError::NestingTooDeep);
        }

        self.focus(app, id);

        while self.is_running() {
            self.frame(app);
        }

        self.blur(app, id);
        Ok(())
    }

    fn focus(&mut self, app: &mut dyn App, id: u16) {
        debug!("runtime: focus app {}", id);

        // The caller's last frame may still be transferring
        self.wait_render();
        app.on_focus(self);

        for _ in 0..self.config.warmup_cycles {
            if !self.state().is_some_and(|s| s.is_active()) {
                break;
            }
            self.update(app);
        }

        self.transition(Event::Focused);
        let now = self.platform.now_us();
        self.fps.reset(now);
    }

    fn blur(&mut self, app: &mut dyn App, id: u16) {
        self.wait_render();
        app.on_blur(self);
        self.stack.pop();
        debug!("runtime: blur app {}", id);

        let Some(parent) = self.stack.last().copied() else {
            return;
        };

        let display = self.display;
        let platform = &mut *self.platform;
        let mut y = || platform.yield_now();
        if display.refresh_direction() != parent.direction {
            display.set_refresh_direction(parent.direction, &mut y);
        }
        if display.update_region() != parent.region {
            display.set_update_region(parent.region, &mut y);
        }

        self.transition(Event::Resume);
        let now = self.platform.now_us();
        self.fps.reset(now);
    }

    /// One iteration of update, tick, wait-for-render, draw, wait-vsync, render
    fn frame(&mut self, app: &mut dyn App) {
        let start = self.platform.now_us();
        self.update(app);
        let updated = self.platform.now_us();

        // Exit requested: skip drawing, the loop ends
        if !self.is_running() {
            return;
        }

        self.platform.tick(self.fps.fps());
        let ticked = self.platform.now_us();

        self.wait_render();
        let waited = self.platform.now_us();

        app.draw(self);
        self.renderer.prepare(&mut *app, self.display);
        let drawn = self.platform.now_us();

        self.wait_vsync();
        let synced = self.platform.now_us();

        self.render(app);
        let rendered = self.platform.now_us();

        self.timings = PhaseTimings {
            update_us: elapsed_us(start, updated),
            tick_us: elapsed_us(updated, ticked),
            wait_render_us: elapsed_us(ticked, waited),
            draw_us: elapsed_us(waited, drawn),
            wait_vsync_us: elapsed_us(drawn, synced),
            render_us: elapsed_us(synced, rendered),
        };

        if let Some(fps) = self.fps.record_frame(rendered) {
            trace!("runtime: {} fps", fps);
        }
    }

    fn update(&mut self, app: &mut dyn App) {
        self.platform.poll_input();
        app.update(self);
    }

    /// Yield until the previous frame has left the display buffers
    fn wait_render(&mut self) {
        let display = self.display;
        let platform = &mut *self.platform;
        display.wait_idle(&mut || platform.yield_now());
    }

    fn wait_vsync(&mut self) {
        let display = self.display;
        let platform = &mut *self.platform;
        self.renderer
            .wait_vsync(display, &mut || platform.yield_now());
    }

    /// Stream the prepared frame; returns with the last columns in flight
    fn render(&mut self, app: &mut dyn App) {
        let display = self.display;
        let platform = &mut *self.platform;
        self.renderer
            .stream(&mut *app, display, &mut || platform.yield_now());
    }

    fn transition(&mut self, event: Event) {
        if let Some(top) = self.stack.last_mut() {
            top.state = top.state.transition(event);
        }
    }

    fn is_running(&self) -> bool {
        self.state().is_some_and(|s| s.is_running())
    }

    /// Ask the active application to exit after the current phase
    pub fn exit(&mut self) {
        self.transition(Event::Exit);
    }

    /// Lifecycle state of the active application
    pub fn state(&self) -> Option<Lifecycle> {
        self.stack.last().map(|entry| entry.state)
    }

    /// Lifecycle states of every application, root first
    pub fn states(&self) -> impl Iterator<Item = Lifecycle> + '_ {
        self.stack.iter().map(|entry| entry.state)
    }

    /// Number of applications on the stack
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Last published frames-per-second value
    pub fn fps(&self) -> u32 {
        self.fps.fps()
    }

    /// Phase durations of the last rendered frame
    pub fn timings(&self) -> PhaseTimings {
        self.timings
    }

    pub fn display(&self) -> &'a dyn DisplayBackend {
        self.display
    }

    pub fn platform(&mut self) -> &mut dyn Platform {
        &mut *self.platform
    }

    pub fn now_us(&self) -> u64 {
        self.platform.now_us()
    }

    /// Run background work once; use inside application-level waits
    pub fn yield_now(&mut self) {
        self.platform.yield_now();
    }

    /// Reprogram the display update region, waiting for the last frame
    pub fn set_update_region(&mut self, region: Rect) {
        let display = self.display;
        let platform = &mut *self.platform;
        display.set_update_region(region, &mut || platform.yield_now());
    }

    /// Reprogram the display refresh direction, waiting for the last frame
    pub fn set_refresh_direction(&mut self, direction: RefreshDirection) {
        let display = self.display;
        let platform = &mut *self.platform;
        display.set_refresh_direction(direction, &mut || platform.yield_now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_display::{Buffer, Callback, ColumnSource};
    use cadence_hal::{Clock, Pixel, Yield};
    use core::cell::{Cell, RefCell};
    use std::boxed::Box;
    use std::collections::VecDeque;
    use std::vec::Vec as StdVec;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        Focus(u8),
        Poll,
        Update(u8),
        Tick(u32),
        Draw(u8),
        Submit(Pixel),
        Complete,
        Blur(u8),
        Region(Rect),
        Direction(RefreshDirection),
    }

    type Log = RefCell<StdVec<Call>>;

    fn log(log: &Log, call: Call) {
        log.borrow_mut().push(call);
    }

    /// Everything except DMA completions, which depend on yield timing
    fn phases(log: &Log) -> StdVec<Call> {
        log.borrow()
            .iter()
            .copied()
            .filter(|c| *c != Call::Complete)
            .collect()
    }

    /// Display whose transfers complete one per platform yield
    struct FakeDisplay<'l> {
        log: &'l Log,
        region: Cell<Rect>,
        direction: Cell<RefreshDirection>,
        outstanding: RefCell<VecDeque<Buffer>>,
        done: RefCell<StdVec<Buffer>>,
    }

    impl<'l> FakeDisplay<'l> {
        fn new(log: &'l Log, region: Rect) -> Self {
            Self {
                log,
                region: Cell::new(region),
                direction: Cell::new(RefreshDirection::ColumnFirst),
                outstanding: RefCell::new(VecDeque::new()),
                done: RefCell::new(StdVec::new()),
            }
        }

        fn complete_one(&self) {
            let finished = self.outstanding.borrow_mut().pop_front();
            if let Some(buffer) = finished {
                self.done.borrow_mut().push(buffer);
                log(self.log, Call::Complete);
            }
        }
    }

    impl DisplayBackend for FakeDisplay<'_> {
        fn set_update_region(&self, region: Rect, y: &mut dyn Yield) {
            self.wait_idle(y);
            self.region.set(region);
            log(self.log, Call::Region(region));
        }

        fn set_refresh_direction(&self, direction: RefreshDirection, y: &mut dyn Yield) {
            self.wait_idle(y);
            self.direction.set(direction);
            log(self.log, Call::Direction(direction));
        }

        fn update_region(&self) -> Rect {
            self.region.get()
        }

        fn refresh_direction(&self) -> RefreshDirection {
            self.direction.get()
        }

        fn submit(&self, buffer: Buffer, count: usize, _on_complete: Option<Callback>) {
            assert!(count <= buffer.len());
            log(self.log, Call::Submit(buffer[0]));
            self.outstanding.borrow_mut().push_back(buffer);
        }

        fn reclaim(&self) -> Option<Buffer> {
            self.done.borrow_mut().pop()
        }

        fn busy(&self) -> bool {
            !self.outstanding.borrow().is_empty()
        }

        fn wait_vsync(&self, _y: &mut dyn Yield) {}
    }

    /// Clock advancing `step` µs per reading; yield completes one transfer
    struct FakePlatform<'l> {
        log: &'l Log,
        display: &'l FakeDisplay<'l>,
        now: Cell<u64>,
        step: u64,
    }

    impl Clock for FakePlatform<'_> {
        fn now_us(&self) -> u64 {
            let now = self.now.get();
            self.now.set(now + self.step);
            now
        }
    }

    impl Yield for FakePlatform<'_> {
        fn yield_now(&mut self) {
            self.display.complete_one();
        }
    }

    impl Platform for FakePlatform<'_> {
        fn poll_input(&mut self) {
            log(self.log, Call::Poll);
        }

        fn tick(&mut self, fps: u32) {
            log(self.log, Call::Tick(fps));
        }
    }

    /// Logs every hook; exits on its `exit_on`-th update (0: during focus)
    struct Recorder<'l> {
        tag: u8,
        log: &'l Log,
        region: Rect,
        direction: RefreshDirection,
        updates: u32,
        exit_on: u32,
        launch_on: u32,
        child: Option<Box<Recorder<'l>>>,
    }

    impl<'l> Recorder<'l> {
        fn new(tag: u8, log: &'l Log, exit_on: u32) -> Self {
            Self {
                tag,
                log,
                region: Rect::wh(3, 2),
                direction: RefreshDirection::ColumnFirst,
                updates: 0,
                exit_on,
                launch_on: 0,
                child: None,
            }
        }
    }

    impl ColumnSource for Recorder<'_> {
        fn render_column(&mut self, column: u16, pixels: &mut [Pixel]) {
            pixels.fill(column);
        }
    }

    impl App for Recorder<'_> {
        fn on_focus(&mut self, rt: &mut Runtime<'_>) {
            log(self.log, Call::Focus(self.tag));
            if rt.display().refresh_direction() != self.direction {
                rt.set_refresh_direction(self.direction);
            }
            rt.set_update_region(self.region);
            if self.exit_on == 0 {
                rt.exit();
            }
        }

        fn update(&mut self, rt: &mut Runtime<'_>) {
            self.updates += 1;
            log(self.log, Call::Update(self.tag));

            let depth = rt.depth();
            assert!(rt
                .states()
                .take(depth - 1)
                .all(|s| s == Lifecycle::Suspended));

            if self.updates == self.launch_on {
                if let Some(child) = self.child.as_mut() {
                    rt.run(&mut **child).unwrap();
                    assert_eq!(rt.depth(), depth);
                    assert_eq!(rt.state(), Some(Lifecycle::Running));
                    assert_eq!(rt.display().update_region(), self.region);
                    assert_eq!(rt.display().refresh_direction(), self.direction);
                }
            }
            if self.updates == self.exit_on {
                rt.exit();
            }
        }

        fn draw(&mut self, rt: &mut Runtime<'_>) {
            assert!(!rt.display().busy(), "draw while previous frame in flight");
            log(self.log, Call::Draw(self.tag));
        }

        fn on_blur(&mut self, _rt: &mut Runtime<'_>) {
            log(self.log, Call::Blur(self.tag));
        }
    }

    fn column_buffers(height: usize) -> (Buffer, Buffer) {
        (
            Box::leak(std::vec![0; height].into_boxed_slice()),
            Box::leak(std::vec![0; height].into_boxed_slice()),
        )
    }

    fn run_app(app: &mut dyn App, log: &Log) -> (Result<(), RuntimeError>, PhaseTimings) {
        run_app_with_step(app, log, 10)
    }

    fn run_app_with_step(
        app: &mut dyn App,
        log: &Log,
        step: u64,
    ) -> (Result<(), RuntimeError>, PhaseTimings) {
        let display = FakeDisplay::new(log, Rect::wh(3, 2));
        let mut platform = FakePlatform {
            log,
            display: &display,
            now: Cell::new(0),
            step,
        };
        let (front, back) = column_buffers(2);
        let renderer = ColumnRenderer::new(front, back, false);
        let mut rt = Runtime::new(
            &mut platform,
            &display,
            renderer,
            SchedulerConfig::default(),
        );

        let result = rt.run(app);
        assert_eq!(rt.depth(), 0);
        assert!(!display.busy(), "last frame left in flight");
        (result, rt.timings())
    }

    #[test]
    fn test_phase_order() {
        let log = Log::default();
        // Two warm-up updates, one full frame, exit on the next update
        let mut app = Recorder::new(0, &log, 4);

        let (result, _) = run_app(&mut app, &log);
        assert_eq!(result, Ok(()));

        use Call::*;
        assert_eq!(
            phases(&log),
            [
                Focus(0),
                Region(Rect::wh(3, 2)),
                Poll,
                Update(0),
                Poll,
                Update(0),
                Poll,
                Update(0),
                Tick(0),
                Draw(0),
                Submit(2),
                Submit(1),
                Submit(0),
                Poll,
                Update(0),
                Blur(0),
            ]
        );
    }

    #[test]
    fn test_draw_waits_for_previous_frame() {
        let log = Log::default();
        let mut app = Recorder::new(0, &log, 6);

        run_app(&mut app, &log);

        let calls = log.borrow();
        let mut submitted = 0;
        let mut completed = 0;
        let mut draws = 0;
        for call in calls.iter() {
            match call {
                Call::Submit(_) => submitted += 1,
                Call::Complete => completed += 1,
                Call::Draw(_) => {
                    draws += 1;
                    assert_eq!(submitted, completed);
                }
                _ => {}
            }
        }
        assert_eq!(draws, 3);
        assert_eq!(submitted, 9);
        assert_eq!(completed, 9);
    }

    #[test]
    fn test_phase_timings() {
        let log = Log::default();
        let mut app = Recorder::new(0, &log, 5);

        let (_, timings) = run_app(&mut app, &log);

        assert_eq!(
            timings,
            PhaseTimings {
                update_us: 10,
                tick_us: 10,
                wait_render_us: 10,
                draw_us: 10,
                wait_vsync_us: 10,
                render_us: 10,
            }
        );
    }

    #[test]
    fn test_tick_receives_published_fps() {
        let log = Log::default();
        // Two warm-up updates, three frames of 700 ms each
        let mut app = Recorder::new(0, &log, 6);

        run_app_with_step(&mut app, &log, 100_000);

        let ticks: StdVec<Call> = log
            .borrow()
            .iter()
            .copied()
            .filter(|c| matches!(c, Call::Tick(_)))
            .collect();
        assert_eq!(ticks, [Call::Tick(0), Call::Tick(0), Call::Tick(2)]);
    }

    #[test]
    fn test_exit_during_focus_skips_frames() {
        let log = Log::default();
        let mut app = Recorder::new(0, &log, 0);

        run_app(&mut app, &log);

        assert_eq!(
            phases(&log),
            [Call::Focus(0), Call::Region(Rect::wh(3, 2)), Call::Blur(0)]
        );
    }

    #[test]
    fn test_nested_app_restores_parent() {
        let log = Log::default();
        let mut child = Recorder::new(1, &log, 3);
        child.region = Rect::wh(2, 2);
        child.direction = RefreshDirection::RowFirst;

        let mut parent = Recorder::new(0, &log, 4);
        parent.launch_on = 3;
        parent.child = Some(Box::new(child));

        let (result, _) = run_app(&mut parent, &log);
        assert_eq!(result, Ok(()));

        use Call::*;
        let calls = phases(&log);
        assert_eq!(
            &calls[..20],
            [
                Focus(0),
                Region(Rect::wh(3, 2)),
                Poll,
                Update(0),
                Poll,
                Update(0),
                Poll,
                Update(0),
                // Nested launch from the parent's first frame
                Focus(1),
                Direction(RefreshDirection::RowFirst),
                Region(Rect::wh(2, 2)),
                Poll,
                Update(1),
                Poll,
                Update(1),
                Poll,
                Update(1),
                Blur(1),
                Direction(RefreshDirection::ColumnFirst),
                Region(Rect::wh(3, 2)),
            ]
        );
        // Parent finishes the frame it launched from
        assert_eq!(
            &calls[20..],
            [
                Tick(0),
                Draw(0),
                Submit(2),
                Submit(1),
                Submit(0),
                Poll,
                Update(0),
                Blur(0)
            ]
        );
    }

    /// Launches a copy of itself on its first frame until the stack is full
    struct Deep<'l> {
        errors: &'l Cell<u32>,
        max_depth: &'l Cell<usize>,
    }

    impl ColumnSource for Deep<'_> {
        fn render_column(&mut self, _column: u16, _pixels: &mut [Pixel]) {}
    }

    impl App for Deep<'_> {
        fn update(&mut self, rt: &mut Runtime<'_>) {
            if rt.state() != Some(Lifecycle::Running) {
                return;
            }
            self.max_depth.set(self.max_depth.get().max(rt.depth()));

            let mut nested = Deep {
                errors: self.errors,
                max_depth: self.max_depth,
            };
            if rt.run(&mut nested) == Err(RuntimeError::NestingTooDeep) {
                self.errors.set(self.errors.get() + 1);
            }
            rt.exit();
        }
    }

    #[test]
    fn test_nesting_too_deep() {
        let log = Log::default();
        let errors = Cell::new(0);
        let max_depth = Cell::new(0);
        let mut app = Deep {
            errors: &errors,
            max_depth: &max_depth,
        };

        let (result, _) = run_app(&mut app, &log);

        assert_eq!(result, Ok(()));
        assert_eq!(max_depth.get(), MAX_NESTED_APPS);
        assert_eq!(errors.get(), 1);
    }
}
