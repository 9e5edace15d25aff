#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use darkpicobutton::{
    ButtonConfig, ButtonError, ButtonEvent, ButtonMonitor, InputLine, Level, ListenMode,
    ListenerTable, TimerHandle, TimerService,
};
use embassy_futures::yield_now;
use embassy_time::Duration;

// ============================================================================
// SIMULATED LINE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimLineError;

#[derive(Debug, Default)]
pub struct SimLineState {
    pub configured: bool,
    pub fail_configure: bool,
    pub fail_listen: bool,
    pub listeners: ListenerTable<8>,
    pub listen_calls: usize,
    pub remove_all_calls: usize,
}

pub struct SimLine {
    state: Rc<RefCell<SimLineState>>,
}

impl InputLine for SimLine {
    type Error = SimLineError;

    fn configure_as_input(&mut self) -> Result<(), SimLineError> {
        let mut state = self.state.borrow_mut();
        if state.fail_configure {
            return Err(SimLineError);
        }
        state.configured = true;
        Ok(())
    }

    fn listen(&mut self, level: Level, mode: ListenMode) -> Result<(), SimLineError> {
        let mut state = self.state.borrow_mut();
        if state.fail_listen {
            return Err(SimLineError);
        }
        state.listen_calls += 1;
        state.listeners.insert(level, mode).map_err(|_| SimLineError)
    }

    fn remove_all_listeners(&mut self) {
        let mut state = self.state.borrow_mut();
        state.remove_all_calls += 1;
        state.listeners.clear();
    }

    fn dispatch(&mut self, level: Level) -> bool {
        self.state.borrow_mut().listeners.dispatch(level)
    }
}

// ============================================================================
// VIRTUAL CLOCK
// ============================================================================

#[derive(Debug, Default)]
pub struct VirtualClock {
    pub now_ms: u64,
    pub pending: Vec<(u64, TimerHandle)>,
    pub scheduled: usize,
    generation: u32,
}

impl VirtualClock {
    /// Removes the earliest deadline at or before `t` and moves the clock to it.
    fn pop_due(&mut self, t: u64) -> Option<TimerHandle> {
        let (index, &(at, handle)) = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, (at, _))| *at <= t)
            .min_by_key(|(_, (at, _))| *at)?;
        self.pending.remove(index);
        self.now_ms = at;
        Some(handle)
    }
}

pub struct SimTimers {
    clock: Rc<RefCell<VirtualClock>>,
}

impl TimerService for SimTimers {
    fn schedule(&mut self, after: Duration, timer: darkpicobutton::ButtonTimer) -> TimerHandle {
        let mut clock = self.clock.borrow_mut();
        clock.generation += 1;
        clock.scheduled += 1;
        let handle = TimerHandle::new(timer, clock.generation);
        let at = clock.now_ms + after.as_millis();
        clock.pending.push((at, handle));
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.clock.borrow_mut().pending.retain(|&(_, h)| h != handle);
    }
}

// ============================================================================
// BENCH
// ============================================================================

pub type SimMonitor<'a, const N: usize = 8> = ButtonMonitor<'a, SimLine, SimTimers, N>;

/// Shared state behind a simulated line and clock, kept outside the monitor
/// so tests can inspect it.
#[derive(Default)]
pub struct Bench {
    pub line: Rc<RefCell<SimLineState>>,
    pub clock: Rc<RefCell<VirtualClock>>,
    pub events: RefCell<Vec<(u64, ButtonEvent)>>,
}

impl Bench {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn monitor<'a, const N: usize>(
        &self,
        config: ButtonConfig,
    ) -> Result<SimMonitor<'a, N>, ButtonError<SimLineError>> {
        ButtonMonitor::new(
            SimLine {
                state: self.line.clone(),
            },
            SimTimers {
                clock: self.clock.clone(),
            },
            config,
        )
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.borrow().now_ms
    }

    pub fn record(&self, event: ButtonEvent) {
        let now = self.now_ms();
        self.events.borrow_mut().push((now, event));
    }

    pub fn events(&self) -> Vec<(u64, ButtonEvent)> {
        self.events.borrow().clone()
    }

    pub fn kinds(&self) -> Vec<ButtonEvent> {
        self.events.borrow().iter().map(|&(_, e)| e).collect()
    }

    pub fn pending_timers(&self) -> usize {
        self.clock.borrow().pending.len()
    }

    pub fn line_listeners(&self) -> usize {
        self.line.borrow().listeners.len()
    }

    /// Fire every timer due up to `t`, in deadline order, then move the clock to `t`.
    pub fn advance_to<const N: usize>(&self, monitor: &mut SimMonitor<'_, N>, t: u64) {
        loop {
            let due = self.clock.borrow_mut().pop_due(t);
            match due {
                Some(handle) => monitor.timer_fired(handle),
                None => break,
            }
        }
        self.clock.borrow_mut().now_ms = t;
    }

    /// Advance to `t` and report a transition to `level` on the line.
    pub fn set_level<const N: usize>(
        &self,
        monitor: &mut SimMonitor<'_, N>,
        t: u64,
        level: Level,
    ) -> Result<(), ButtonError<SimLineError>> {
        self.advance_to(monitor, t);
        monitor.level_changed(level)
    }
}

// ============================================================================
// MOCK PIN
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockPinError;

impl embedded_hal::digital::Error for MockPinError {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}

/// GPIO input whose level is set from the test through shared cells.
#[derive(Clone, Default)]
pub struct MockPin {
    pub high: Rc<Cell<bool>>,
    pub broken: Rc<Cell<bool>>,
}

impl MockPin {
    pub fn new(high: bool) -> Self {
        let pin = Self::default();
        pin.high.set(high);
        pin
    }

    fn read(&self) -> Result<bool, MockPinError> {
        if self.broken.get() {
            Err(MockPinError)
        } else {
            Ok(self.high.get())
        }
    }

    async fn wait_until(&self, high: bool) -> Result<(), MockPinError> {
        while self.read()? != high {
            yield_now().await;
        }
        Ok(())
    }
}

impl embedded_hal::digital::ErrorType for MockPin {
    type Error = MockPinError;
}

impl embedded_hal::digital::InputPin for MockPin {
    fn is_high(&mut self) -> Result<bool, MockPinError> {
        self.read()
    }

    fn is_low(&mut self) -> Result<bool, MockPinError> {
        self.read().map(|high| !high)
    }
}

impl embedded_hal_async::digital::Wait for MockPin {
    async fn wait_for_high(&mut self) -> Result<(), MockPinError> {
        self.wait_until(true).await
    }

    async fn wait_for_low(&mut self) -> Result<(), MockPinError> {
        self.wait_until(false).await
    }

    async fn wait_for_rising_edge(&mut self) -> Result<(), MockPinError> {
        self.wait_until(false).await?;
        self.wait_until(true).await
    }

    async fn wait_for_falling_edge(&mut self) -> Result<(), MockPinError> {
        self.wait_until(true).await?;
        self.wait_until(false).await
    }

    async fn wait_for_any_edge(&mut self) -> Result<(), MockPinError> {
        let start = self.read()?;
        self.wait_until(!start).await
    }
}
