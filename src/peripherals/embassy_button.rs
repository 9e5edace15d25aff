//! embassy_button.rs — runs a ButtonMonitor on an async GPIO pin and embassy-time
//!
//! `PinLine` turns any `InputPin + Wait` into an [`InputLine`],
//! `DeadlineTimers` keeps the press and hold deadlines as `embassy_time`
//! instants, and [`ButtonMonitor::run`] is the event loop joining the two.

use core::convert::Infallible;
use embassy_futures::select::{Either, select};
use embassy_time::{Duration, Instant, Timer};
use embedded_hal::digital::InputPin;
use embedded_hal_async::digital::Wait;

use crate::peripherals::button::{ButtonError, ButtonMonitor};
use crate::peripherals::input_line::{InputLine, Level, ListenMode, ListenerTable};
use crate::peripherals::timer_service::{ButtonTimer, TimerHandle, TimerService};

// ============================================================================
// PIN LINE
// ============================================================================

#[derive(Debug, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinLineError<E> {
    #[error("Failed to read input pin")]
    Pin(E),
    #[error("Line listener table is full")]
    ListenersFull,
}

/// Input line backed by an async-capable GPIO input.
///
/// Transitions are found by comparing the sampled level with the last one
/// seen, so an edge that happened while nobody was awaiting the pin is
/// still reported on the next [`PinLine::wait_transition`].
pub struct PinLine<P> {
    pin: P,
    level: Level,
    listeners: ListenerTable,
}

impl<P> PinLine<P>
where
    P: InputPin + Wait,
{
    /// Wrap `pin`. Pull configuration is up to the caller.
    pub fn new(pin: P) -> Self {
        Self {
            pin,
            level: Level::Low,
            listeners: ListenerTable::new(),
        }
    }

    /// Last level seen on the pin.
    pub fn level(&self) -> Level {
        self.level
    }

    pub fn listeners(&self) -> &ListenerTable {
        &self.listeners
    }

    pub fn into_inner(self) -> P {
        self.pin
    }

    /// Wait for the pin to settle on a level different from the last one.
    ///
    /// Pending forever while no listener is registered.
    pub async fn wait_transition(&mut self) -> Result<Level, PinLineError<P::Error>> {
        loop {
            if self.listeners.is_empty() {
                return core::future::pending().await;
            }

            let level = self.sample()?;
            if level != self.level {
                self.level = level;
                return Ok(level);
            }

            self.pin
                .wait_for_any_edge()
                .await
                .map_err(PinLineError::Pin)?;
        }
    }

    fn sample(&mut self) -> Result<Level, PinLineError<P::Error>> {
        match self.pin.is_high() {
            Ok(high) => Ok(Level::from_high(high)),
            Err(e) => {
                warn!("pin line: failed to read pin");
                Err(PinLineError::Pin(e))
            }
        }
    }
}

impl<P> InputLine for PinLine<P>
where
    P: InputPin + Wait,
{
    type Error = PinLineError<P::Error>;

    fn configure_as_input(&mut self) -> Result<(), Self::Error> {
        self.level = self.sample()?;
        Ok(())
    }

    fn listen(&mut self, level: Level, mode: ListenMode) -> Result<(), Self::Error> {
        // Transitions made while detached are not reported.
        if self.listeners.is_empty() {
            self.level = self.sample()?;
        }
        self.listeners
            .insert(level, mode)
            .map_err(|_| PinLineError::ListenersFull)
    }

    fn remove_all_listeners(&mut self) {
        self.listeners.clear();
    }

    fn dispatch(&mut self, level: Level) -> bool {
        self.listeners.dispatch(level)
    }
}

// ============================================================================
// DEADLINE TIMERS
// ============================================================================

#[derive(Copy, Clone, Debug)]
struct Deadline {
    at: Instant,
    handle: TimerHandle,
}

/// [`TimerService`] on `embassy_time`, one deadline slot per [`ButtonTimer`].
#[derive(Debug, Default)]
pub struct DeadlineTimers {
    slots: [Option<Deadline>; 2],
    generation: u32,
}

impl DeadlineTimers {
    pub const fn new() -> Self {
        Self {
            slots: [None, None],
            generation: 0,
        }
    }

    pub fn is_armed(&self, timer: ButtonTimer) -> bool {
        self.slots[timer.index()].is_some()
    }

    /// Sleep until the earliest armed deadline and disarm it.
    ///
    /// Pending forever while nothing is armed.
    pub async fn wait_next(&mut self) -> TimerHandle {
        let Some(next) = self.slots.iter().flatten().min_by_key(|d| d.at).copied() else {
            return core::future::pending().await;
        };

        Timer::at(next.at).await;
        self.slots[next.handle.timer().index()] = None;
        next.handle
    }
}

impl TimerService for DeadlineTimers {
    fn schedule(&mut self, after: Duration, timer: ButtonTimer) -> TimerHandle {
        self.generation = self.generation.wrapping_add(1);
        let handle = TimerHandle::new(timer, self.generation);
        self.slots[timer.index()] = Some(Deadline {
            at: Instant::now() + after,
            handle,
        });
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        let slot = &mut self.slots[handle.timer().index()];
        if slot.is_some_and(|d| d.handle == handle) {
            *slot = None;
        }
    }
}

// ============================================================================
// EVENT LOOP
// ============================================================================

impl<'a, P, const N: usize> ButtonMonitor<'a, PinLine<P>, DeadlineTimers, N>
where
    P: InputPin + Wait,
{
    /// Drive the monitor from the pin and the deadline timers.
    ///
    /// Only returns when reading the pin or registering a listener fails.
    pub async fn run(&mut self) -> Result<Infallible, ButtonError<PinLineError<P::Error>>> {
        info!("button monitor running");
        loop {
            let (line, timers) = self.parts_mut();
            let next = select(line.wait_transition(), timers.wait_next()).await;

            match next {
                Either::First(level) => {
                    let level = level.map_err(ButtonError::Line)?;
                    self.level_changed(level)?;
                }
                Either::Second(handle) => self.timer_fired(handle),
            }
        }
    }
}
