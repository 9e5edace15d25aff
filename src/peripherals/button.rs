//! button.rs — push-button monitor turning pin transitions into press / hold / release events
//!
//! The monitor never owns a callback on the line or the timer service. The
//! event loop driving it reports electrical transitions through
//! [`ButtonMonitor::level_changed`] and expired deadlines through
//! [`ButtonMonitor::timer_fired`]; the monitor answers by registering line
//! listeners, arming timers and calling subscribed handlers.
//!
//! # Example
//!
//! ```ignore
//! let on_press = |_| info!("pressed");
//! let mut button = ButtonMonitor::<_, _, 4>::new(
//!     PinLine::new(pin),
//!     DeadlineTimers::new(),
//!     ButtonConfig::new(false),
//! )?;
//! let press = button.on(ButtonEvent::Press, &on_press)?;
//! button.run().await?;
//! ```

use embassy_time::Duration;
use heapless::Vec;

use crate::peripherals::input_line::{InputLine, Level, ListenMode};
use crate::peripherals::timer_service::{ButtonTimer, TimerHandle, TimerService};

pub const DEFAULT_PRESS_PERIOD: Duration = Duration::from_millis(50);
pub const DEFAULT_HOLD_PERIOD: Duration = Duration::from_millis(1000);

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Button timing and polarity, fixed for the lifetime of a monitor.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonConfig {
    /// High level means pressed. Wire to GND with a pull-up for `false`.
    pub active_high: bool,

    /// How long the press level must last before `Press` fires.
    pub press_period: Duration,

    /// How long the press level must last before `Hold` fires.
    pub hold_period: Duration,
}

impl ButtonConfig {
    pub const fn new(active_high: bool) -> Self {
        Self {
            active_high,
            press_period: DEFAULT_PRESS_PERIOD,
            hold_period: DEFAULT_HOLD_PERIOD,
        }
    }

    pub const fn with_press_period(mut self, press_period: Duration) -> Self {
        self.press_period = press_period;
        self
    }

    pub const fn with_hold_period(mut self, hold_period: Duration) -> Self {
        self.hold_period = hold_period;
        self
    }

    /// Level the line sits at while the button is pressed.
    pub const fn press_level(&self) -> Level {
        Level::from_high(self.active_high)
    }

    pub const fn release_level(&self) -> Level {
        Level::from_high(!self.active_high)
    }
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self::new(true)
    }
}

// ============================================================================
// EVENTS & ERRORS
// ============================================================================

/// Semantic button events.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonEvent {
    /// Held for at least the press period.
    Press,
    /// Held for at least the hold period.
    Hold,
    /// Let go, whatever the duration.
    Release,
}

/// Event handler. Handlers get the event that triggered them, so one
/// closure can serve several kinds.
pub type Handler<'a> = &'a dyn Fn(ButtonEvent);

/// Ticket returned by [`ButtonMonitor::on`] and [`ButtonMonitor::once`],
/// used to unsubscribe that one registration.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SubscriptionId(u32);

#[derive(Debug, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonError<E> {
    #[error("Input line error")]
    Line(E),
    #[error("Listener table is full")]
    ListenersFull,
}

// ============================================================================
// MONITOR
// ============================================================================

struct Subscription<'a> {
    id: SubscriptionId,
    event: ButtonEvent,
    handler: Handler<'a>,
    once: bool,
}

/// State of the current press cycle. A `None` timer slot has already fired.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum PressCycle {
    Idle,
    Pressed {
        press: Option<TimerHandle>,
        hold: Option<TimerHandle>,
    },
}

/// Push-button monitor with up to `N` subscriptions.
///
/// The monitor only listens on the line while it has subscribers: the
/// first subscription registers a press-level listener, removing the last
/// one strips every listener from the line again.
pub struct ButtonMonitor<'a, L, T, const N: usize = 4> {
    line: L,
    timers: T,
    config: ButtonConfig,
    subscriptions: Vec<Subscription<'a>, N>,
    next_id: u32,
    cycle: PressCycle,
}

impl<'a, L, T, const N: usize> ButtonMonitor<'a, L, T, N>
where
    L: InputLine,
    T: TimerService,
{
    /// Create a monitor on `line`, configuring it as an input.
    pub fn new(
        mut line: L,
        timers: T,
        config: ButtonConfig,
    ) -> Result<Self, ButtonError<L::Error>> {
        line.configure_as_input().map_err(ButtonError::Line)?;
        debug!(
            "button monitor: press level {:?}, press {} ms, hold {} ms",
            config.press_level(),
            config.press_period.as_millis(),
            config.hold_period.as_millis()
        );

        Ok(Self {
            line,
            timers,
            config,
            subscriptions: Vec::new(),
            next_id: 0,
            cycle: PressCycle::Idle,
        })
    }

    pub fn config(&self) -> &ButtonConfig {
        &self.config
    }

    /// Subscribe `handler` to `event`.
    ///
    /// Every call makes a separate registration, even for a handler that is
    /// already subscribed.
    pub fn on(
        &mut self,
        event: ButtonEvent,
        handler: Handler<'a>,
    ) -> Result<SubscriptionId, ButtonError<L::Error>> {
        self.subscribe(event, handler, false)
    }

    /// Subscribe `handler` to the next `event` only.
    pub fn once(
        &mut self,
        event: ButtonEvent,
        handler: Handler<'a>,
    ) -> Result<SubscriptionId, ButtonError<L::Error>> {
        self.subscribe(event, handler, true)
    }

    /// Remove the registration `id` for `event`.
    /// Returns false if `id` is not subscribed to `event`.
    pub fn off(&mut self, event: ButtonEvent, id: SubscriptionId) -> bool {
        let Some(index) = self
            .subscriptions
            .iter()
            .position(|s| s.event == event && s.id == id)
        else {
            return false;
        };

        self.subscriptions.remove(index);
        if self.subscriptions.is_empty() {
            self.detach();
        }
        true
    }

    /// Remove every subscription, or only those for `event`.
    pub fn remove_all_listeners(&mut self, event: Option<ButtonEvent>) {
        let before = self.subscriptions.len();
        match event {
            Some(event) => self.subscriptions.retain(|s| s.event != event),
            None => self.subscriptions.clear(),
        }
        if before > 0 && self.subscriptions.is_empty() {
            self.detach();
        }
    }

    /// Total number of subscriptions across all events.
    pub fn listener_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn listener_count_for(&self, event: ButtonEvent) -> usize {
        self.subscriptions.iter().filter(|s| s.event == event).count()
    }

    /// True while the monitor holds a listener on the line.
    pub fn is_attached(&self) -> bool {
        !self.subscriptions.is_empty()
    }

    /// True between an observed press level and the matching release.
    pub fn is_pressed(&self) -> bool {
        matches!(self.cycle, PressCycle::Pressed { .. })
    }

    /// Feed an electrical transition observed on the line.
    pub fn level_changed(&mut self, level: Level) -> Result<(), ButtonError<L::Error>> {
        if !self.line.dispatch(level) {
            trace!("button: no listener for {:?}", level);
            return Ok(());
        }

        if level == self.config.press_level() {
            self.begin_cycle()
        } else {
            self.end_cycle();
            Ok(())
        }
    }

    /// Feed an expired deadline from the timer service.
    pub fn timer_fired(&mut self, handle: TimerHandle) {
        let PressCycle::Pressed { press, hold } = &mut self.cycle else {
            trace!("button: stale {:?} timer", handle.timer());
            return;
        };

        let slot = match handle.timer() {
            ButtonTimer::Press => press,
            ButtonTimer::Hold => hold,
        };
        if *slot != Some(handle) {
            trace!("button: stale {:?} timer", handle.timer());
            return;
        }
        *slot = None;

        match handle.timer() {
            ButtonTimer::Press => self.emit(ButtonEvent::Press),
            ButtonTimer::Hold => self.emit(ButtonEvent::Hold),
        }
    }

    /// Give back the line and timer service.
    ///
    /// The line keeps whatever listeners the monitor registered; detach
    /// first with [`ButtonMonitor::remove_all_listeners`] to clear them.
    pub fn into_parts(self) -> (L, T) {
        (self.line, self.timers)
    }

    pub fn line(&self) -> &L {
        &self.line
    }

    pub fn timers(&self) -> &T {
        &self.timers
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut L, &mut T) {
        (&mut self.line, &mut self.timers)
    }

    fn subscribe(
        &mut self,
        event: ButtonEvent,
        handler: Handler<'a>,
        once: bool,
    ) -> Result<SubscriptionId, ButtonError<L::Error>> {
        let id = SubscriptionId(self.next_id);
        self.subscriptions
            .push(Subscription {
                id,
                event,
                handler,
                once,
            })
            .map_err(|_| ButtonError::ListenersFull)?;

        if self.subscriptions.len() == 1 {
            if let Err(e) = self.attach() {
                self.subscriptions.clear();
                return Err(e);
            }
        }
        self.next_id = self.next_id.wrapping_add(1);
        Ok(id)
    }

    fn attach(&mut self) -> Result<(), ButtonError<L::Error>> {
        self.line
            .listen(self.config.press_level(), ListenMode::Persistent)
            .map_err(ButtonError::Line)?;
        debug!("button: attached to line");
        Ok(())
    }

    fn detach(&mut self) {
        self.line.remove_all_listeners();
        if let PressCycle::Pressed { press, hold } = self.cycle {
            self.cancel_timers(press, hold);
        }
        self.cycle = PressCycle::Idle;
        debug!("button: detached from line");
    }

    fn begin_cycle(&mut self) -> Result<(), ButtonError<L::Error>> {
        if self.is_pressed() {
            trace!("button: ignoring press level while pressed");
            return Ok(());
        }

        self.line
            .listen(self.config.release_level(), ListenMode::Once)
            .map_err(ButtonError::Line)?;
        let press = self.timers.schedule(self.config.press_period, ButtonTimer::Press);
        let hold = self.timers.schedule(self.config.hold_period, ButtonTimer::Hold);
        self.cycle = PressCycle::Pressed {
            press: Some(press),
            hold: Some(hold),
        };
        debug!("button: press cycle started");
        Ok(())
    }

    fn end_cycle(&mut self) {
        let PressCycle::Pressed { press, hold } = self.cycle else {
            trace!("button: ignoring release level while idle");
            return;
        };

        self.cancel_timers(press, hold);
        self.cycle = PressCycle::Idle;
        debug!("button: press cycle ended");
        self.emit(ButtonEvent::Release);
    }

    fn cancel_timers(&mut self, press: Option<TimerHandle>, hold: Option<TimerHandle>) {
        for handle in [press, hold].into_iter().flatten() {
            self.timers.cancel(handle);
        }
    }

    fn emit(&mut self, event: ButtonEvent) {
        trace!("button: emitting {:?}", event);
        for subscription in self.subscriptions.iter().filter(|s| s.event == event) {
            (subscription.handler)(event);
        }

        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| !(s.once && s.event == event));
        if before > 0 && self.subscriptions.is_empty() {
            self.detach();
        }
    }
}
