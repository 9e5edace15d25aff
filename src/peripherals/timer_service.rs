//! timer_service.rs — one-shot, cancelable deadlines for the press and hold periods

use embassy_time::Duration;

/// Which of the two press-cycle deadlines a timer belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonTimer {
    Press,
    Hold,
}

impl ButtonTimer {
    pub(crate) const fn index(self) -> usize {
        match self {
            ButtonTimer::Press => 0,
            ButtonTimer::Hold => 1,
        }
    }
}

/// Handle to a scheduled deadline.
///
/// The generation tells two schedulings of the same timer apart, so a
/// handle from an earlier press cycle never matches a later one.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerHandle {
    timer: ButtonTimer,
    generation: u32,
}

impl TimerHandle {
    pub const fn new(timer: ButtonTimer, generation: u32) -> Self {
        Self { timer, generation }
    }

    pub const fn timer(&self) -> ButtonTimer {
        self.timer
    }

    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

/// Schedules one-shot deadlines on behalf of the button monitor.
///
/// Firing is reported back through [`crate::ButtonMonitor::timer_fired`]
/// by whatever event loop owns the service.
pub trait TimerService {
    /// Arms `timer` to fire `after` from now.
    fn schedule(&mut self, after: Duration, timer: ButtonTimer) -> TimerHandle;

    /// Disarms a deadline. Must be a no-op for handles that already fired
    /// or were already canceled.
    fn cancel(&mut self, handle: TimerHandle);
}
