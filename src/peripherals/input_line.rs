//! input_line.rs — digital input line abstraction the button monitor listens on

use heapless::Vec;

/// Electrical level of a digital input.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    High,
    Low,
}

impl Level {
    pub const fn from_high(is_high: bool) -> Self {
        if is_high { Level::High } else { Level::Low }
    }
}

impl core::ops::Not for Level {
    type Output = Level;

    fn not(self) -> Level {
        match self {
            Level::High => Level::Low,
            Level::Low => Level::High,
        }
    }
}

/// How long a level listener stays registered.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ListenMode {
    /// Fires on every transition to the level.
    Persistent,
    /// Fires on the next transition to the level, then removes itself.
    Once,
}

/// A digital input that reports level transitions to registered listeners.
///
/// Listeners are registrations, not callbacks: the event loop observes a
/// transition, and [`InputLine::dispatch`] tells it whether anyone was
/// listening for that level.
pub trait InputLine {
    type Error;

    /// Puts the line into readable input mode.
    fn configure_as_input(&mut self) -> Result<(), Self::Error>;

    /// Registers a listener for transitions to `level`.
    fn listen(&mut self, level: Level, mode: ListenMode) -> Result<(), Self::Error>;

    /// Drops every registered listener.
    fn remove_all_listeners(&mut self);

    /// Reports a transition to `level`.
    ///
    /// Returns true if at least one listener matched. Matched one-shot
    /// listeners are removed.
    fn dispatch(&mut self, level: Level) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("line listener table is full")]
pub struct ListenerTableFull;

/// Fixed-capacity listener registry backing [`InputLine`] implementations.
#[derive(Debug, Clone, Default)]
pub struct ListenerTable<const N: usize = 4> {
    entries: Vec<(Level, ListenMode), N>,
}

impl<const N: usize> ListenerTable<N> {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn insert(&mut self, level: Level, mode: ListenMode) -> Result<(), ListenerTableFull> {
        self.entries
            .push((level, mode))
            .map_err(|_| ListenerTableFull)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if any listener, of either mode, waits for `level`.
    pub fn contains(&self, level: Level) -> bool {
        self.entries.iter().any(|&(l, _)| l == level)
    }

    /// Number of listeners registered for `level` with `mode`.
    pub fn count(&self, level: Level, mode: ListenMode) -> usize {
        self.entries
            .iter()
            .filter(|&&(l, m)| l == level && m == mode)
            .count()
    }

    pub fn dispatch(&mut self, level: Level) -> bool {
        let matched = self.contains(level);
        self.entries
            .retain(|&(l, mode)| !(l == level && mode == ListenMode::Once));
        matched
    }
}
