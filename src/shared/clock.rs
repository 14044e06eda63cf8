use std::fmt;

/// Nanoseconds per simulated second
pub const NANOS_PER_SEC: u32 = 1_000_000_000;

/// Simulated time source used for journal timestamps.
///
/// Only the coordinator advances it, and only while holding the workspace
/// lock; see [`crate::shared::Timeline`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtualClock {
    seconds: u64,
    nanos: u32,
}

impl VirtualClock {
    pub fn new(seconds: u64, nanos: u32) -> Self {
        let mut clock = Self { seconds, nanos: 0 };
        clock.advance(nanos as u64);
        clock
    }

    pub fn seconds(&self) -> u64 {
        self.seconds
    }

    pub fn nanos(&self) -> u32 {
        self.nanos
    }

    /// Latest representable time; advancing past it stays here
    pub const MAX: VirtualClock = VirtualClock {
        seconds: u64::MAX,
        nanos: NANOS_PER_SEC - 1,
    };

    /// Move forward by `nanos`, carrying whole seconds. Saturates at
    /// [`VirtualClock::MAX`] instead of wrapping.
    pub fn advance(&mut self, nanos: u64) {
        let per_sec = u64::from(NANOS_PER_SEC);
        let total = u64::from(self.nanos).saturating_add(nanos);
        match self.seconds.checked_add(total / per_sec) {
            Some(seconds) => {
                self.seconds = seconds;
                self.nanos = (total % per_sec) as u32;
            }
            None => *self = Self::MAX,
        }
    }
}

impl fmt::Display for VirtualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}]", self.seconds, self.nanos)
    }
}
