use std::time::Instant;

/// Free-running millisecond counter, 32 bits wide so it wraps after ~49.7 days.
///
/// All elapsed-time math against it must use `wrapping_sub`.
pub trait Millis {
    fn now_ms(&self) -> u32;
}

#[derive(Debug, Clone, Copy)]
pub struct SystemMillis {
    start: Instant,
}

impl SystemMillis {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemMillis {
    fn default() -> Self {
        Self::new()
    }
}

impl Millis for SystemMillis {
    fn now_ms(&self) -> u32 {
        // Truncation is the wraparound.
        self.start.elapsed().as_millis() as u32
    }
}

/// Gate that fires once the counter has advanced strictly more than
/// `interval_ms` past the previous fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollGate {
    last_fire_ms: u32,
    interval_ms: u32,
}

impl PollGate {
    pub fn new(interval_ms: u32) -> Self {
        Self {
            last_fire_ms: 0,
            interval_ms,
        }
    }

    pub fn last_fire_ms(&self) -> u32 {
        self.last_fire_ms
    }

    pub fn elapsed_ms(&self, now_ms: u32) -> u32 {
        now_ms.wrapping_sub(self.last_fire_ms)
    }

    pub fn should_fire(&mut self, now_ms: u32) -> bool {
        if self.elapsed_ms(now_ms) > self.interval_ms {
            self.last_fire_ms = now_ms;
            true
        } else {
            false
        }
    }
}
