use embedded_hal::delay::DelayNs;

/// Runs `attempt` until it succeeds, sleeping a fixed `delay_ms` between
/// attempts. No backoff and no cap. The closure receives the 1-based attempt.
pub fn retry_forever<T, E, D, F>(delay_ms: u32, delay: &mut D, mut attempt: F) -> T
where
    D: DelayNs,
    F: FnMut(u32) -> Result<T, E>,
{
    let mut count: u32 = 0;
    loop {
        count = count.saturating_add(1);
        if let Ok(value) = attempt(count) {
            return value;
        }
        delay.delay_ms(delay_ms);
    }
}

/// Fail-stop: park the caller forever.
pub fn fail_stop<D: DelayNs>(delay: &mut D, delay_ms: u32) -> ! {
    loop {
        delay.delay_ms(delay_ms);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use embedded_hal::delay::DelayNs;

    /// Delay that only records how long it was asked to wait.
    #[derive(Debug, Default)]
    pub struct RecordingDelay {
        pub total_ns: u64,
        pub calls: u32,
    }

    impl RecordingDelay {
        pub fn total_ms(&self) -> u64 {
            self.total_ns / 1_000_000
        }
    }

    impl DelayNs for RecordingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ns += u64::from(ns);
            self.calls += 1;
        }

        fn delay_ms(&mut self, ms: u32) {
            self.total_ns += u64::from(ms) * 1_000_000;
            self.calls += 1;
        }
    }
}
