use std::io::Write;

use embedded_hal::delay::DelayNs;
use log::{debug, warn};

use crate::{
    clock::{Millis, PollGate},
    config::MonitorConfig,
    csv::format_csv_line,
    page::render_page,
    responder::PageRequests,
    sensor::ClimateSensor,
    time_sync::{NtpClock, TimeSource},
    types::Reading,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Iteration {
    pub polled: bool,
    pub served: bool,
}

/// The cooperative main loop: owns the sensor, the clock and the latest
/// reading. Nothing else writes the reading.
pub struct Monitor<S, T, W> {
    sensor: S,
    clock: NtpClock<T>,
    gate: PollGate,
    reading: Reading,
    zone_label: String,
    csv: W,
}

impl<S, T, W> Monitor<S, T, W>
where
    S: ClimateSensor,
    T: TimeSource,
    W: Write,
{
    pub fn new(sensor: S, clock: NtpClock<T>, config: &MonitorConfig, csv: W) -> Self {
        Self {
            sensor,
            clock,
            gate: PollGate::new(config.poll_interval_ms),
            reading: Reading::default(),
            zone_label: config.time.zone_label.clone(),
            csv,
        }
    }

    pub fn reading(&self) -> Reading {
        self.reading
    }

    pub fn clock(&self) -> &NtpClock<T> {
        &self.clock
    }

    pub fn csv_sink(&self) -> &W {
        &self.csv
    }

    /// Polling tick, gated on the wrapping millisecond counter. Returns the
    /// CSV line when the tick fired.
    pub fn poll(&mut self, now_ms: u32) -> Option<String> {
        if !self.gate.should_fire(now_ms) {
            return None;
        }

        match self.sensor.read_event() {
            Ok(reading) => self.reading = reading,
            Err(err) => warn!("sensor read failed, keeping previous reading: {err}"),
        }

        if self.clock.refresh(now_ms) {
            debug!("time source refreshed");
        }

        let line = format_csv_line(self.clock.epoch_seconds_local(now_ms), self.reading);
        if let Err(err) = writeln!(self.csv, "{line}").and_then(|()| self.csv.flush()) {
            warn!("failed to write csv line: {err}");
        }
        Some(line)
    }

    pub fn render(&self, now_ms: u32) -> String {
        render_page(
            self.reading.temperature_c,
            self.reading.humidity_rh,
            &self.clock.formatted_local_time(now_ms),
            &self.zone_label,
        )
    }

    pub fn run_iteration(&mut self, now_ms: u32, requests: &mut PageRequests) -> Iteration {
        let polled = self.poll(now_ms).is_some();
        let served = requests.service_pending(|| self.render(now_ms));
        Iteration { polled, served }
    }

    pub fn run_forever<M, D>(
        mut self,
        millis: &M,
        requests: &mut PageRequests,
        delay: &mut D,
        idle_ms: u32,
    ) -> !
    where
        M: Millis,
        D: DelayNs,
    {
        loop {
            let iteration = self.run_iteration(millis.now_ms(), requests);
            if !iteration.served && idle_ms > 0 {
                delay.delay_ms(idle_ms);
            }
        }
    }
}
