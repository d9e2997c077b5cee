use std::{fmt::Display, io::Write, net::IpAddr};

use embedded_hal::delay::DelayNs;
use log::{error, info};
use thiserror::Error;

use crate::{
    clock::Millis,
    config::MonitorConfig,
    csv::CSV_HEADER,
    link::{connect_station, LinkError, StationLink},
    sensor::{ClimateSensor, SensorError},
    time_sync::{sync_until_ok, NtpClock, TimeSource},
};

pub const BANNER: &str = "AHT20 + ESP32 WiFi monitor";

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("sensor not found, check wiring ({0})")]
    SensorNotFound(#[source] SensorError),
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error("failed to start http responder: {0}")]
    Responder(String),
}

#[derive(Debug)]
pub struct Started<R> {
    pub responder: R,
    pub local_address: Option<IpAddr>,
}

/// Blocking bring-up, in order: network, time sync, sensor, HTTP responder,
/// CSV header. A missing sensor stops the sequence before the responder is
/// ever started.
pub struct Startup<'a, M, D, W> {
    pub config: &'a MonitorConfig,
    pub millis: &'a M,
    pub delay: &'a mut D,
    pub console: &'a mut W,
}

impl<M, D, W> Startup<'_, M, D, W>
where
    M: Millis,
    D: DelayNs,
    W: Write,
{
    pub fn run<L, S, T, R, E, F>(
        mut self,
        link: &mut L,
        clock: &mut NtpClock<T>,
        sensor: &mut S,
        start_responder: F,
    ) -> Result<Started<R>, StartupError>
    where
        L: StationLink,
        S: ClimateSensor,
        T: TimeSource,
        F: FnOnce() -> Result<R, E>,
        E: Display,
    {
        info!("{BANNER}");

        let local_address = connect_station(
            link,
            &self.config.network,
            &mut *self.delay,
            &mut *self.console,
        )?;

        info!("Syncing NTP time from {}...", self.config.time.ntp_server);
        sync_until_ok(
            clock,
            self.millis,
            &mut *self.delay,
            self.config.time.ntp_retry_delay_ms,
        );
        info!(
            "Current time: {}",
            clock.formatted_local_time(self.millis.now_ms())
        );

        if let Err(err) = sensor.initialize() {
            error!("Sensor not found, check wiring! ({err})");
            return Err(StartupError::SensorNotFound(err));
        }
        info!("AHT20 detected.");

        let responder =
            start_responder().map_err(|err| StartupError::Responder(err.to_string()))?;
        info!("HTTP server started on port {}.", self.config.network.http_port);

        let _ = writeln!(self.console, "{CSV_HEADER}");
        let _ = self.console.flush();

        Ok(Started {
            responder,
            local_address,
        })
    }
}
