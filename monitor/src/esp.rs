use std::{
    net::IpAddr,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use anyhow::{anyhow, Context};
use embedded_svc::{
    http::Method,
    io::Write,
    wifi::{AuthMethod, ClientConfiguration, Configuration},
};
use esp_idf_hal::{
    delay::FreeRtos,
    i2c::{I2cConfig as HalI2cConfig, I2cDriver},
    units::Hertz,
};
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::prelude::Peripherals,
    http::server::{Configuration as HttpConfiguration, EspHttpServer},
    log::EspLogger,
    nvs::EspDefaultNvsPartition,
    sntp::{EspSntp, SntpConf, SyncStatus},
    wifi::EspWifi,
};
use log::{error, info, warn};

use climate_common::{
    config::{I2C_SCL_GPIO, I2C_SDA_GPIO},
    fail_stop, page_channel, time_sync::MIN_VALID_UNIX, Aht20, LinkError, Monitor,
    MonitorConfig, NtpClock, PageClient, StartupError, Startup, StationLink, SystemMillis,
    TimeSource, TimeSyncError, PAGE_CONTENT_TYPE,
};

const PAGE_QUEUE_DEPTH: usize = 4;
const HTTP_STACK_SIZE: usize = 8 * 1024;
/// Polls between re-issuing a station connect while the link stays down.
const RECONNECT_EVERY_POLLS: u32 = 20;

struct EspStation {
    wifi: EspWifi<'static>,
    polls_down: u32,
}

impl StationLink for EspStation {
    fn begin(&mut self, ssid: &str, password: &str) -> Result<(), LinkError> {
        let auth_method = if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPAWPA2Personal
        };

        self.wifi
            .set_configuration(&Configuration::Client(ClientConfiguration {
                ssid: ssid
                    .try_into()
                    .map_err(|_| LinkError::InvalidCredentials("wifi ssid too long"))?,
                password: password
                    .try_into()
                    .map_err(|_| LinkError::InvalidCredentials("wifi password too long"))?,
                auth_method,
                ..Default::default()
            }))
            .map_err(|err| LinkError::Driver(format!("{err:?}")))?;

        self.wifi
            .start()
            .map_err(|err| LinkError::Driver(format!("{err:?}")))?;
        info!("wifi started, connecting to `{ssid}`");

        self.wifi
            .connect()
            .map_err(|err| LinkError::Driver(format!("{err:?}")))
    }

    fn is_connected(&mut self) -> bool {
        if self.wifi.is_up().unwrap_or(false) {
            self.polls_down = 0;
            return true;
        }

        self.polls_down = self.polls_down.saturating_add(1);
        if self.polls_down % RECONNECT_EVERY_POLLS == 0 {
            if let Err(err) = self.wifi.connect() {
                warn!("wifi reconnect request failed: {err:?}");
            }
        }
        false
    }

    fn local_address(&mut self) -> Option<IpAddr> {
        self.wifi
            .sta_netif()
            .get_ip_info()
            .ok()
            .map(|info| IpAddr::V4(info.ip))
    }
}

/// Samples the system clock that the SNTP service keeps in step.
struct SntpSource<'a> {
    sntp: EspSntp<'a>,
}

impl TimeSource for SntpSource<'_> {
    fn query_unix_seconds(&mut self) -> Result<u64, TimeSyncError> {
        let unix_seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .map_err(|err| TimeSyncError::Unavailable(err.to_string()))?;

        if unix_seconds < MIN_VALID_UNIX {
            if self.sntp.get_sync_status() != SyncStatus::Completed {
                return Err(TimeSyncError::NotSynced);
            }
            return Err(TimeSyncError::Implausible(unix_seconds));
        }
        Ok(unix_seconds)
    }
}

pub fn run() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    let mut config = MonitorConfig::default();
    ensure_wifi_defaults(&mut config);
    config.sanitize();

    let sys_loop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;
    let Peripherals {
        modem, pins, i2c0, ..
    } = Peripherals::take()?;

    let wifi =
        EspWifi::new(modem, sys_loop, Some(nvs_partition)).context("wifi init failed")?;
    let mut link = EspStation {
        wifi,
        polls_down: 0,
    };

    let mut sntp_conf = SntpConf::default();
    sntp_conf.servers[0] = config.time.ntp_server.as_str();
    let sntp = EspSntp::new(&sntp_conf).context("failed to start SNTP")?;
    let mut clock = NtpClock::from_config(SntpSource { sntp }, &config.time);

    info!("I2C on SDA=GPIO{I2C_SDA_GPIO} SCL=GPIO{I2C_SCL_GPIO}");
    let i2c = I2cDriver::new(
        i2c0,
        pins.gpio21,
        pins.gpio22,
        &HalI2cConfig::new().baudrate(Hertz(config.i2c.baudrate_hz)),
    )
    .context("failed to initialize I2C bus")?;
    let mut sensor = Aht20::new(i2c, FreeRtos);

    let (client, mut requests) = page_channel(PAGE_QUEUE_DEPTH);
    let page_timeout = Duration::from_millis(u64::from(config.page_timeout_ms));
    let millis = SystemMillis::new();
    let mut delay = FreeRtos;
    let mut console = std::io::stdout();

    let started = Startup {
        config: &config,
        millis: &millis,
        delay: &mut delay,
        console: &mut console,
    }
    .run(&mut link, &mut clock, &mut sensor, || {
        create_http_server(config.network.http_port, client, page_timeout)
    });

    let started = match started {
        Ok(started) => started,
        Err(StartupError::SensorNotFound(err)) => {
            error!("halting: {err}");
            fail_stop(&mut delay, config.halt_delay_ms);
        }
        Err(err) => return Err(anyhow!(err)),
    };

    // Keep services alive for the program lifetime.
    let _link = link;
    let _server = started.responder;

    let monitor = Monitor::new(sensor, clock, &config, console);
    monitor.run_forever(&millis, &mut requests, &mut delay, config.loop_idle_ms);
}

fn create_http_server(
    port: u16,
    client: PageClient,
    timeout: Duration,
) -> anyhow::Result<EspHttpServer<'static>> {
    let conf = HttpConfiguration {
        http_port: port,
        stack_size: HTTP_STACK_SIZE,
        ..Default::default()
    };

    let mut server = EspHttpServer::new(&conf)?;

    server.fn_handler::<anyhow::Error, _>("/", Method::Get, move |req| {
        match client.fetch(timeout) {
            Ok(body) => {
                req.into_response(200, Some("OK"), &[("Content-Type", PAGE_CONTENT_TYPE)])?
                    .write_all(body.as_bytes())?;
            }
            Err(err) => {
                warn!("page request not served: {err}");
                req.into_response(503, None, &[("Content-Type", "text/plain")])?
                    .write_all(err.to_string().as_bytes())?;
            }
        }
        Ok(())
    })?;

    Ok(server)
}

fn ensure_wifi_defaults(config: &mut MonitorConfig) {
    if config.network.wifi_ssid.is_empty() {
        config.network.wifi_ssid = option_env!("WIFI_SSID").unwrap_or("CHANGE_ME").to_string();
    }

    if config.network.wifi_pass.is_empty() {
        config.network.wifi_pass = option_env!("WIFI_PASS").unwrap_or("CHANGE_ME").to_string();
    }
}
