use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    thread,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use anyhow::Context;
use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use embedded_hal::delay::DelayNs;
use tokio::{net::TcpListener, runtime::Handle, sync::oneshot};
use tracing::{error, info, warn};
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

use climate_common::{
    fail_stop, page_channel, ClimateSensor, LinkError, Monitor, MonitorConfig, NtpClock,
    PageClient, PageRequests, Reading, SensorError, StartupError, Startup, StationLink,
    SystemMillis, TimeSource, TimeSyncError, PAGE_CONTENT_TYPE,
};

const HOST_HTTP_PORT: u16 = 8080;
const PAGE_QUEUE_DEPTH: usize = 8;

#[derive(Clone)]
struct PageState {
    client: PageClient,
    timeout: Duration,
}

/// Stand-in for the AHT20 with a slow deterministic drift.
struct SimulatedAht20 {
    present: bool,
    tick: u32,
}

impl ClimateSensor for SimulatedAht20 {
    fn initialize(&mut self) -> Result<(), SensorError> {
        if self.present {
            Ok(())
        } else {
            Err(SensorError::NotCalibrated)
        }
    }

    fn read_event(&mut self) -> Result<Reading, SensorError> {
        self.tick = self.tick.wrapping_add(1);
        let temperature_c = 22.0 + ((self.tick % 8) as f32 * 0.2);
        let humidity_rh = 55.0 + ((self.tick % 6) as f32 * 0.5);
        Ok(Reading::new(temperature_c, humidity_rh))
    }
}

/// Host clock is assumed to be NTP-disciplined already.
struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn query_unix_seconds(&mut self) -> Result<u64, TimeSyncError> {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .map_err(|err| TimeSyncError::Unavailable(err.to_string()))
    }
}

struct LoopbackLink {
    address: IpAddr,
}

impl StationLink for LoopbackLink {
    fn begin(&mut self, ssid: &str, _password: &str) -> Result<(), LinkError> {
        if !ssid.is_empty() {
            info!("host build ignores wifi ssid `{ssid}`");
        }
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        true
    }

    fn local_address(&mut self) -> Option<IpAddr> {
        Some(self.address)
    }
}

struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(u64::from(ns)));
    }

    fn delay_ms(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}

pub async fn run() -> anyhow::Result<()> {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(&directives))
        .with_writer(std::io::stderr)
        .init();

    let config = load_config()?;
    let (client, requests) = page_channel(PAGE_QUEUE_DEPTH);
    let handle = Handle::current();
    let (done_tx, done_rx) = oneshot::channel();

    thread::Builder::new()
        .name("monitor-loop".to_string())
        .spawn(move || {
            let result = run_monitor(config, handle, client, requests);
            let _ = done_tx.send(result);
        })
        .context("failed to spawn monitor loop thread")?;

    tokio::select! {
        result = done_rx => result.context("monitor loop thread exited unexpectedly")?,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, shutting down");
            Ok(())
        }
    }
}

/// `RUST_LOG`-style directives on top of an `info` default.
fn log_filter(directives: &str) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .parse_lossy(directives)
}

fn load_config() -> anyhow::Result<MonitorConfig> {
    let mut config = match std::env::var("MONITOR_CONFIG") {
        Ok(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config file {path}"))?;
            serde_json::from_str::<MonitorConfig>(&raw)
                .with_context(|| format!("invalid config file {path}"))?
        }
        Err(_) => {
            let mut config = MonitorConfig::default();
            config.network.http_port = HOST_HTTP_PORT;
            config
        }
    };

    if let Some(port) = std::env::var("MONITOR_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
    {
        config.network.http_port = port;
    }
    if let Some(poll_ms) = std::env::var("MONITOR_POLL_MS")
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
    {
        config.poll_interval_ms = poll_ms;
    }

    config.sanitize();
    Ok(config)
}

fn run_monitor(
    config: MonitorConfig,
    handle: Handle,
    client: PageClient,
    mut requests: PageRequests,
) -> anyhow::Result<()> {
    let millis = SystemMillis::new();
    let mut delay = StdDelay;
    let mut stdout = std::io::stdout();

    let mut sensor = SimulatedAht20 {
        present: std::env::var("MONITOR_SIM_SENSOR").as_deref() != Ok("absent"),
        tick: 0,
    };
    let mut clock = NtpClock::from_config(SystemTimeSource, &config.time);
    let mut link = LoopbackLink {
        address: IpAddr::V4(Ipv4Addr::LOCALHOST),
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.network.http_port));
    let page_state = PageState {
        client,
        timeout: Duration::from_millis(u64::from(config.page_timeout_ms)),
    };

    let started = Startup {
        config: &config,
        millis: &millis,
        delay: &mut delay,
        console: &mut stdout,
    }
    .run(&mut link, &mut clock, &mut sensor, || {
        start_http_server(&handle, addr, page_state)
    });

    let started = match started {
        Ok(started) => started,
        Err(StartupError::SensorNotFound(err)) => {
            error!("halting: {err}");
            fail_stop(&mut delay, config.halt_delay_ms);
        }
        Err(err) => return Err(err.into()),
    };
    if let Some(address) = started.local_address {
        info!("page available at http://{address}:{}/", config.network.http_port);
    }

    let _server = started.responder;
    let monitor = Monitor::new(sensor, clock, &config, stdout);
    monitor.run_forever(&millis, &mut requests, &mut delay, config.loop_idle_ms);
}

fn start_http_server(
    handle: &Handle,
    addr: SocketAddr,
    page_state: PageState,
) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    let listener = std::net::TcpListener::bind(addr)
        .with_context(|| format!("failed to bind monitor server at {addr}"))?;
    listener.set_nonblocking(true)?;

    let _guard = handle.enter();
    let listener = TcpListener::from_std(listener)?;
    let app = Router::new()
        .route("/", get(handle_root))
        .with_state(page_state);

    info!("monitor listening on http://{addr}");
    Ok(handle.spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            error!("http server stopped: {err}");
        }
    }))
}

async fn handle_root(State(state): State<PageState>) -> Response {
    let PageState { client, timeout } = state;
    match tokio::task::spawn_blocking(move || client.fetch(timeout)).await {
        Ok(Ok(body)) => ([(CONTENT_TYPE, PAGE_CONTENT_TYPE)], body).into_response(),
        Ok(Err(err)) => {
            warn!("page request not served: {err}");
            (StatusCode::SERVICE_UNAVAILABLE, err.to_string()).into_response()
        }
        Err(err) => {
            warn!("page request task failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_status_lines_are_logged_by_default() {
        assert_eq!(log_filter("").max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn explicit_directives_override_the_default() {
        assert_eq!(log_filter("debug").max_level_hint(), Some(LevelFilter::DEBUG));
        assert_eq!(log_filter("warn").max_level_hint(), Some(LevelFilter::WARN));
    }
}
