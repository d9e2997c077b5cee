use std::{io::Write, net::IpAddr};

use embedded_hal::delay::DelayNs;
use log::info;
use thiserror::Error;

use crate::config::NetworkConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("invalid station credentials: {0}")]
    InvalidCredentials(&'static str),
    #[error("network driver error: {0}")]
    Driver(String),
}

/// Station-mode network interface.
pub trait StationLink {
    fn begin(&mut self, ssid: &str, password: &str) -> Result<(), LinkError>;

    fn is_connected(&mut self) -> bool;

    fn local_address(&mut self) -> Option<IpAddr>;
}

/// Starts the station and polls it until it reports connected.
///
/// There is no timeout: a headless device with bad credentials has nothing
/// better to do than keep waiting. Progress dots go to `console`.
pub fn connect_station<L, D, W>(
    link: &mut L,
    network: &NetworkConfig,
    delay: &mut D,
    console: &mut W,
) -> Result<Option<IpAddr>, LinkError>
where
    L: StationLink,
    D: DelayNs,
    W: Write,
{
    link.begin(&network.wifi_ssid, &network.wifi_pass)?;

    let _ = write!(console, "Connecting to WiFi");
    let _ = console.flush();
    while !link.is_connected() {
        delay.delay_ms(network.wifi_poll_interval_ms);
        let _ = write!(console, ".");
        let _ = console.flush();
    }
    let _ = writeln!(console);

    let address = link.local_address();
    match address {
        Some(ip) => info!("Connected! IP address: {ip}"),
        None => info!("Connected! IP address: unknown"),
    }
    Ok(address)
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::retry::testing::RecordingDelay;

    struct FlakyLink {
        polls_until_up: u32,
        begun_with: Option<(String, String)>,
    }

    impl StationLink for FlakyLink {
        fn begin(&mut self, ssid: &str, password: &str) -> Result<(), LinkError> {
            if ssid.is_empty() {
                return Err(LinkError::InvalidCredentials("empty ssid"));
            }
            self.begun_with = Some((ssid.to_string(), password.to_string()));
            Ok(())
        }

        fn is_connected(&mut self) -> bool {
            if self.polls_until_up == 0 {
                return true;
            }
            self.polls_until_up -= 1;
            false
        }

        fn local_address(&mut self) -> Option<IpAddr> {
            Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 42)))
        }
    }

    fn network() -> NetworkConfig {
        NetworkConfig {
            wifi_ssid: "home".to_string(),
            wifi_pass: "secret".to_string(),
            ..NetworkConfig::default()
        }
    }

    #[test]
    fn polls_at_fixed_interval_until_connected() {
        let mut link = FlakyLink {
            polls_until_up: 3,
            begun_with: None,
        };
        let mut delay = RecordingDelay::default();
        let mut console = Vec::new();

        let address =
            connect_station(&mut link, &network(), &mut delay, &mut console).unwrap();

        assert_eq!(address, Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 42))));
        assert_eq!(
            link.begun_with,
            Some(("home".to_string(), "secret".to_string()))
        );
        assert_eq!(delay.total_ms(), 1_500);
        assert_eq!(String::from_utf8(console).unwrap(), "Connecting to WiFi...\n");
    }

    #[test]
    fn rejected_credentials_surface_before_polling() {
        let mut link = FlakyLink {
            polls_until_up: 0,
            begun_with: None,
        };
        let mut delay = RecordingDelay::default();
        let config = NetworkConfig::default();

        let err =
            connect_station(&mut link, &config, &mut delay, &mut Vec::new()).unwrap_err();

        assert_eq!(err, LinkError::InvalidCredentials("empty ssid"));
        assert_eq!(delay.calls, 0);
    }
}
