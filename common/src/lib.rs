pub mod clock;
pub mod config;
pub mod csv;
pub mod link;
pub mod monitor;
pub mod page;
pub mod report;
pub mod responder;
pub mod retry;
pub mod sensor;
pub mod startup;
pub mod time_sync;
pub mod types;

pub use clock::{Millis, PollGate, SystemMillis};
pub use config::{I2cConfig, MonitorConfig, NetworkConfig, TimeConfig};
pub use csv::{format_csv_line, CSV_HEADER};
pub use link::{connect_station, LinkError, StationLink};
pub use monitor::{Iteration, Monitor};
pub use page::render_page;
pub use responder::{page_channel, PageClient, PageRequests, ResponderError, PAGE_CONTENT_TYPE};
pub use retry::{fail_stop, retry_forever};
pub use sensor::{Aht20, ClimateSensor, SensorError};
pub use startup::{Started, Startup, StartupError};
pub use time_sync::{NtpClock, TimeSource, TimeSyncError};
pub use types::Reading;
