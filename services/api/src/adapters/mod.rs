pub mod actuator;
pub mod db;
pub mod memory;
pub mod panel_http;
pub mod status_feed;

pub use actuator::RemoteActuator;
pub use db::PgStore;
pub use memory::MemoryStore;
pub use panel_http::HttpPanelClient;
pub use status_feed::run_status_feed;
