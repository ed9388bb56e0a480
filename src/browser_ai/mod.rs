mod assistant;
mod cdp_client;
mod driver;
#[cfg(test)]
pub(crate) mod scripted;

pub use assistant::{AssistantSession, Timings};
pub use cdp_client::CdpClient;
pub use driver::{BrowserDriver, Lookup};
