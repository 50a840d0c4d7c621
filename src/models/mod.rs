pub mod app;
pub mod configuration;
pub mod session;

pub use app::InstalledApp;
pub use configuration::{MusicSource, SessionConfiguration};
pub use session::SessionRecord;
