//! Driving a live page: the Chrome gateway, navigation synchronization and
//! the session every action runs on.

#[cfg(feature = "chrome")]
pub mod chrome;
pub mod navigation;
pub mod session;

#[cfg(feature = "chrome")]
pub use chrome::ChromeGateway;
pub use navigation::{awaiting_navigation, wait_for_ready_state, NavigationOptions};
pub use session::PageSession;
