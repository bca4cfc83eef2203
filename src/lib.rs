//! Human-readable element selection, auto-waiting and navigation-aware
//! actions on top of a browser protocol gateway.

pub mod actions;
pub mod browser;
pub mod core;
pub mod dom;
pub mod errors;
pub mod events;
pub mod selectors;
pub mod testing;
pub mod types;
pub mod wait;

pub use actions::{ActionOptions, DropTarget, Target};
pub use browser::PageSession;
pub use crate::core::{Config, Gateway};
pub use dom::{Element, OptionQuery};
pub use errors::{PilotError, Result};
pub use events::{ActionEvent, EventBus};
pub use selectors::{ElementKind, Selector, TextPattern};
pub use types::*;
pub use wait::RetryPolicy;
