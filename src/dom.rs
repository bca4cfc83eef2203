pub mod element;
pub mod remote;
pub mod scripts;

pub use element::{Element, SelectedOption};
pub use remote::{ElementInfo, LabelStrategy, OptionQuery, PageCall, RemoteRef, RemoteValue};
