pub mod proximity;
pub mod resolve;
pub mod spec;
pub mod text;

pub use proximity::{Proximity, Relation};
pub use resolve::{Resolver, Search};
pub use spec::{ElementKind, Selector, SelectorSpec};
pub use text::{MatchMode, TextPattern, TextQuery};
