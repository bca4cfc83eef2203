//! The action layer. Every action resolves its target, waits until it is
//! actionable, runs the mutation inside navigation synchronization and
//! returns a human-readable description of what happened.

pub mod actionability;
pub mod base;
pub mod click;
pub mod form;
pub mod input;
pub mod pointer;

pub use actionability::{first_failing, wait_for_actionable, Check, DEFAULT_CHECKS, WRITE_CHECKS};
pub use base::{ActionOptions, DropTarget, Target};
pub use pointer::{drag_path, DRAG_STEPS};
