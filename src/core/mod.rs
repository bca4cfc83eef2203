pub mod config;
pub mod gateway;

pub use config::{Config, ConfigOption};
pub use gateway::{
    Gateway, KeyEvent, KeyEventKind, MouseButton, MouseEvent, MouseEventKind, PageSignal,
    SignalKind, SignalSubscription, TouchEvent, TouchEventKind,
};
