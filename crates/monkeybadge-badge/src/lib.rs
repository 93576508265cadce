pub mod agent;
pub mod button;
pub mod cache;
pub mod config;
pub mod display;
pub mod leds;
pub mod runtime;
pub mod sync;
pub mod transceiver;
