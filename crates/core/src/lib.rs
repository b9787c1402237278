#![forbid(unsafe_code)]

pub mod model;
pub mod reducer;
pub mod time;

pub use time::Clock;
