#![allow(dead_code)]

pub mod camera;
pub mod env;
pub mod models;

use std::time::Duration;

pub fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}
