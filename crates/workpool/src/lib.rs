#![doc = include_str!("../README.md")]

mod cancel;
mod config;
mod error;
mod job;
mod outcome;
mod pool;
mod task;

pub use crate::cancel::*;
pub use crate::config::*;
pub use crate::error::*;
pub use crate::job::*;
pub use crate::outcome::*;
pub use crate::pool::*;
pub use crate::task::*;
