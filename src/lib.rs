pub mod config;
pub mod control;
pub mod error;
pub mod flow;
pub mod net;

pub use error::{Error, Result};

#[cfg(test)]
mod test;
