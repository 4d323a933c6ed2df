pub mod buildconfig;
pub mod defconfig;
pub mod error;
pub mod generator;
pub mod util;

pub use error::{Error, Result};
