pub mod config;
pub mod error;
pub mod storage;
pub mod utils;

// Driver modules (point to project root drivers via path attribute) / 驱动模块
#[path = "../drivers/mod.rs"]
pub mod drivers;

pub use error::{OssError, Result};
