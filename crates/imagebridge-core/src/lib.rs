pub mod config;
pub mod logging;

pub mod checksum;
pub mod image_api;
pub mod retry;
pub mod storage;
pub mod tool;
