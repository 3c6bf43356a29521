pub mod config;
pub mod data;
pub mod init;
pub mod misc;
pub mod status;
