pub mod access_control;
pub mod auth;
pub mod media;
pub mod misc;
pub mod pagination;
pub mod password;
