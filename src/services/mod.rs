pub mod file_store;
pub mod user_service;
pub mod video_service;
