pub mod app_dirs;
pub mod cache;
pub mod path_utils;
pub mod performance;
pub mod task_control;
