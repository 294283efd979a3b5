//! Administrative services

pub mod folder_config;

pub use folder_config::FolderConfigService;
