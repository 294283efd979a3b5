//! SeaORM repository implementations for the ledger tables

pub mod failure;
pub mod folder_config;
pub mod upload;

pub use failure::FailureSeaOrmRepository;
pub use folder_config::FolderConfigSeaOrmRepository;
pub use upload::UploadSeaOrmRepository;
