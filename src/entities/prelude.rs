pub use super::folder_configurations::Entity as FolderConfigurations;
pub use super::upload_failures::Entity as UploadFailures;
pub use super::uploads::Entity as Uploads;
