pub mod azure_blob;
pub mod interface;

pub use azure_blob::AzureBlobStore;
pub use interface::{ObjectStore, StorageError, StorageLocator};
