pub mod hospital;
pub mod store;

pub use hospital::HospitalApiClient;
pub use store::{FileStore, KeyValueStore, MemoryStore};
