pub mod mintar_http;
pub mod secure_store;

pub use mintar_http::MintarHttpAdapter;
pub use secure_store::SecureFileStore;
