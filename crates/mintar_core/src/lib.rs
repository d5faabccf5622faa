pub mod collection;
pub mod domain;
pub mod memory;
pub mod ports;
pub mod session;

pub use collection::{
    CollectionSnapshot, CollectionStore, Decoded, StoreError, StoreResult, DEFAULT_COLLECTION_KEY,
};
pub use domain::{
    AuthStatus, DocumentUpload, FileInfo, LoginData, PracticeQuestion, ProfileUpdate,
    RecordSummary, SavedRecord, StudySummary, TopicEntry, UserProfile,
};
pub use memory::InMemoryBackend;
pub use ports::{
    AuthenticationService, KeyValueBackend, PortError, PortResult, SummarizationService,
};
pub use session::AuthSessionStore;
