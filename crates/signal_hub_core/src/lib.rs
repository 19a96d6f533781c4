pub mod domain;
pub mod ports;

pub use domain::{
    AuthEvent, Bookmark, BookmarkToggle, Chapter, ChapterDraft, ChapterId, ChapterMaterials,
    ChapterUpdate, Identity, MaterialKind, Profile, ProfileUpdate, ProgressRecord, SignUpMetadata,
    Tier, UserStats,
};
pub use ports::{
    AuthEventStream, AuthGateway, DataGateway, GatewayError, GatewayResult, StorageGateway,
};
