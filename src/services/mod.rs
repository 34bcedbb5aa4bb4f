// Service exports
pub mod cache;
pub mod memory;
pub mod notifications;
pub mod postgres;
pub mod store;
pub mod user_service;

pub use cache::{CacheError, CacheKey, CacheManager, CacheStats, CachedUserDirectory};
pub use memory::{InMemoryStore, InMemoryUserDirectory, RecordingNotificationSink, SentNotification};
pub use notifications::{HttpNotificationSink, LogNotificationSink};
pub use postgres::PgStore;
pub use store::{
    DirectoryError, MatchRequestStore, NotificationError, NotificationSink, PlanStore, StoreError,
    Transition, UserDirectory,
};
pub use user_service::UserServiceClient;
