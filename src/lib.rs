pub mod auth;
pub mod config;
pub mod discover;
pub mod error;
pub mod notify;
pub mod platform;
pub mod progress;
pub mod state;
pub mod sync;

// Re-export main types for convenience
pub use auth::{CachedToken, SpotifyAuth, TOKEN_CACHE_FILENAME};
pub use config::{Config, Market, MessagingConfig, SpotifyCredentials};
pub use discover::{Discovery, DiscoveryWindow, discover_show_episodes, select_new_episodes};
pub use error::{AuthError, ConfigError, MessagingError, PlatformError, RunError, StateError};
pub use notify::{Messenger, WhatsAppClient, format_show_list};
pub use platform::{Episode, Page, PodcastPlatform, Show, SpotifyClient};
pub use progress::{NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter};
pub use state::{State, StateStore};
pub use sync::{AddedEpisode, NotificationOutcome, Notifier, RunOptions, RunReport, run_autosave};
