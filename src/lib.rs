//! Live operation tracking for the chat workspace client: streaming
//! generations, build jobs and the controller that keeps one view of them in
//! sync with the server.

pub mod audio;
pub mod backend;
pub mod channel;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod generation;
pub mod identifiers;
pub mod jobs;
pub mod segmentation;
pub mod settings;
pub mod utils;
pub mod view;

pub use audio::{AudioPlayer, AudioRelay, SilentPlayer};
pub use controller::{LiveViewController, ViewSink, ViewSubject};
pub use error::{BackendError, ChannelError, LiveError};
pub use identifiers::{JobId, RevisionId, TaskId, ThreadId};
pub use settings::{ClientSettings, SettingsStore};
pub use utils::init_logging;
pub use view::LiveView;
