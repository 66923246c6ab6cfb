mod manager;
mod projector;
mod session;
mod traits;

pub use manager::{start_presence_background_task, PresenceManager};
pub use projector::{build_presence, format_progress, format_timer, kz_mode};
pub use session::SessionState;
pub use traits::{PresenceDescriptor, PresenceEvent, PresenceProvider};
