//! Recording identity: URL decomposition, session token and request cookies.
//!
//! Everything the pipeline derives from the input URL lives here so that the
//! orchestrator only ever passes around an immutable [`RecordingRef`].

mod cookies;
mod error;
mod reference;
mod title;

pub use cookies::{Cookie, CookieSet, SESSION_COOKIE_NAME, Session};
pub use error::RecordingUrlError;
pub use reference::RecordingRef;
pub use title::sanitize_title;
