mod abandonment;
mod controller;
mod registry;
mod session;

// Public API of the session subsystem.
pub use crate::error::LifecycleError;
pub use abandonment::{AbandonmentScheduler, SessionKind};
pub use controller::LifecycleController;
pub use registry::SessionRegistry;
pub use session::TestSession;
