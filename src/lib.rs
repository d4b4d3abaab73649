pub mod backend;
pub mod capabilities;
pub mod clock;
pub mod controller;
pub mod error;
pub mod geometry;
pub mod logging;
pub mod notification;
pub mod panic_handler;
pub mod renderer;
pub mod scheduler;
pub mod settings;
pub mod store;
pub mod tabs;
pub mod transform;
pub mod view_state;
pub mod zoom;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use controller::{ControllerConfig, ViewportController};
pub use error::{DocumentOpenError, PersistenceError, RenderError, ValidationError, ViewerError};
pub use store::{PersistentStateStore, SharedViewState};
pub use tabs::TabManager;
pub use view_state::{DisplayMode, Rotation, ViewState};
