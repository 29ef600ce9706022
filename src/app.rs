//! Application module: exposes the app model used by the TUI and runtime.
//!
//! The `App` model lives in `app::model` and holds the queue source label,
//! the status line and the key bindings.

mod model;

pub use model::*;
