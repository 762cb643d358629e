//! Resume cursors
//!
//! A symbol's cursor is the watermark from which the next fetch starts. It is
//! never stored on its own: on every start it is re-derived from the newest
//! record already persisted, so a restarted harvest continues where the
//! previous one stopped.

pub mod cursor;
pub mod resolver;

pub use cursor::Cursor;
pub use resolver::{CursorResolver, ResumeError};
