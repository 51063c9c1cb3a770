//! File modules
//!
//! - `lineinfile_dedupe`: keep a line present exactly once, or remove it
//! - `slurp`: read a file back from the target
//!
//! Both run through a [`backend::FileBackend`], native or raw.

pub mod backend;
pub mod editor;
pub mod lineinfile;
pub mod slurp;

// Utility modules
pub mod utils;

pub use backend::{backend_for, FileBackend, NativeBackend, RawBackend};
pub use editor::{plan_edit, Anchor, EditAction, EditPlan, EditState, LineEdit, Selector};
pub use lineinfile::{LineInFileArgs, LineInFileModule, LineInFileRequest};
pub use slurp::{SlurpArgs, SlurpModule};
