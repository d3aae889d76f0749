//! Domain types shared across pipeline stages.

mod event;

pub use event::{RawEvent, SilverEvent};
