//! Interactive session.
//!
//! Mirrors a single page client: one wallet connection per session, a counter that can be
//! refreshed at will and increments that run in the background. Triggering an increment while
//! another is in flight is refused.

mod cmd;

pub use cmd::*;
