#![warn(missing_docs)]

//! Light weight helpers shared by the Forgetless crates: bounds-checked
//! big-endian byte handling, `0x` hex conversion, and the cross-target
//! `Send`/`Sync` bounds used by the async collaborator traits.

mod sync;
pub use sync::*;

mod bytes;
pub use bytes::*;
