//! Session state: conversation messages and the append-only history.

pub mod in_memory;
pub mod traits;

pub use in_memory::History;
pub use traits::{Message, Role};
