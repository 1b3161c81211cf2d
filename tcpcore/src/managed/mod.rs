//! Resource-bounded containers.
//!
//! Connection records are drawn from a pool that is sized up front and may only grow within
//! explicitly configured limits. Keys into the pool are stable and detect reuse of their slot.
pub mod slotmap;

pub use self::slotmap::{Key, SlotMap, Slot};
