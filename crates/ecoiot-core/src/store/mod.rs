// ── State store ──
//
// Lock-free snapshot storage with push-based change notification.

mod state_store;

pub use state_store::StateStore;
