// Keydance State
// Per-key tracking records and the pool that owns them

mod keystate;
mod pool;

pub use keystate::{FollowingKey, Guard, KeyState, PendingTimeout, Stage};
pub use pool::{ActivePool, DEFAULT_CAPACITY};
