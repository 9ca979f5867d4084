mod room;
mod room_registry;
mod session;

pub use room::*;
pub use room_registry::*;
pub use session::*;
