mod relay_dispatcher;
mod signaling_output;
mod ws_handler;

pub use relay_dispatcher::*;
pub use signaling_output::*;
pub use ws_handler::*;
