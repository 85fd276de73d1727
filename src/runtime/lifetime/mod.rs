pub mod shutdown;
pub mod startup;

pub use shutdown::ShutdownTrigger;
pub use startup::{AppContext, prepare_context};
