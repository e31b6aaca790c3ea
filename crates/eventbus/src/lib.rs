pub mod bus;
pub mod frame;
pub mod subject;

pub use bus::{EventBus, EventBusError};
