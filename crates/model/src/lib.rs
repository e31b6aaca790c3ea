pub mod dirty;
pub mod dispatch_post;
pub mod ids;
pub mod journey;
pub mod journey_event;
pub mod server;
pub mod snapshot;
pub mod update_holder;
