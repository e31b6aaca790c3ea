pub mod dispatch_posts;
pub mod journey_events;
pub mod journeys;
pub mod maintenance;
pub mod servers;
