pub mod border;
pub mod platform_signal;
pub mod point;
pub mod scenery;
