pub mod timetable;
pub mod transport_name;
pub mod updater;

pub use timetable::{build_events, RunInfo, TimetableEntry, UpstreamStopType};
pub use updater::{apply, JitCandidate, UpdateRequest};
