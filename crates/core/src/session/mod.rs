pub mod in_flight;
pub mod scheduler;
pub mod state;
pub mod store;
pub mod video_session;
