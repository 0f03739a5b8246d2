/// Bounded window of recent request outcomes
pub mod status_window;

pub use status_window::StatusWindow;
