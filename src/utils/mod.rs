pub mod time;

pub use time::relative_time_label;
