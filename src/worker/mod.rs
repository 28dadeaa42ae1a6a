pub mod scheduler;

pub use scheduler::{ScheduleConfig, Scheduler};
