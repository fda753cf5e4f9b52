pub mod service;
pub mod types;

pub use service::ScheduleService;
pub use types::{MaturationSchedule, ScheduleStatus, ScheduleStore};
