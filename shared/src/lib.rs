//! Domain types, category registry and the rule-based task parser.

pub mod category;
pub mod parser;
pub mod task;

pub use category::{Category, CategoryInfo};
pub use task::{
    normalize_time_slot, parse_date, CreateTaskRequest, ParseRequest, ParsedTask, Priority, Task,
    TaskResponse, UpdateTaskRequest, User, DEFAULT_DURATION,
};
