pub mod due_date;
pub mod entities;
pub mod errors;
pub mod events;
pub mod execution;
pub mod report;
pub mod sampling;
pub mod scheduling;
pub mod types;
