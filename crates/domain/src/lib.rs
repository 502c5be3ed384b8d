//! Domain types for the planning backend: catalog entities, demand,
//! schedules, proficiency, the error taxonomy, and the `Repository` port
//! (C11) the scheduler and API layer consume.

pub mod catalog;
pub mod demand;
pub mod errors;
pub mod health;
pub mod proficiency;
pub mod repository;
pub mod schedule;

pub use catalog::*;
pub use demand::*;
pub use errors::*;
pub use health::*;
pub use proficiency::*;
pub use repository::*;
pub use schedule::*;
