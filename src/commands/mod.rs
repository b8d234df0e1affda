//! CLI command implementations
//!
//! `program` runs a full session through the core orchestrator. `identify` and
//! `read` hold the board in reset themselves and talk to the flash directly.

mod list;
mod identify;
mod program;
mod progress;
mod read;

pub use list::list_programmers;
pub use identify::run_identify;
pub use program::{run_program, ProgramArgs};
pub use read::run_read;
