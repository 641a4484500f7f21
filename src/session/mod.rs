pub mod enricher;
pub mod launcher;
pub mod log;
pub mod pipeline;
pub mod runner;
pub mod state;
