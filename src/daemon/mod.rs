// Daemon module - single-instance bookkeeping for the background process

pub mod pid;

pub use pid::{PidFile, PidGuard};
