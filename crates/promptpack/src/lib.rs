pub mod app;
pub mod domain;
pub mod infra;

pub use app::workspace::Workspace;

/// Install logging for the binary. Safe to call more than once.
pub fn init(verbose: bool) {
    infra::logging::init_tracing(verbose);
}
