//! Process termination seam.

/// Ends the process with an exit code.
pub trait Terminate: Send + Sync + 'static {
    fn terminate(&self, code: i32);
}

/// Exits the current process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExit;

impl Terminate for ProcessExit {
    fn terminate(&self, code: i32) {
        std::process::exit(code);
    }
}
