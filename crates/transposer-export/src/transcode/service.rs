//! Transcoding service seam.

use crate::error::Result;

/// A transcoder with its own scratch file namespace.
///
/// Instances are disposable: after any failure the policy drops the service
/// and asks the factory for a fresh one.
pub trait TranscodeService {
    /// Prepare the service for use. Called once per instance before any
    /// other operation.
    fn load(&mut self) -> Result<()>;

    fn write_file(&mut self, name: &str, data: &[u8]) -> Result<()>;

    fn read_file(&mut self, name: &str) -> Result<Vec<u8>>;

    /// Remove a file. Removing a file that does not exist is not an error.
    fn delete_file(&mut self, name: &str) -> Result<()>;

    /// Run one transcode, forwarding each diagnostic line to `log`.
    /// Returns the process exit code.
    fn exec(&mut self, args: &[String], log: &mut dyn FnMut(&str)) -> Result<i32>;
}

/// Creates service instances.
pub trait ServiceFactory {
    type Service: TranscodeService;

    fn create(&self) -> Result<Self::Service>;
}
