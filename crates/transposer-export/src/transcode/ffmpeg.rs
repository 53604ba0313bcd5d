//! ffmpeg subprocess service.

use super::service::{ServiceFactory, TranscodeService};
use crate::error::{ExportError, Result};
use crate::options::TranscodeOptions;
use log::{debug, info, warn};
use std::fs;
use std::io::{self, BufRead, BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

/// Runs the ffmpeg executable inside a private temporary directory.
///
/// The directory and everything in it is removed when the service is
/// dropped.
pub struct FfmpegService {
    program: PathBuf,
    workdir: Option<TempDir>,
}

impl FfmpegService {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            workdir: None,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Scratch directory, once loaded.
    pub fn workdir(&self) -> Option<&Path> {
        self.workdir.as_ref().map(TempDir::path)
    }

    fn file_path(&self, name: &str) -> Result<PathBuf> {
        let workdir = self
            .workdir()
            .ok_or_else(|| ExportError::ServiceLoad("ffmpeg service not loaded".into()))?;
        if name.is_empty() || name.contains(['/', '\\']) || name == ".." {
            return Err(ExportError::InvalidOptions(format!(
                "invalid scratch file name: {:?}",
                name
            )));
        }
        Ok(workdir.join(name))
    }
}

impl TranscodeService for FfmpegService {
    fn load(&mut self) -> Result<()> {
        let status = Command::new(&self.program)
            .args(["-hide_banner", "-version"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| {
                ExportError::ServiceLoad(format!("cannot run {}: {}", self.program.display(), e))
            })?;
        if !status.success() {
            return Err(ExportError::ServiceLoad(format!(
                "{} -version exited with {}",
                self.program.display(),
                status
            )));
        }

        let workdir = tempfile::Builder::new()
            .prefix("transposer-ffmpeg-")
            .tempdir()?;
        info!(
            "ffmpeg service loaded: program={} workdir={}",
            self.program.display(),
            workdir.path().display()
        );
        self.workdir = Some(workdir);
        Ok(())
    }

    fn write_file(&mut self, name: &str, data: &[u8]) -> Result<()> {
        fs::write(self.file_path(name)?, data)?;
        Ok(())
    }

    fn read_file(&mut self, name: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.file_path(name)?)?)
    }

    fn delete_file(&mut self, name: &str) -> Result<()> {
        match fs::remove_file(self.file_path(name)?) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn exec(&mut self, args: &[String], log: &mut dyn FnMut(&str)) -> Result<i32> {
        let workdir = self
            .workdir()
            .ok_or_else(|| ExportError::ServiceLoad("ffmpeg service not loaded".into()))?;
        debug!("ffmpeg {}", args.join(" "));

        let mut child = Command::new(&self.program)
            .args(["-hide_banner", "-nostdin"])
            .args(args)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        let forwarded = match child.stderr.take() {
            Some(stderr) => forward_lines(stderr, log),
            None => Ok(()),
        };
        if let Err(e) = &forwarded {
            // Nobody drains the pipe any more; stop ffmpeg before reaping it.
            warn!("Reading ffmpeg diagnostics failed: {}", e);
            let _ = child.kill();
        }

        let status = child.wait()?;
        forwarded?;
        // Killed by a signal: no exit code.
        Ok(status.code().unwrap_or(-1))
    }
}

/// Forwards each non-empty diagnostic line to `log`.
///
/// ffmpeg ends progress lines with `\r` and echoes container metadata in
/// whatever encoding the file uses, so lines split on both terminators and
/// undecodable bytes are replaced.
fn forward_lines(stderr: impl Read, log: &mut dyn FnMut(&str)) -> io::Result<()> {
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(());
        }
        let text = String::from_utf8_lossy(&buf);
        for line in text.split(['\r', '\n']) {
            let line = line.trim();
            if !line.is_empty() {
                log(line);
            }
        }
    }
}

impl Drop for FfmpegService {
    fn drop(&mut self) {
        if self.workdir.is_some() {
            debug!("ffmpeg service torn down: program={}", self.program.display());
        }
    }
}

/// Creates [`FfmpegService`]s for a configured executable.
#[derive(Debug, Clone)]
pub struct FfmpegFactory {
    program: PathBuf,
}

impl FfmpegFactory {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn from_options(options: &TranscodeOptions) -> Self {
        Self::new(&options.ffmpeg_path)
    }
}

impl Default for FfmpegFactory {
    fn default() -> Self {
        Self::from_options(&TranscodeOptions::default())
    }
}

impl ServiceFactory for FfmpegFactory {
    type Service = FfmpegService;

    fn create(&self) -> Result<FfmpegService> {
        Ok(FfmpegService::new(&self.program))
    }
}
