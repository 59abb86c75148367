// Copyright 2019-2023 Tauri Programme within The Commons Conservancy
// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Subprocess plumbing for the two external collaborators named in the
//! external-interfaces contract: the Debian package-field reader
//! (`dpkg-deb`) and the dynamic-symbol lister (`nm`).

use std::process::{Command, Output, Stdio};

pub trait CommandExt {
    /// Runs the command, capturing stdout/stderr, and returns an error if
    /// the process exited non-zero. Every invocation is traced at DEBUG.
    fn output_ok(&mut self) -> std::io::Result<Output>;
}

impl CommandExt for Command {
    fn output_ok(&mut self) -> std::io::Result<Output> {
        tracing::debug!(shell = ?self, "running command");
        self.stdout(Stdio::piped());
        self.stderr(Stdio::piped());

        let output = self.output()?;

        if output.status.success() {
            Ok(output)
        } else {
            tracing::debug!(
                stderr = %String::from_utf8_lossy(&output.stderr),
                status = ?output.status,
                "command exited with failure"
            );
            Err(std::io::Error::other(format!(
                "command exited with {:?}",
                output.status
            )))
        }
    }
}

/// Runs `cmd` and returns its stdout as a UTF-8 string, or `None` if the
/// binary isn't on `PATH` or the process fails. Used for collaborators that
/// are genuinely optional on a given host (e.g. `nm` when cross-inspecting
/// binaries for a foreign architecture).
pub(crate) fn capture_stdout(cmd: &mut Command) -> Option<String> {
    match cmd.output_ok() {
        Ok(output) => Some(String::from_utf8_lossy(&output.stdout).into_owned()),
        Err(e) => {
            tracing::debug!(error = %e, "external command unavailable");
            None
        }
    }
}
