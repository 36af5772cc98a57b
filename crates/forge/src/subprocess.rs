use std::collections::HashMap as StdHashMap;
use std::path::Path;
use std::process::Command;

use forge_core::error::{Error, Result};

/// `environment_vars`, if set, replaces the child's environment entirely rather than
/// extending the caller's -- matching the original's "either inherit everything or
/// specify everything" split. `wait_for_exit` defaults to `true` in
/// [`start_process`] when no options are given.
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    pub environment_vars: Option<StdHashMap<String, String>>,
    pub wait_for_exit: bool,
}

impl ProcessOptions {
    pub fn new() -> Self {
        ProcessOptions { environment_vars: None, wait_for_exit: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub exit_code: i32,
    pub has_exited: bool,
}

/// Spawns `path` with `args`. If `options` is `None` or leaves `wait_for_exit` unset,
/// the call blocks until the child exits and returns its real exit code; otherwise it
/// returns immediately with `has_exited: false`.
///
/// The original spawns via `fork`/`execve` behind a self-pipe so a failed `execve`
/// (e.g. a non-executable file) is reported back to the parent instead of silently
/// exiting the forked child. `std::process::Command::spawn` already does this on
/// POSIX -- a failed exec surfaces as an `io::Error` from `spawn` itself -- so no
/// pipe plumbing is needed here.
pub fn start_process(path: &Path, args: &[String], options: Option<ProcessOptions>) -> Result<ProcessOutcome> {
    if !path.exists() {
        return Err(Error::NotFound);
    }
    let options = options.unwrap_or_else(|| ProcessOptions { wait_for_exit: true, ..ProcessOptions::new() });

    let mut command = Command::new(path);
    command.args(args);
    if let Some(env) = &options.environment_vars {
        command.env_clear();
        command.envs(env);
    }

    let mut child = command.spawn().map_err(|e| match e.raw_os_error() {
        Some(libc::EACCES) | Some(libc::EPERM) => Error::AccessDenied,
        Some(libc::ENOENT) => Error::NotFound,
        _ => Error::PlatformDependent,
    })?;

    if !options.wait_for_exit {
        return Ok(ProcessOutcome { exit_code: 0, has_exited: false });
    }
    let status = child.wait().map_err(|_| Error::PlatformDependent)?;
    Ok(ProcessOutcome { exit_code: status.code().unwrap_or(-1), has_exited: true })
}
