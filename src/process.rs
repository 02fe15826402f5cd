//! Spawning external commands and collecting their exit codes.
//!
//! [`spawn`] never fails: a command that cannot be started is represented
//! by a [`ProcessHandle`] that already knows its exit code, so callers treat a bad
//! command name exactly like a command that ran and failed.

use std::borrow::Cow;
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};

/// Conventional process exit code: 0 for success, anything else for failure.
pub type ExitCode = i32;

/// Exit code reported when the executable cannot be found.
pub const NOT_FOUND: ExitCode = 127;

/// Exit code reported when the executable exists but cannot be started.
pub const CANNOT_EXECUTE: ExitCode = 126;

/// Exit code reported when the status of a started command cannot be collected.
pub const WAIT_FAILED: ExitCode = -1;

/// Start `args[0]` with the remaining words as its arguments.
///
/// The executable is looked up in this process's `PATH`. Stdin, stdout and stderr
/// are inherited.
pub fn spawn(args: Vec<String>) -> ProcessHandle {
    let Some(name) = args.first() else {
        tracing::warn!("refusing to spawn an empty argument list");
        return ProcessHandle::failed(args, NOT_FOUND);
    };

    let search_paths = std::env::var_os("PATH").unwrap_or_default();
    let Some(executable) =
        find_command_path(&search_paths, Path::new(name)).map(Cow::into_owned)
    else {
        tracing::warn!(command = %name, "command not found");
        return ProcessHandle::failed(args, NOT_FOUND);
    };

    let spawned = Command::new(&executable)
        .args(&args[1..])
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn();

    match spawned {
        Ok(child) => {
            tracing::debug!(pid = child.id(), executable = %executable.display(), "spawned");
            ProcessHandle {
                args,
                state: HandleState::Running(child),
            }
        }
        Err(err) => {
            let code = spawn_error_code(&err);
            tracing::warn!(command = %name, %err, code, "failed to start command");
            ProcessHandle::failed(args, code)
        }
    }
}

fn spawn_error_code(err: &io::Error) -> ExitCode {
    match err.kind() {
        io::ErrorKind::NotFound => NOT_FOUND,
        _ => CANNOT_EXECUTE,
    }
}

#[derive(Debug)]
enum HandleState {
    Running(Child),
    Failed(ExitCode),
}

/// One spawned command. Waiting consumes the handle, so it can be waited exactly once.
#[derive(Debug)]
pub struct ProcessHandle {
    args: Vec<String>,
    state: HandleState,
}

impl ProcessHandle {
    fn failed(args: Vec<String>, code: ExitCode) -> Self {
        Self {
            args,
            state: HandleState::Failed(code),
        }
    }

    /// Block until the command terminates and return its exit code.
    pub fn wait(self) -> ExitCode {
        self.finish().1
    }

    fn finish(self) -> (Vec<String>, ExitCode) {
        let code = match self.state {
            HandleState::Failed(code) => code,
            HandleState::Running(mut child) => match child.wait() {
                Ok(status) => exit_code(status),
                Err(err) => {
                    tracing::error!(pid = child.id(), %err, "failed to wait for command");
                    WAIT_FAILED
                }
            },
        };
        (self.args, code)
    }
}

fn exit_code(status: ExitStatus) -> ExitCode {
    match status.code() {
        Some(x) => x,
        None => terminated_by_signal(status),
    }
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&exit_status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&exit_status) {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> i32 {
    -1
}

/// Handles whose wait is deferred until the owning script runs out of lines.
#[derive(Debug, Default)]
pub struct ProcessGroup {
    handles: Vec<ProcessHandle>,
}

impl ProcessGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, handle: ProcessHandle) {
        self.handles.push(handle);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every handle in the order they were added.
    ///
    /// Waiting happens lazily as the iterator is advanced, so each code can be
    /// reported as soon as that command is done.
    pub fn drain(self) -> impl Iterator<Item = (Vec<String>, ExitCode)> {
        self.handles.into_iter().map(ProcessHandle::finish)
    }
}

/// Resolve a command path the way a typical shell would.
///
/// - Absolute path: returned if it exists.
/// - Relative with several components (`bin/tool`) or `./tool`: returned if it exists.
/// - Single component: the first executable file of that name in `search_paths` (PATH).
/// - Empty path: `None`.
pub fn find_command_path<'a>(search_paths: &OsStr, path: &'a Path) -> Option<Cow<'a, Path>> {
    if path.is_absolute() {
        return find_by_path(path).map(Cow::Borrowed);
    }

    let search_in_current_dir = cfg!(not(unix)) || path.starts_with("./");
    if search_in_current_dir && path.exists() {
        return Some(Cow::Borrowed(path));
    }

    let mut components = path.components();
    match (components.next(), components.next()) {
        (None, None) => None,
        (Some(x), None) => find_in_path(search_paths, x.as_os_str()).map(Cow::Owned),
        _ => find_by_path(path).map(Cow::Borrowed),
    }
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_paths)
        .map(|dir| dir.join(cmd))
        .find(|path| is_executable(path))
}

/// Like `execvp`, skip directories and files without an execute bit.
#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

fn find_by_path(path: &Path) -> Option<&Path> {
    if path.exists() { Some(path) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{Duration, Instant};

    fn argv(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("process_tests_{}_{}", std::process::id(), tag));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    #[test]
    #[cfg(unix)]
    fn success_and_failure_codes() {
        assert_eq!(spawn(argv(&["true"])).wait(), 0);
        assert_eq!(spawn(argv(&["false"])).wait(), 1);
        assert_eq!(spawn(argv(&["sh", "-c", "exit 3"])).wait(), 3);
    }

    #[test]
    fn unknown_command_is_an_exit_code() {
        let handle = spawn(argv(&["no-such-command-for-script-shell"]));
        assert_eq!(handle.wait(), NOT_FOUND);
    }

    #[test]
    #[cfg(unix)]
    fn non_executable_file_cannot_execute() {
        let dir = temp_dir("noexec");
        let file = dir.join("plain.txt");
        fs::write(&file, "not a program\n").expect("write file");

        let code = spawn(vec![file.to_string_lossy().to_string()]).wait();
        assert_eq!(code, CANNOT_EXECUTE);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    #[cfg(unix)]
    fn killed_by_signal() {
        let code = spawn(argv(&["sh", "-c", "kill -9 $$"])).wait();
        assert_eq!(code, 128 + 9);
    }

    #[test]
    #[cfg(unix)]
    fn group_drains_in_spawn_order() {
        let mut group = ProcessGroup::new();
        group.push(spawn(argv(&["sh", "-c", "sleep 0.3; exit 2"])));
        group.push(spawn(argv(&["true"])));
        group.push(spawn(argv(&["false"])));
        assert_eq!(group.len(), 3);

        let drained: Vec<(Vec<String>, ExitCode)> = group.drain().collect();
        let codes: Vec<ExitCode> = drained.iter().map(|(_, code)| *code).collect();
        assert_eq!(codes, vec![2, 0, 1]);
        assert_eq!(drained[1].0, argv(&["true"]));
    }

    #[test]
    #[cfg(unix)]
    fn group_members_run_concurrently() {
        let mut group = ProcessGroup::new();
        let started = Instant::now();
        for _ in 0..3 {
            group.push(spawn(argv(&["sleep", "0.5"])));
        }
        assert!(group.drain().all(|(_, code)| code == 0));
        assert!(started.elapsed() < Duration::from_millis(1400));
    }

    #[test]
    #[cfg(unix)]
    fn absolute_existing_and_missing() {
        let found = find_command_path(OsStr::new("/bin"), Path::new("/bin/sh"));
        assert_eq!(found.as_deref(), Some(Path::new("/bin/sh")));
        assert!(find_command_path(OsStr::new("/bin"), Path::new("/bin/nonexisting")).is_none());
    }

    #[test]
    #[cfg(unix)]
    fn single_component_searches_path() {
        let found = find_command_path(OsStr::new("/nowhere:/bin"), Path::new("sh"))
            .expect("sh should be in /bin");
        assert!(found.as_ref().starts_with("/bin"));
        assert!(find_command_path(OsStr::new("/bin"), Path::new("nonexisting")).is_none());
    }

    #[test]
    #[cfg(unix)]
    fn path_search_skips_directories_and_non_executables() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let base = temp_dir("path_search");
        let (as_dir, plain, runnable) = (base.join("a"), base.join("b"), base.join("c"));
        fs::create_dir_all(as_dir.join("tool"))?;
        fs::create_dir_all(&plain)?;
        fs::write(plain.join("tool"), "#!/bin/sh\n")?;
        fs::set_permissions(plain.join("tool"), fs::Permissions::from_mode(0o644))?;
        fs::create_dir_all(&runnable)?;
        fs::write(runnable.join("tool"), "#!/bin/sh\n")?;
        fs::set_permissions(runnable.join("tool"), fs::Permissions::from_mode(0o755))?;

        let search_paths = std::env::join_paths([&as_dir, &plain, &runnable])?;
        let found = find_command_path(&search_paths, Path::new("tool"));
        assert_eq!(found.as_deref(), Some(runnable.join("tool").as_path()));

        fs::remove_dir_all(base)?;
        Ok(())
    }

    #[test]
    fn empty_path_is_none() {
        assert!(find_command_path(OsStr::new("/bin"), Path::new("")).is_none());
    }
}
