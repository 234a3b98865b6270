use std::{
    env,
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
    time::Duration,
};

use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::{Child, ChildStderr, Command},
    time::timeout,
};
use tracing::{debug, trace};

/// Locate `program` the way a shell would: paths are taken as is, bare names are
/// searched on `PATH`.
pub fn find_program(program: &str) -> Option<PathBuf> {
    if program.contains('/') {
        let path = Path::new(program);
        return path.is_file().then(|| path.to_path_buf());
    }
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

pub(crate) fn cmd_program(program: &Path, args: &[String]) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(args.iter().map(|s| s.as_str()));
    cmd.stdin(Stdio::null());
    cmd.kill_on_drop(true);
    cmd
}

/// Forward the child's stderr to the diagnostic log.
pub(crate) fn forward_stderr(stderr: ChildStderr, label: String) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(target: "tcpw.exec.stderr", task = %label, %line);
        }
    })
}

/// Ask the child to terminate, then kill it if it is still alive after `grace`.
pub(crate) async fn stop_graceful(child: &mut Child, grace: Duration) -> std::io::Result<ExitStatus> {
    terminate(child);
    match timeout(grace, child.wait()).await {
        Ok(status) => status,
        Err(_) => {
            debug!(target: "tcpw.exec", pid = ?child.id(), grace_ms = grace.as_millis() as u64, "child ignored SIGTERM; killing");
            child.kill().await?;
            child.wait().await
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        fn terminate(child: &mut Child) {
            use nix::sys::signal::{Signal, kill};
            use nix::unistd::Pid;

            if let Some(id) = child.id() {
                trace!(target: "tcpw.exec", pid = id, "SIGTERM");
                let _ = kill(Pid::from_raw(id as i32), Signal::SIGTERM);
            }
        }
    } else {
        fn terminate(child: &mut Child) {
            trace!(target: "tcpw.exec", pid = ?child.id(), "no SIGTERM on this platform; killing");
            let _ = child.start_kill();
        }
    }
}
