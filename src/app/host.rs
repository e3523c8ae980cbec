use crate::config::SESSION_ENV;
use crate::continuity::RestartHost;
use std::ffi::OsString;
use std::process::Command;

/// Restart host for the native binary. A restart request only raises a flag; the
/// event loop notices it, winds down, and `relaunch` replaces the process.
#[derive(Debug, Default)]
pub struct ProcessHost {
    requested: bool,
}

impl ProcessHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn restart_pending(&self) -> bool {
        self.requested
    }
}

impl RestartHost for ProcessHost {
    fn request_restart(&mut self) {
        if !self.requested {
            log::info!("Process restart requested");
        }
        self.requested = true;
    }
}

fn relaunch_command(session_id: &str) -> std::io::Result<Command> {
    let exe = std::env::current_exe()?;
    let args: Vec<OsString> = std::env::args_os().skip(1).collect();
    let mut command = Command::new(exe);
    command.args(args).env(SESSION_ENV, session_id);
    Ok(command)
}

/// Re-executes the current binary with the same arguments, carrying the session id
/// in the environment. On unix this only returns on failure.
#[cfg(unix)]
pub fn relaunch(session_id: &str) -> std::io::Result<()> {
    use std::os::unix::process::CommandExt;

    let mut command = relaunch_command(session_id)?;
    log::info!("🔄 Relaunching session {}", session_id);
    Err(command.exec())
}

#[cfg(not(unix))]
pub fn relaunch(session_id: &str) -> std::io::Result<()> {
    let mut command = relaunch_command(session_id)?;
    log::info!("🔄 Relaunching session {}", session_id);
    command.spawn()?;
    Ok(())
}
