//! Turns the current process into a background daemon.

use log::debug;
use std::ffi::CString;
use std::io;

/// Which side of the detach the caller ended up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkRole {
    /// The original process. Carries the pid of the intermediate child, which has already been
    /// reaped.
    Parent(i32),
    /// The detached grandchild: new session, no controlling terminal, cwd `/`, stdio on
    /// `/dev/null`.
    Daemon,
}

fn check(rc: libc::c_int) -> io::Result<libc::c_int> {
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(rc)
    }
}

/// Double-forks into the background.
///
/// Must not be called while a tokio runtime (or any other thread) is alive: only the calling
/// thread survives a fork.
pub fn detach() -> io::Result<ForkRole> {
    // SAFETY: the process is single-threaded here, so the child may keep running Rust code.
    let child = check(unsafe { libc::fork() })?;
    if child > 0 {
        let mut status: libc::c_int = 0;
        // SAFETY: child is our own child process.
        unsafe { libc::waitpid(child, &mut status, 0) };
        debug!("Intermediate child {} exited", child);
        return Ok(ForkRole::Parent(child));
    }

    // Intermediate child: leave the terminal's session, then fork again so the daemon can never
    // reacquire a controlling terminal.
    // SAFETY: _exit skips atexit handlers and destructors belonging to the parent.
    if check(unsafe { libc::setsid() }).is_err() {
        unsafe { libc::_exit(1) }
    }
    match check(unsafe { libc::fork() }) {
        Ok(0) => {}
        // SAFETY: see above.
        _ => unsafe { libc::_exit(0) },
    }

    let root = CString::new("/").map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    // SAFETY: root is a valid NUL-terminated string.
    check(unsafe { libc::chdir(root.as_ptr()) })?;
    unsafe { libc::umask(0o022) };

    redirect_stdio()?;
    Ok(ForkRole::Daemon)
}

fn redirect_stdio() -> io::Result<()> {
    let dev_null =
        CString::new("/dev/null").map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    // SAFETY: dev_null is a valid NUL-terminated string.
    let fd = check(unsafe { libc::open(dev_null.as_ptr(), libc::O_RDWR) })?;
    for target in [libc::STDIN_FILENO, libc::STDOUT_FILENO, libc::STDERR_FILENO] {
        // SAFETY: fd is an open descriptor and target is one of the standard descriptors.
        check(unsafe { libc::dup2(fd, target) })?;
    }
    if fd > libc::STDERR_FILENO {
        // SAFETY: fd was opened above and is no longer needed.
        unsafe { libc::close(fd) };
    }
    Ok(())
}
