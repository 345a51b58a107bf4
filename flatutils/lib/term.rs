//! Module containing terminal utilities

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Determines if the process is running in an interactive terminal environment
pub fn is_interactive_terminal() -> bool {
    // Check if stdin and stdout are TTYs
    let stdin_is_tty = unsafe { libc::isatty(libc::STDIN_FILENO) == 1 };
    let stdout_is_tty = unsafe { libc::isatty(libc::STDOUT_FILENO) == 1 };

    let is_tty = stdin_is_tty && stdout_is_tty;

    if is_tty && std::env::var("TERM").is_err() {
        tracing::debug!("detected TTY without TERM environment variable");
    }

    is_tty
}

/// Determines if the process is running in an interactive terminal that renders ANSI escapes.
///
/// A `TERM` of `dumb` opts out of styling even on a TTY.
pub fn is_ansi_interactive_terminal() -> bool {
    is_interactive_terminal() && std::env::var("TERM").map_or(true, |term| term != "dumb")
}
