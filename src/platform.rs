use anyhow::Result;
use crossbeam_channel::Sender;
use std::io::{self, Write};
use std::process;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread;

use crate::progress::Progress;

#[cfg(unix)]
use signal_hook::{consts::SIGINT, consts::SIGPIPE, consts::SIGTERM, consts::SIGUSR1, iterator::Signals};

#[cfg(windows)]
use signal_hook::{consts::SIGINT, flag};

/// Standard Unix exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    InvalidUsage = 2,
    SignalInt = 130,  // 128 + SIGINT (2)
    SignalPipe = 141, // 128 + SIGPIPE (13)
    SignalTerm = 143, // 128 + SIGTERM (15)
}

impl ExitCode {
    pub fn exit(self) -> ! {
        process::exit(self as i32)
    }
}

/// Exit code owed to the first shutdown signal, 0 while none has arrived
static SHUTDOWN_EXIT_CODE: AtomicU8 = AtomicU8::new(0);

/// Remember the exit code of the first shutdown signal; later ones are ignored
fn note_shutdown(code: ExitCode) {
    let _ = SHUTDOWN_EXIT_CODE.compare_exchange(
        0,
        code as u8,
        Ordering::Relaxed,
        Ordering::Relaxed,
    );
}

/// Control messages sent by the signal handler to the record reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ctrl {
    /// Stop pulling new records. In-flight records still complete.
    Shutdown { immediate: bool },
}

/// Signal handler for graceful shutdown
pub struct SignalHandler {
    _handle: thread::JoinHandle<()>,
}

impl SignalHandler {
    /// First SIGINT/SIGTERM asks for a graceful stop, the second exits.
    /// SIGUSR1 prints live progress to stderr.
    pub fn new(ctrl_sender: Sender<Ctrl>, progress: Progress) -> Result<Self> {
        #[cfg(unix)]
        {
            let mut signals = Signals::new([SIGINT, SIGPIPE, SIGTERM, SIGUSR1])?;

            let handle = thread::spawn(move || {
                let mut shutdown_count = 0;
                for sig in signals.forever() {
                    match sig {
                        SIGINT | SIGTERM => {
                            let code = if sig == SIGTERM {
                                ExitCode::SignalTerm
                            } else {
                                ExitCode::SignalInt
                            };
                            note_shutdown(code);
                            shutdown_count += 1;
                            let immediate = shutdown_count > 1;
                            if immediate {
                                code.exit();
                            }
                            eprintln!(
                                "{}",
                                crate::config::format_warning_message_auto(
                                    "Interrupted, finishing records already in flight..."
                                )
                            );
                            let _ = ctrl_sender.send(Ctrl::Shutdown { immediate });
                        }
                        SIGPIPE => {
                            // Broken pipe - exit quietly (normal for Unix pipes)
                            ExitCode::SignalPipe.exit();
                        }
                        SIGUSR1 => {
                            eprintln!(
                                "{}",
                                crate::config::format_info_message_auto(&progress.format_progress())
                            );
                        }
                        _ => {}
                    }
                }
            });

            Ok(SignalHandler { _handle: handle })
        }

        #[cfg(windows)]
        {
            let _ = progress;
            let term_flag = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
            flag::register(SIGINT, std::sync::Arc::clone(&term_flag))?;

            let handle = thread::spawn(move || {
                let mut shutdown_count = 0;
                loop {
                    thread::sleep(std::time::Duration::from_millis(100));
                    if term_flag.swap(false, Ordering::Relaxed) {
                        note_shutdown(ExitCode::SignalInt);
                        shutdown_count += 1;
                        let immediate = shutdown_count > 1;
                        if immediate {
                            ExitCode::SignalInt.exit();
                        }
                        let _ = ctrl_sender.send(Ctrl::Shutdown { immediate });
                    }
                }
            });

            Ok(SignalHandler { _handle: handle })
        }
    }

    /// Exit code for a run that was stopped by a signal, if one arrived
    pub fn shutdown_exit_code() -> Option<ExitCode> {
        match SHUTDOWN_EXIT_CODE.load(Ordering::Relaxed) {
            0 => None,
            code if code == ExitCode::SignalTerm as u8 => Some(ExitCode::SignalTerm),
            _ => Some(ExitCode::SignalInt),
        }
    }
}

/// Stdout wrapper that exits quietly on a broken pipe
pub struct SafeStdout {
    stdout: io::Stdout,
}

impl SafeStdout {
    pub fn new() -> Self {
        Self {
            stdout: io::stdout(),
        }
    }

    pub fn writeln(&mut self, data: &str) -> Result<()> {
        match writeln!(self.stdout, "{}", data) {
            Ok(()) => Ok(()),
            Err(e) if is_broken_pipe(&e) => ExitCode::SignalPipe.exit(),
            Err(e) => Err(anyhow::anyhow!("Failed to write to stdout: {}", e)),
        }
    }
}

impl Default for SafeStdout {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for SafeStdout {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.stdout.write(buf) {
            Err(e) if is_broken_pipe(&e) => ExitCode::SignalPipe.exit(),
            other => other,
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.stdout.flush() {
            Err(e) if is_broken_pipe(&e) => ExitCode::SignalPipe.exit(),
            other => other,
        }
    }
}

/// Cross-platform broken pipe detection
fn is_broken_pipe(e: &io::Error) -> bool {
    #[cfg(windows)]
    {
        e.kind() == io::ErrorKind::BrokenPipe
            || e.raw_os_error() == Some(232) // ERROR_NO_DATA
            || e.raw_os_error() == Some(109) // ERROR_BROKEN_PIPE
    }
    #[cfg(not(windows))]
    {
        e.kind() == io::ErrorKind::BrokenPipe
    }
}
