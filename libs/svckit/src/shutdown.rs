use std::fmt;

use anyhow::Result;

/// Which process signal ended the wait; the entry point logs it by name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
    Quit,
    Hangup,
}

impl ShutdownSignal {
    pub fn name(self) -> &'static str {
        match self {
            ShutdownSignal::Interrupt => "SIGINT",
            ShutdownSignal::Terminate => "SIGTERM",
            ShutdownSignal::Quit => "SIGQUIT",
            ShutdownSignal::Hangup => "SIGHUP",
        }
    }
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Block until the process receives a termination signal.
pub async fn wait_for_shutdown() -> Result<ShutdownSignal> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigint = signal(SignalKind::interrupt())?; // Ctrl+C
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigquit = signal(SignalKind::quit())?;
        let mut sighup = signal(SignalKind::hangup())?;
        let received = tokio::select! {
            _ = sigint.recv() => ShutdownSignal::Interrupt,
            _ = sigterm.recv() => ShutdownSignal::Terminate,
            _ = sigquit.recv() => ShutdownSignal::Quit,
            _ = sighup.recv() => ShutdownSignal::Hangup,
            _ = tokio::signal::ctrl_c() => ShutdownSignal::Interrupt, // fallback
        };
        Ok(received)
    }

    #[cfg(windows)]
    {
        use tokio::signal::windows::{ctrl_break, ctrl_c, ctrl_close, ctrl_shutdown};

        let mut c = ctrl_c()?;
        let mut br = ctrl_break()?;
        let mut cl = ctrl_close()?;
        let mut sh = ctrl_shutdown()?;
        let received = tokio::select! {
            _ = c.recv() => ShutdownSignal::Interrupt,
            _ = br.recv() => ShutdownSignal::Quit,
            _ = cl.recv() => ShutdownSignal::Hangup,
            _ = sh.recv() => ShutdownSignal::Terminate,
        };
        Ok(received)
    }
}
