//! Documentation viewers that need no browser integration.

use std::io::{self, Write};
use std::process::{Command, ExitStatus};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};

use halnav::DocsViewer;
use tracing::warn;

/// Prints `opening <uri>` to a writer (stdout by default).
pub struct PrintViewer<W: Write + Send> {
    out: Mutex<W>,
}

impl PrintViewer<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> PrintViewer<W> {
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out) }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|p| p.into_inner())
    }
}

impl<W: Write + Send> DocsViewer for PrintViewer<W> {
    fn open(&self, uri: &str) {
        let mut out = self.out.lock().unwrap_or_else(|p| p.into_inner());
        if let Err(e) = writeln!(out, "opening {uri}") {
            warn!("docs: cannot print {uri}: {e}");
        }
    }
}

/// Hands the URI to an external program such as `xdg-open`.
#[derive(Debug, Clone)]
pub struct CommandViewer {
    program: String,
}

impl CommandViewer {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }

    /// Start the program and reap it on a background thread once it exits.
    fn launch(&self, uri: &str) -> io::Result<JoinHandle<io::Result<ExitStatus>>> {
        let mut child = Command::new(&self.program).arg(uri).spawn()?;
        let program = self.program.clone();
        Ok(thread::spawn(move || {
            let status = child.wait();
            match &status {
                Ok(code) if !code.success() => warn!("docs: {program} exited with {code}"),
                Err(e) => warn!("docs: waiting for {program} failed: {e}"),
                Ok(_) => {}
            }
            status
        }))
    }
}

impl DocsViewer for CommandViewer {
    fn open(&self, uri: &str) {
        if let Err(e) = self.launch(uri) {
            warn!("docs: {} failed to open {uri}: {e}", self.program);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_viewer_writes_the_uri() {
        let viewer = PrintViewer::new(Vec::new());
        viewer.open("http://docs.example.com/rels/widgets");
        let printed = String::from_utf8(viewer.into_inner()).unwrap();
        assert_eq!(printed, "opening http://docs.example.com/rels/widgets\n");
    }

    #[cfg(unix)]
    #[test]
    fn command_viewer_reaps_its_child() {
        let viewer = CommandViewer::new("true");
        let waiter = viewer.launch("http://docs.example.com/rels/widgets").unwrap();
        assert!(waiter.join().unwrap().unwrap().success());
    }

    #[test]
    fn command_viewer_with_missing_program_does_not_panic() {
        let viewer = CommandViewer::new("halnav-no-such-viewer");
        assert!(viewer.launch("http://docs.example.com/").is_err());
        viewer.open("http://docs.example.com/");
    }
}
