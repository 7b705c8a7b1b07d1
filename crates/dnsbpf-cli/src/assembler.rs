//! External assembler driver
//!
//! Hands the rendered program to an assembler process on stdin and parses the
//! `count,code jt jf k,...` line it prints. The child is always waited on, so
//! it is reaped on the error paths as well.

use std::io::{self, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;

use dnsbpf_core::bytecode::{parse_bytecode, BytecodeError, SockFilter};

pub const DEFAULT_ASSEMBLER: &str = "bpf_asm";

#[derive(Debug, thiserror::Error)]
pub enum AssembleError {
    #[error("Failed to run assembler '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("Failed to feed program to assembler: {0}")]
    Stdin(#[source] io::Error),
    #[error("Assembler '{program}' failed ({status}): {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("Assembler produced malformed output: {0}")]
    Malformed(#[from] BytecodeError),
}

#[derive(Debug, Clone)]
pub struct Assembler {
    program: String,
    args: Vec<String>,
}

impl Assembler {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn assemble(&self, source: &str) -> Result<Vec<SockFilter>, AssembleError> {
        log::debug!("Running assembler '{}' {:?}", self.program, self.args);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| AssembleError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // Stdin is fed from its own thread while both output pipes are drained
        let stdin = child.stdin.take();
        let (written, output) = thread::scope(|scope| {
            let writer = scope.spawn(move || match stdin {
                // Dropping stdin closes the pipe so the assembler sees EOF
                Some(mut stdin) => stdin.write_all(source.as_bytes()),
                None => Ok(()),
            });
            let output = child.wait_with_output();
            let written = writer
                .join()
                .unwrap_or_else(|_| Err(io::Error::new(io::ErrorKind::Other, "stdin writer panicked")));
            (written, output)
        });

        let output = output.map_err(|source| AssembleError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            return Err(AssembleError::Failed {
                program: self.program.clone(),
                status: output.status,
                stderr,
            });
        }
        written.map_err(AssembleError::Stdin)?;

        if !stderr.is_empty() {
            log::warn!("Assembler '{}': {}", self.program, stderr);
        }

        let program = parse_bytecode(&String::from_utf8_lossy(&output.stdout))?;
        Ok(program)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    use dnsbpf_core::bytecode::{BytecodeError, SockFilter};

    use super::{AssembleError, Assembler};

    fn shell(script: &str) -> Assembler {
        Assembler::new("sh").args(["-c", script])
    }

    #[test]
    fn parses_assembler_output() {
        let program = shell("cat >/dev/null; echo '2,6 0 0 1,6 0 0 0'")
            .assemble("    ret #1\n")
            .expect("should assemble");
        assert_eq!(
            program,
            vec![
                SockFilter { code: 6, jt: 0, jf: 0, k: 1 },
                SockFilter { code: 6, jt: 0, jf: 0, k: 0 },
            ]
        );
    }

    #[test]
    fn feeds_program_on_stdin() {
        // Counts input lines and emits that many `ret #0` instructions
        let script = r#"n=$(wc -l | tr -d ' '); printf '%s' "$n"; i=0; while [ $i -lt $n ]; do printf ',6 0 0 0'; i=$((i+1)); done"#;
        let program = shell(script)
            .assemble("lb_0:\n    ret #0\n    ret #0\n")
            .expect("should assemble");
        assert_eq!(program.len(), 3);
    }

    #[test]
    fn missing_assembler_is_fatal() {
        let err = Assembler::new("/nonexistent/dnsbpf-assembler")
            .assemble("    ret #0\n")
            .unwrap_err();
        assert!(matches!(err, AssembleError::Spawn { .. }), "{err}");
    }

    #[test]
    fn nonzero_exit_is_fatal() {
        let err = shell("cat >/dev/null; echo 'syntax error' >&2; exit 3")
            .assemble("    bogus\n")
            .unwrap_err();
        match err {
            AssembleError::Failed { status, stderr, .. } => {
                assert_eq!(status.code(), Some(3));
                assert_eq!(stderr, "syntax error");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn large_program_through_echoing_assembler_does_not_stall() {
        // Well past a pipe buffer, echoed back while still being written
        let source = "    ret #0\n".repeat(20_000);
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let _ = tx.send(Assembler::new("cat").assemble(&source));
        });

        let result = rx
            .recv_timeout(Duration::from_secs(30))
            .expect("assembler driver stalled on a large program");
        assert!(matches!(
            result,
            Err(AssembleError::Malformed(BytecodeError::InvalidCount(_)))
        ));
    }

    #[test]
    fn malformed_output_is_fatal() {
        let err = shell("cat").assemble("    ret #0\n").unwrap_err();
        assert!(matches!(
            err,
            AssembleError::Malformed(BytecodeError::InvalidCount(_))
        ));

        let err = shell("cat >/dev/null").assemble("    ret #0\n").unwrap_err();
        assert!(matches!(err, AssembleError::Malformed(BytecodeError::Empty)));
    }
}
