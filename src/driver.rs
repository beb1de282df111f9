//! Interactive subprocess sessions on a pseudo-terminal.
//!
//! The toolkit scripts ask questions (`Proceed anyway?`, password prompts)
//! and report results as free-form text, and several only do so on a tty.
//! Each stage therefore runs its tool on a pty, waits for one of a fixed
//! set of patterns in the output stream, and answers over the same channel.
//!
//! Output is drained by a reader thread into a channel; `expect` folds the
//! chunks into a transcript and re-checks every candidate pattern after
//! each chunk, so ordering and timeout semantics stay exact no matter how
//! the tool buffers its writes.

use std::io::{self, Read, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use crossterm::tty::IsTty;
use portable_pty::{native_pty_system, Child, CommandBuilder, ExitStatus, MasterPty, PtySize};
use regex::Regex;

use crate::error::Error;
use crate::reaper::CancelToken;

const POLL_TICK: Duration = Duration::from_millis(50);

/// One expected outcome in a subprocess's output stream.
pub enum Expect {
    /// Literal substring.
    Text(String),
    /// Regular expression.
    Pattern(Regex),
    /// The subprocess closed its output.
    Eof,
}

impl Expect {
    pub fn text(text: impl Into<String>) -> Self {
        Expect::Text(text.into())
    }

    pub fn pattern(pattern: &str) -> Result<Self, Error> {
        Ok(Expect::Pattern(Regex::new(pattern)?))
    }
}

/// A successful `expect`.
#[derive(Debug)]
pub struct Match {
    /// Index into the pattern list that was passed to `expect`.
    pub index: usize,
    /// Unconsumed output that preceded the match.
    pub before: String,
    /// The matched text itself (empty for EOF).
    pub text: String,
}

/// Exclusive owner of one spawned subprocess.
///
/// Dropping a session reaps the child if it is still running, so a stage
/// can never leak its tool past its own return.
pub struct Session {
    child: Box<dyn Child + Send + Sync>,
    writer: Box<dyn Write + Send>,
    rx: Receiver<Vec<u8>>,
    seen: String,
    cursor: usize,
    eof: bool,
    cancel: CancelToken,
    // Keeps the pty open for the lifetime of the session.
    _master: Box<dyn MasterPty + Send>,
}

impl Session {
    /// Spawn `argv` on a fresh pty and start draining its output.
    pub fn spawn(argv: &[String], cancel: CancelToken) -> Result<Self, Error> {
        let Some(program) = argv.first() else {
            return Err(Error::Spawn("an empty command".to_string()));
        };
        let display = argv.join(" ");

        let pty = native_pty_system();
        let pair = pty
            .openpty(PtySize {
                rows: 24,
                cols: 80,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| Error::Spawn(format!("{display}: {e}")))?;

        let mut cmd = CommandBuilder::new(program);
        cmd.args(&argv[1..]);
        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| Error::Spawn(format!("{display}: {e}")))?;
        drop(pair.slave);

        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| Error::Spawn(format!("{display}: {e}")))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| Error::Spawn(format!("{display}: {e}")))?;

        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut buf = [0u8; 4096];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Ok(Session {
            child,
            writer,
            rx,
            seen: String::new(),
            cursor: 0,
            eof: false,
            cancel,
            _master: pair.master,
        })
    }

    /// Block until one of `patterns` appears in the output stream, the
    /// stream closes, the timeout elapses, or the run is cancelled.
    ///
    /// The pattern whose match starts earliest in the stream wins; ties go
    /// to the earlier list position. `Expect::Eof` only matches once the
    /// stream is closed and no textual pattern matched before that.
    pub fn expect(
        &mut self,
        patterns: &[Expect],
        timeout: Option<Duration>,
    ) -> Result<Match, Error> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            self.pump();
            if let Some(matched) = self.scan(patterns) {
                return Ok(matched);
            }
            if self.eof {
                let eof_index = patterns.iter().position(|p| matches!(p, Expect::Eof));
                return match eof_index {
                    Some(index) => {
                        let before = self.seen[self.cursor..].to_string();
                        self.cursor = self.seen.len();
                        Ok(Match {
                            index,
                            before,
                            text: String::new(),
                        })
                    }
                    None => Err(Error::UnexpectedEof),
                };
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(Error::Timeout(timeout.unwrap_or_default()));
                }
            }
            match self.rx.recv_timeout(POLL_TICK) {
                Ok(chunk) => self.ingest(&chunk),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => self.eof = true,
            }
        }
    }

    /// Write a line into the subprocess's input, answering a prompt.
    pub fn send_line(&mut self, text: &str) -> Result<(), Error> {
        self.writer.write_all(text.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Stream the rest of the subprocess's output to the operator until it
    /// closes the channel, then reap it.
    pub fn forward_to_eof(&mut self) -> Result<ExitStatus, Error> {
        let mut stdout = io::stdout();
        stdout.write_all(self.seen[self.cursor..].as_bytes())?;
        stdout.flush()?;
        self.cursor = self.seen.len();
        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            match self.rx.recv_timeout(POLL_TICK) {
                Ok(chunk) => {
                    stdout.write_all(&chunk)?;
                    stdout.flush()?;
                    self.ingest(&chunk);
                    self.cursor = self.seen.len();
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.eof = true;
        Ok(self.child.wait()?)
    }

    /// Silently drain the remaining output and wait for the exit status.
    pub fn wait(&mut self) -> Result<ExitStatus, Error> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            match self.rx.recv_timeout(POLL_TICK) {
                Ok(chunk) => self.ingest(&chunk),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.eof = true;
        self.cursor = self.seen.len();
        Ok(self.child.wait()?)
    }

    /// Best-effort kill for a subprocess a stage is abandoning.
    pub fn terminate(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }

    /// Everything the subprocess has written so far.
    pub fn output(&self) -> &str {
        &self.seen
    }

    /// Hand the terminal to the subprocess until it exits.
    ///
    /// Keystrokes are forwarded raw, output is pumped as it arrives. When
    /// stdin is not a terminal (pipes, batch runs) keystroke forwarding is
    /// skipped and the call reduces to output pass-through.
    pub fn interact(&mut self) -> Result<ExitStatus, Error> {
        if !io::stdin().is_tty() {
            return self.forward_to_eof();
        }
        terminal::enable_raw_mode()?;
        let pumped = self.interact_loop();
        terminal::disable_raw_mode()?;
        pumped?;
        Ok(self.child.wait()?)
    }

    fn interact_loop(&mut self) -> Result<(), Error> {
        let mut stdout = io::stdout();
        stdout.write_all(self.seen[self.cursor..].as_bytes())?;
        stdout.flush()?;
        self.cursor = self.seen.len();
        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            loop {
                match self.rx.try_recv() {
                    Ok(chunk) => {
                        stdout.write_all(&chunk)?;
                        self.ingest(&chunk);
                        self.cursor = self.seen.len();
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        self.eof = true;
                        break;
                    }
                }
            }
            stdout.flush()?;
            if self.eof {
                return Ok(());
            }
            if event::poll(Duration::from_millis(20))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Release {
                        if let Some(bytes) = key_to_bytes(key.code, key.modifiers) {
                            self.writer.write_all(&bytes)?;
                            self.writer.flush()?;
                        }
                    }
                }
            }
        }
    }

    fn ingest(&mut self, chunk: &[u8]) {
        self.seen.push_str(&String::from_utf8_lossy(chunk));
    }

    fn pump(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(chunk) => self.ingest(&chunk),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.eof = true;
                    break;
                }
            }
        }
    }

    fn scan(&mut self, patterns: &[Expect]) -> Option<Match> {
        let haystack = &self.seen[self.cursor..];
        let mut best: Option<(usize, usize, usize)> = None;
        for (index, pattern) in patterns.iter().enumerate() {
            let found = match pattern {
                Expect::Text(text) => haystack.find(text.as_str()).map(|s| (s, s + text.len())),
                Expect::Pattern(re) => re.find(haystack).map(|m| (m.start(), m.end())),
                Expect::Eof => continue,
            };
            if let Some((start, end)) = found {
                let earlier = match best {
                    None => true,
                    Some((best_start, _, _)) => start < best_start,
                };
                if earlier {
                    best = Some((start, end, index));
                }
            }
        }
        let (start, end, index) = best?;
        let matched = Match {
            index,
            before: haystack[..start].to_string(),
            text: haystack[start..end].to_string(),
        };
        self.cursor += end;
        Some(matched)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

fn key_to_bytes(code: KeyCode, modifiers: KeyModifiers) -> Option<Vec<u8>> {
    match code {
        KeyCode::Char(c) => {
            if modifiers.contains(KeyModifiers::CONTROL) && c.is_ascii_alphabetic() {
                Some(vec![(c.to_ascii_uppercase() as u8) & 0x1f])
            } else {
                let mut buf = [0u8; 4];
                Some(c.encode_utf8(&mut buf).as_bytes().to_vec())
            }
        }
        KeyCode::Enter => Some(vec![b'\r']),
        KeyCode::Tab => Some(vec![b'\t']),
        KeyCode::Backspace => Some(vec![0x7f]),
        KeyCode::Esc => Some(vec![0x1b]),
        KeyCode::Up => Some(b"\x1b[A".to_vec()),
        KeyCode::Down => Some(b"\x1b[B".to_vec()),
        KeyCode::Right => Some(b"\x1b[C".to_vec()),
        KeyCode::Left => Some(b"\x1b[D".to_vec()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[test]
    fn earliest_pattern_in_the_stream_wins() {
        let cancel = CancelToken::new();
        let mut session = Session::spawn(&sh("printf 'one two\\n'"), cancel).unwrap();
        // Let both candidates land in the buffer before the call.
        thread::sleep(Duration::from_millis(200));
        let matched = session
            .expect(
                &[Expect::text("two"), Expect::text("one")],
                Some(Duration::from_secs(5)),
            )
            .unwrap();
        assert_eq!(matched.index, 1);
        assert_eq!(matched.text, "one");
        session.wait().unwrap();
    }

    #[test]
    fn bounded_timeout_never_hangs() {
        let cancel = CancelToken::new();
        let mut session = Session::spawn(&sh("sleep 5"), cancel).unwrap();
        let started = Instant::now();
        let err = session
            .expect(&[Expect::text("never")], Some(Duration::from_millis(300)))
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(2));
        session.terminate();
    }

    #[test]
    fn empty_pattern_set_still_times_out() {
        let cancel = CancelToken::new();
        let mut session = Session::spawn(&sh("sleep 5"), cancel).unwrap();
        let err = session
            .expect(&[], Some(Duration::from_millis(300)))
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        session.terminate();
    }

    #[test]
    fn eof_pattern_matches_when_the_stream_closes() {
        let cancel = CancelToken::new();
        let mut session = Session::spawn(&sh("printf 'leftover'"), cancel).unwrap();
        let matched = session
            .expect(&[Expect::Eof], Some(Duration::from_secs(5)))
            .unwrap();
        assert_eq!(matched.index, 0);
        assert!(matched.before.contains("leftover"));
        session.wait().unwrap();
    }

    #[test]
    fn eof_without_an_eof_pattern_is_an_error() {
        let cancel = CancelToken::new();
        let mut session = Session::spawn(&sh("true"), cancel).unwrap();
        let err = session
            .expect(&[Expect::text("never")], Some(Duration::from_secs(5)))
            .unwrap_err();
        assert!(matches!(err, Error::UnexpectedEof));
    }

    #[test]
    fn send_line_answers_prompts() {
        let cancel = CancelToken::new();
        let mut session = Session::spawn(
            &sh("printf 'proceed? '; read answer; echo \"answered:$answer\""),
            cancel,
        )
        .unwrap();
        session
            .expect(&[Expect::text("proceed?")], Some(Duration::from_secs(5)))
            .unwrap();
        session.send_line("y").unwrap();
        let matched = session
            .expect(&[Expect::text("answered:y")], Some(Duration::from_secs(5)))
            .unwrap();
        assert_eq!(matched.index, 0);
        session.wait().unwrap();
    }

    #[test]
    fn regex_patterns_capture_the_matched_text() {
        let cancel = CancelToken::new();
        let mut session =
            Session::spawn(&sh("echo 'Database Image ID: 42'"), cancel).unwrap();
        let matched = session
            .expect(
                &[Expect::pattern(r"Database Image ID: .*\n").unwrap()],
                Some(Duration::from_secs(5)),
            )
            .unwrap();
        assert!(matched.text.starts_with("Database Image ID: 42"));
        session.wait().unwrap();
    }

    #[test]
    fn cancellation_interrupts_expect() {
        let cancel = CancelToken::new();
        let mut session = Session::spawn(&sh("sleep 5"), cancel).unwrap();
        cancel.cancel();
        let err = session.expect(&[Expect::text("never")], None).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        session.terminate();
    }
}
