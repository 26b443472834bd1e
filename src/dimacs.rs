//! Strict byte-level DIMACS CNF reader with transparent decompression.
//!
//! `.xz` and `.gz` paths are piped through the system `xz`/`gzip`
//! binaries; everything else is read as plain text. The grammar is
//! enforced byte by byte: integers may not carry leading zeros, `-0` and
//! empty clauses are rejected, and nothing but comments may precede the
//! one `p cnf` header. After the last byte the clause count and the
//! highest variable seen must match the header exactly.

use std::{
    fs::File,
    io::Read,
    process::{Child, Command, Stdio},
};

use thiserror::Error;

use crate::solver::store::Lit;

/// Destination for a parsed problem instance
pub trait CnfSink {
    /// Size every per-variable structure for `count` variables
    fn create_variables(&mut self, count: usize);
    /// Feed one clause; `false` means the instance is already
    /// unsatisfiable and loading may stop
    fn add_clause(&mut self, lits: &[Lit]) -> bool;
}

/// Everything that can go wrong while loading an instance
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to open file \"{path}\" using plain text mode.")]
    OpenFile { path: String },

    #[error("Failed to decompress file \"{path}\" using \"{tool}\".")]
    OpenPipe { path: String, tool: &'static str },

    #[error("Failed to read from file or pipe.")]
    Read,

    #[error("Failed to parse cnf file.")]
    Syntax,

    #[error("Number of variables in cnf incorrect.")]
    WrongVariableCount,

    #[error("Number of clauses in cnf incorrect.")]
    WrongClauseCount,
}

/// Parser position within a line
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum State {
    /// At the start of a line
    LineStart,
    /// Only a line break may follow
    LineBreak,
    /// Inside a `c` comment
    Comment,
    /// Matching the literal header prefix; index into `HEADER_TAG`
    HeaderTag(usize),
    /// First digit (1-9) of the variable count
    VarCountFirst,
    /// Further digits of the variable count, or the separating space
    VarCount,
    /// First digit (1-9) of the clause count
    ClauseCountFirst,
    /// Further digits of the clause count, or the line break
    ClauseCount,
    /// First digit (1-9) of a literal
    LitFirst,
    /// Further digits of a literal, or the separating space
    LitDigits,
    /// Between literals: `-`, the terminating `0`, or a first digit
    LitNext,
}

const HEADER_TAG: &[u8] = b"p cnf ";

/// Append a decimal digit to an accumulating integer; saturation turns
/// absurd inputs into an ordinary header-check failure downstream
fn push_digit(value: usize, byte: u8) -> usize {
    value
        .saturating_mul(10)
        .saturating_add(usize::from(byte - b'0'))
}

/// Run the state machine over `input`, feeding clauses into `sink`.
///
/// `Ok(true)` means the instance loaded completely and matched its
/// header; `Ok(false)` means the sink reported unsatisfiability and the
/// rest of the input was skipped, header checks included.
pub fn load_reader<R: Read>(mut input: R, sink: &mut impl CnfSink) -> Result<bool, LoadError> {
    let mut state = State::LineStart;
    let mut seen_header = false;
    let mut header_vars = 0usize;
    let mut header_clauses = 0usize;
    let mut max_var = 0usize;
    let mut clauses_read = 0usize;
    let mut clause: Vec<Lit> = Vec::new();
    let mut magnitude = 0usize;
    let mut positive = true;

    let mut buffer = [0u8; 4096];
    loop {
        let got = input.read(&mut buffer).map_err(|_| LoadError::Read)?;
        if got == 0 {
            break;
        }

        for &byte in &buffer[..got] {
            match state {
                State::LineStart => match byte {
                    b'\n' | b'\r' => {}
                    b'p' if !seen_header => {
                        seen_header = true;
                        state = State::HeaderTag(1);
                    }
                    b'c' => state = State::Comment,
                    b'-' if seen_header => {
                        positive = false;
                        state = State::LitFirst;
                        clause.clear();
                        clauses_read += 1;
                    }
                    b'1'..=b'9' if seen_header => {
                        magnitude = usize::from(byte - b'0');
                        positive = true;
                        state = State::LitDigits;
                        clause.clear();
                        clauses_read += 1;
                    }
                    _ => return Err(LoadError::Syntax),
                },

                State::LineBreak => match byte {
                    b'\n' | b'\r' => state = State::LineStart,
                    _ => return Err(LoadError::Syntax),
                },

                State::Comment => {
                    if byte == b'\n' || byte == b'\r' {
                        state = State::LineStart;
                    }
                }

                State::HeaderTag(at) => {
                    if byte != HEADER_TAG[at] {
                        return Err(LoadError::Syntax);
                    }
                    state = if at + 1 == HEADER_TAG.len() {
                        State::VarCountFirst
                    } else {
                        State::HeaderTag(at + 1)
                    };
                }

                State::VarCountFirst => match byte {
                    b'1'..=b'9' => {
                        header_vars = usize::from(byte - b'0');
                        state = State::VarCount;
                    }
                    _ => return Err(LoadError::Syntax),
                },

                State::VarCount => match byte {
                    b' ' => state = State::ClauseCountFirst,
                    b'0'..=b'9' => header_vars = push_digit(header_vars, byte),
                    _ => return Err(LoadError::Syntax),
                },

                State::ClauseCountFirst => match byte {
                    b'1'..=b'9' => {
                        header_clauses = usize::from(byte - b'0');
                        state = State::ClauseCount;
                    }
                    _ => return Err(LoadError::Syntax),
                },

                State::ClauseCount => match byte {
                    b'\n' | b'\r' => {
                        sink.create_variables(header_vars);
                        state = State::LineStart;
                    }
                    b'0'..=b'9' => {
                        header_clauses = push_digit(header_clauses, byte);
                    }
                    _ => return Err(LoadError::Syntax),
                },

                State::LitFirst => match byte {
                    b'1'..=b'9' => {
                        magnitude = usize::from(byte - b'0');
                        state = State::LitDigits;
                    }
                    _ => return Err(LoadError::Syntax),
                },

                State::LitDigits => match byte {
                    b' ' => {
                        // Variables beyond the header would index out of
                        // range in the sink; fail the header check now
                        if magnitude > header_vars {
                            return Err(LoadError::WrongVariableCount);
                        }
                        clause.push(Lit::new(magnitude - 1, positive));
                        max_var = max_var.max(magnitude);
                        positive = true;
                        state = State::LitNext;
                    }
                    b'0'..=b'9' => magnitude = push_digit(magnitude, byte),
                    _ => return Err(LoadError::Syntax),
                },

                State::LitNext => match byte {
                    b'-' => {
                        positive = false;
                        state = State::LitFirst;
                    }
                    b'0' => {
                        state = State::LineBreak;
                        if !sink.add_clause(&clause) {
                            return Ok(false);
                        }
                    }
                    b'1'..=b'9' => {
                        magnitude = usize::from(byte - b'0');
                        state = State::LitDigits;
                    }
                    _ => return Err(LoadError::Syntax),
                },
            }
        }
    }

    // The input must end on a completed line
    if state != State::LineStart {
        return Err(LoadError::Syntax);
    }
    if max_var != header_vars {
        return Err(LoadError::WrongVariableCount);
    }
    if clauses_read != header_clauses {
        return Err(LoadError::WrongClauseCount);
    }
    Ok(true)
}

enum Source {
    Plain(File),
    Pipe(Child),
}

fn open(path: &str) -> Result<Source, LoadError> {
    if path.ends_with(".xz") {
        spawn_filter("xz", path)
    } else if path.ends_with(".gz") {
        spawn_filter("gzip", path)
    } else {
        match File::open(path) {
            Ok(file) => Ok(Source::Plain(file)),
            Err(_) => Err(LoadError::OpenFile {
                path: path.to_owned(),
            }),
        }
    }
}

fn spawn_filter(tool: &'static str, path: &str) -> Result<Source, LoadError> {
    match Command::new(tool)
        .args(["-dc", path])
        .stdout(Stdio::piped())
        .spawn()
    {
        Ok(child) => Ok(Source::Pipe(child)),
        Err(_) => Err(LoadError::OpenPipe {
            path: path.to_owned(),
            tool,
        }),
    }
}

/// Load `path` (`.cnf`, `.cnf.gz`, or `.cnf.xz`) into `sink`.
/// The boolean result mirrors [`load_reader`].
pub fn load_path(path: &str, sink: &mut impl CnfSink) -> Result<bool, LoadError> {
    match open(path)? {
        Source::Plain(file) => load_reader(file, sink),
        Source::Pipe(mut child) => {
            let Some(stdout) = child.stdout.take() else {
                return Err(LoadError::Read);
            };
            match load_reader(stdout, sink) {
                Ok(true) => {
                    // A decompressor failing mid-stream can still leave a
                    // parseable prefix; its exit status is the authority
                    let status = child.wait().map_err(|_| LoadError::Read)?;
                    if status.success() {
                        Ok(true)
                    } else {
                        Err(LoadError::Read)
                    }
                }
                outcome => {
                    // Early stop or parse failure leaves the pipe
                    // mid-stream; reap the decompressor without draining
                    let _ = child.kill();
                    let _ = child.wait();
                    outcome
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sink that records the instance verbatim
    #[derive(Debug, Default)]
    struct Recorder {
        vars: usize,
        clauses: Vec<Vec<Lit>>,
        reject_after: Option<usize>,
    }

    impl CnfSink for Recorder {
        fn create_variables(&mut self, count: usize) {
            self.vars = count;
        }

        fn add_clause(&mut self, lits: &[Lit]) -> bool {
            self.clauses.push(lits.to_vec());
            self.reject_after.is_none_or(|n| self.clauses.len() < n)
        }
    }

    fn parse(input: &str) -> Result<(Recorder, bool), LoadError> {
        let mut sink = Recorder::default();
        let complete = load_reader(input.as_bytes(), &mut sink)?;
        Ok((sink, complete))
    }

    #[test]
    fn accepts_a_plain_instance() {
        let (sink, complete) = parse("p cnf 3 2\n1 -2 0\n2 3 0\n").expect("well-formed");
        assert!(complete);
        assert_eq!(sink.vars, 3);
        assert_eq!(
            sink.clauses,
            vec![
                vec![Lit::new(0, true), Lit::new(1, false)],
                vec![Lit::new(1, true), Lit::new(2, true)],
            ]
        );
    }

    #[test]
    fn accepts_comments_and_carriage_returns() {
        let input = "c head\r\np cnf 2 1\r\nc between\r\n1 2 0\r\n";
        let (sink, complete) = parse(input).expect("well-formed");
        assert!(complete);
        assert_eq!(sink.clauses.len(), 1);
    }

    #[test]
    fn stops_once_the_sink_reports_unsat() {
        let mut sink = Recorder {
            reject_after: Some(1),
            ..Recorder::default()
        };
        // The bad trailing line is never reached
        let complete =
            load_reader("p cnf 2 9\n1 0\n2 0\njunk\n".as_bytes(), &mut sink).expect("stops early");
        assert!(!complete);
        assert_eq!(sink.clauses.len(), 1);
    }

    #[test]
    fn rejects_malformed_bytes() {
        let cases = [
            "1 0\n",                      // clause before header
            "p cnf 1 1\n0\n",             // empty clause
            "p cnf 1 1\n01 0\n",          // leading zero in a literal
            "p cnf 1 1\n-0 0\n",          // negative zero
            "p cnf 1 1\n--1 0\n",         // doubled minus
            "p cnf 1 1\n1  0\n",          // doubled separator
            "p cnf 1 1\n1 0",             // missing final line break
            "p cnf 1 1\n1 0 \n",          // trailing junk after the terminator
            "p cnf 01 1\n1 0\n",          // leading zero in the header
            "p dnf 1 1\n1 0\n",           // wrong format tag
            "p cnf 1 1\np cnf 1 1\n1 0\n", // second header
            "q cnf 1 1\n1 0\n",           // junk before the header
        ];
        for case in cases {
            assert!(
                matches!(parse(case), Err(LoadError::Syntax)),
                "accepted {case:?}"
            );
        }
    }

    #[test]
    fn rejects_header_count_mismatches() {
        assert!(matches!(
            parse("p cnf 2 1\n1 0\n2 0\n"),
            Err(LoadError::WrongClauseCount)
        ));
        assert!(matches!(
            parse("p cnf 3 1\n1 2 0\n"),
            Err(LoadError::WrongVariableCount)
        ));
        assert!(matches!(
            parse("p cnf 1 1\n1 2 0\n"),
            Err(LoadError::WrongVariableCount)
        ));
    }

    #[test]
    fn an_all_comment_file_is_an_empty_instance() {
        let (sink, complete) = parse("c nothing here\nc at all\n").expect("benign");
        assert!(complete);
        assert_eq!(sink.vars, 0);
        assert!(sink.clauses.is_empty());
    }
}
