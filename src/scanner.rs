//! Streaming scanners for concatenated PGN databases.
//!
//! [`Scanner`] is modeled on a line-oriented state machine: it slices the
//! input into tag-pair/move-list records and decodes one game per call,
//! which makes it suitable for very large database files that can't be read
//! whole. [`ParallelScanner`] runs the same tokenizer on the reading thread
//! and fans the sliced records out to a pool of decoder threads; ordering
//! across games is not preserved.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;

use crate::game::Game;
use crate::pgn;
use crate::types::ChessError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ScanState {
    NotInGame,
    InTagPairs,
    InMoves,
}

// =========================================================================
// Sequential scanner
// =========================================================================

/// Reads chess games from concatenated PGN text, one game per call.
pub struct Scanner<R: BufRead> {
    reader: R,
    done: bool,
}

impl<R: BufRead> Scanner<R> {
    pub fn new(reader: R) -> Self {
        Scanner {
            reader,
            done: false,
        }
    }

    /// Scan forward until one complete game has been sliced out and decoded.
    ///
    /// Returns `Ok(None)` on clean end of input. A decode error consumes the
    /// bad game's text, so scanning can continue with the next call — one
    /// corrupt game does not abort the stream.
    pub fn next_game(&mut self) -> Result<Option<Game>, ChessError> {
        if self.done {
            return Ok(None);
        }
        let mut buffer = String::new();
        let mut state = ScanState::NotInGame;
        let mut line = String::new();

        loop {
            line.clear();
            let n = match self.reader.read_line(&mut line) {
                Ok(n) => n,
                Err(e) => {
                    self.done = true;
                    return Err(e.into());
                }
            };
            if n == 0 {
                self.done = true;
                if buffer.trim().is_empty() {
                    return Ok(None);
                }
                return pgn::decode_pgn(&buffer).map(Some);
            }

            let trimmed = line.trim();
            let is_tag_pair = trimmed.starts_with('[');
            let is_move_seq = trimmed.starts_with("1. ");
            match state {
                ScanState::NotInGame => {
                    // Blank lines and stray text between games are skipped.
                    if is_tag_pair {
                        state = ScanState::InTagPairs;
                        buffer.push_str(trimmed);
                        buffer.push('\n');
                    }
                }
                ScanState::InTagPairs => {
                    if is_move_seq {
                        state = ScanState::InMoves;
                    }
                    buffer.push_str(trimmed);
                    buffer.push('\n');
                }
                ScanState::InMoves => {
                    if trimmed.is_empty() {
                        return pgn::decode_pgn(&buffer).map(Some);
                    }
                    buffer.push_str(trimmed);
                    buffer.push('\n');
                }
            }
        }
    }
}

impl<R: BufRead> Iterator for Scanner<R> {
    type Item = Result<Game, ChessError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_game().transpose()
    }
}

// =========================================================================
// Parallel scanner
// =========================================================================

/// Decodes concatenated PGN with one reader and a pool of decoder threads.
pub struct ParallelScanner<R: BufRead> {
    reader: R,
}

impl<R: BufRead> ParallelScanner<R> {
    pub fn new(reader: R) -> Self {
        ParallelScanner { reader }
    }

    /// Run the scan to completion, publishing decoded games to `output`.
    ///
    /// The calling thread reads and tokenizes; one decoder thread per
    /// available CPU pulls sliced records from a bounded channel. Games that
    /// fail to decode are logged and skipped. The call blocks until input is
    /// exhausted or `cancel` is observed, then joins the workers; `output`
    /// closes once the last worker finishes. Ordering across games is not
    /// preserved.
    pub fn scan(mut self, cancel: &Arc<AtomicBool>, output: Sender<Game>) -> Result<(), ChessError> {
        let workers = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let (work_tx, work_rx) = mpsc::sync_channel::<String>(workers);
        let work_rx = Arc::new(Mutex::new(work_rx));

        let result = thread::scope(|scope| {
            for id in 0..workers {
                let work_rx = Arc::clone(&work_rx);
                let output = output.clone();
                scope.spawn(move || decode_worker(id, &work_rx, &output));
            }

            let mut buffer = String::new();
            let mut state = ScanState::NotInGame;
            let mut line = String::new();
            let read_result = loop {
                if cancel.load(Ordering::Relaxed) {
                    break Ok(());
                }
                line.clear();
                let n = match self.reader.read_line(&mut line) {
                    Ok(n) => n,
                    Err(e) => break Err(ChessError::from(e)),
                };
                if n == 0 {
                    // A partial game buffered at EOF still gets decoded.
                    if !buffer.trim().is_empty() {
                        let _ = work_tx.send(std::mem::take(&mut buffer));
                    }
                    break Ok(());
                }

                let trimmed = line.trim();
                let is_tag_pair = trimmed.starts_with('[');
                let is_move_seq = trimmed.starts_with("1. ");
                match state {
                    ScanState::NotInGame => {
                        if is_tag_pair {
                            state = ScanState::InTagPairs;
                            buffer.push_str(trimmed);
                            buffer.push('\n');
                        }
                    }
                    ScanState::InTagPairs => {
                        if is_move_seq {
                            state = ScanState::InMoves;
                        }
                        buffer.push_str(trimmed);
                        buffer.push('\n');
                    }
                    ScanState::InMoves => {
                        if trimmed.is_empty() {
                            if work_tx.send(std::mem::take(&mut buffer)).is_err() {
                                // All workers are gone; nothing left to feed.
                                break Ok(());
                            }
                            state = ScanState::NotInGame;
                        } else {
                            buffer.push_str(trimmed);
                            buffer.push('\n');
                        }
                    }
                }
            };

            // Closing the work channel drains and stops the workers; the
            // scope joins them before returning.
            drop(work_tx);
            read_result
        });

        drop(output);
        result
    }
}

fn decode_worker(id: usize, work: &Mutex<Receiver<String>>, output: &Sender<Game>) {
    loop {
        let text = {
            let rx = work.lock().expect("work receiver lock");
            match rx.recv() {
                Ok(text) => text,
                Err(_) => break,
            }
        };
        match pgn::decode_pgn(&text) {
            Ok(game) => {
                if output.send(game).is_err() {
                    // The consumer hung up; stop decoding.
                    break;
                }
            }
            Err(e) => tracing::warn!(worker = id, error = %e, "skipping undecodable game"),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
