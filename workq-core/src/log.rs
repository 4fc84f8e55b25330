//! Debug event logging.
//!
//! Disabled unless the `WORKQ_LOG` environment variable is set. Supported
//! values:
//!
//! * `WORKQ_LOG=all:<path>` — stream every event to the file as it happens.
//! * `WORKQ_LOG=tail:<path>` — keep the most recent events in a ring and
//!   write them out on flush; cheap enough to leave on around a failure.
//!
//! Events are built lazily: `logger.log(|| Event::...)` evaluates its
//! closure only when logging is enabled, so a disabled logger costs one
//! branch per call site.

use std::collections::VecDeque;
use std::env;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::thread;

use crossbeam_channel::{Receiver, Sender};

pub(super) const LOG_ENV_VAR: &str = "WORKQ_LOG";

/// Number of events retained in `tail` mode.
const TAIL_LEN: usize = 10_000;

#[derive(Copy, Clone, Debug)]
pub(super) enum Event {
    /// Write buffered events out (tail mode); sent at shutdown.
    Flush,
    WorkerStart { worker: usize },
    WorkerTerminate { worker: usize },
    TaskSubmitted,
    TaskRejected,
    TaskExecute { worker: usize },
    TaskPanicked { worker: usize },
    ShutdownBegin { workers: usize },
}

#[derive(Clone)]
pub(super) struct Logger {
    sender: Option<Sender<Event>>,
}

impl Logger {
    pub(super) fn new() -> Logger {
        let env_log = match env::var(LOG_ENV_VAR) {
            Ok(value) => value,
            Err(_) => return Logger::disabled(),
        };

        let (sender, receiver) = crossbeam_channel::unbounded();
        if let Some(path) = env_log.strip_prefix("all:") {
            let path = path.to_owned();
            spawn_writer(move || all_writer(&path, &receiver));
        } else if let Some(path) = env_log.strip_prefix("tail:") {
            let path = path.to_owned();
            spawn_writer(move || tail_writer(&path, &receiver));
        } else {
            panic!("{LOG_ENV_VAR} should be `all:<path>` or `tail:<path>`");
        }

        Logger {
            sender: Some(sender),
        }
    }

    fn disabled() -> Logger {
        Logger { sender: None }
    }

    #[inline]
    pub(super) fn log(&self, event: impl FnOnce() -> Event) {
        if let Some(sender) = &self.sender {
            // A send can only fail once the writer thread is gone, at which
            // point the event has nowhere to go anyway.
            let _ = sender.send(event());
        }
    }
}

fn spawn_writer(body: impl FnOnce() + Send + 'static) {
    // The writer lives until every `Logger` clone is dropped and the channel
    // disconnects; nothing joins it.
    let _ = thread::Builder::new()
        .name("workq-log".to_owned())
        .spawn(body);
}

fn all_writer(path: &str, receiver: &Receiver<Event>) {
    let file = File::create(path).expect("failed to create log file");
    let mut writer = BufWriter::new(file);
    for event in receiver {
        if matches!(event, Event::Flush) {
            writer.flush().expect("failed to flush log file");
            continue;
        }
        writeln!(writer, "{event:?}").expect("failed to write log event");
    }
    writer.flush().expect("failed to flush log file");
}

fn tail_writer(path: &str, receiver: &Receiver<Event>) {
    let mut tail: VecDeque<Event> = VecDeque::with_capacity(TAIL_LEN);
    let mut skipped = 0_u64;
    for event in receiver {
        if matches!(event, Event::Flush) {
            write_tail(path, skipped, &tail);
            continue;
        }
        if tail.len() == TAIL_LEN {
            tail.pop_front();
            skipped += 1;
        }
        tail.push_back(event);
    }
    write_tail(path, skipped, &tail);
}

fn write_tail(path: &str, skipped: u64, tail: &VecDeque<Event>) {
    let file = File::create(path).expect("failed to create log file");
    let mut writer = BufWriter::new(file);
    if skipped > 0 {
        writeln!(writer, "...{skipped} earlier events dropped...").expect("failed to write log");
    }
    for event in tail {
        writeln!(writer, "{event:?}").expect("failed to write log event");
    }
    writer.flush().expect("failed to flush log file");
}
