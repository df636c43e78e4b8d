//! The Event Loop
//!
//! One iteration of [`EventLoop::process_events`]:
//!
//! 1. Compute the wait timeout: time until the nearest time event, capped at
//!    the idle tick and floored at zero.
//! 2. Block once in `epoll_wait`.
//! 3. For each ready fd, run its read callback and then its write callback.
//! 4. Fire every due time event.
//!
//! Time events live in a single sequence with new events inserted at the
//! head. After a firing the walk restarts from the head, since the callback
//! may have added or removed events. Each event fires at most once per pass
//! and events created during the pass wait for the next one, so zero-delay
//! timers cannot starve file events.

use crate::clock::now_ms;
use crate::reactor::epoll::{Mask, Poller};
use crate::reactor::{ReactorError, ReactorResult};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::os::fd::RawFd;
use std::rc::Rc;
use tracing::{debug, error, trace};

/// Callback for file readiness. Receives the fd and the ready bits.
pub type FileProc<S> = Rc<dyn Fn(&mut EventLoop<S>, &mut S, RawFd, Mask)>;

/// Callback for a time event. Returns the delay in milliseconds before a
/// `Normal` event fires again; ignored for `Once` events.
pub type TimeProc<S> = Rc<dyn Fn(&mut EventLoop<S>, &mut S, TimeEventId) -> u64>;

/// Identifier of a registered time event. Ids start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeEventId(pub u64);

impl fmt::Display for TimeEventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a time event behaves after it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeMode {
    /// Re-armed using the delay the callback returns
    Normal,
    /// Deleted after firing
    Once,
}

struct FileEvent<S> {
    mask: Mask,
    read_proc: Option<FileProc<S>>,
    write_proc: Option<FileProc<S>>,
}

struct TimeEvent<S> {
    id: TimeEventId,
    when_ms: i64,
    mode: TimeMode,
    proc: TimeProc<S>,
}

/// A single-threaded reactor over file descriptors and timers.
///
/// `S` is the state handed mutably to every callback.
pub struct EventLoop<S> {
    file_events: HashMap<RawFd, FileEvent<S>>,
    time_events: VecDeque<TimeEvent<S>>,
    next_time_id: u64,
    last_time: i64,
    idle_tick_ms: u64,
    stop: bool,
    poller: Poller,
}

impl<S> fmt::Debug for EventLoop<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("file_events", &self.file_events.len())
            .field("time_events", &self.time_events.len())
            .field("next_time_id", &self.next_time_id)
            .field("stop", &self.stop)
            .finish()
    }
}

impl<S> EventLoop<S> {
    /// Creates a loop whose `epoll_wait` never blocks longer than
    /// `idle_tick_ms`.
    pub fn new(idle_tick_ms: u64) -> ReactorResult<Self> {
        Ok(Self {
            file_events: HashMap::new(),
            time_events: VecDeque::new(),
            next_time_id: 1,
            last_time: now_ms(),
            idle_tick_ms,
            stop: false,
            poller: Poller::new()?,
        })
    }

    /// Adds `mask` to the interest set of `fd` and installs `proc` as its
    /// read and/or write callback.
    ///
    /// If epoll rejects the registration the loop is left exactly as it was.
    pub fn create_file_event<F>(&mut self, fd: RawFd, mask: Mask, proc: F) -> ReactorResult<()>
    where
        F: Fn(&mut EventLoop<S>, &mut S, RawFd, Mask) + 'static,
    {
        self.install_file_event(fd, mask, Rc::new(proc))
    }

    /// Like [`create_file_event`](Self::create_file_event) for a callback
    /// that is already shared.
    pub fn install_file_event(&mut self, fd: RawFd, mask: Mask, proc: FileProc<S>) -> ReactorResult<()> {
        let old_mask = self
            .file_events
            .get(&fd)
            .map(|event| event.mask)
            .unwrap_or(Mask::NONE);
        let new_mask = old_mask | mask;

        if old_mask.is_empty() {
            self.poller.add(fd, new_mask)?;
        } else if new_mask != old_mask {
            self.poller.modify(fd, new_mask)?;
        }

        let event = self.file_events.entry(fd).or_insert_with(|| FileEvent {
            mask: Mask::NONE,
            read_proc: None,
            write_proc: None,
        });
        event.mask = new_mask;
        if mask.contains(Mask::READABLE) {
            event.read_proc = Some(Rc::clone(&proc));
        }
        if mask.contains(Mask::WRITABLE) {
            event.write_proc = Some(proc);
        }

        trace!(fd, mask = ?new_mask, "File event registered");
        Ok(())
    }

    /// Removes the bits in `mask` from the interest set of `fd`.
    ///
    /// Once no interest remains the entry is dropped and the fd is
    /// deregistered from epoll. Unknown fds are ignored.
    pub fn delete_file_event(&mut self, fd: RawFd, mask: Mask) -> ReactorResult<()> {
        let Some(old_mask) = self.file_events.get(&fd).map(|event| event.mask) else {
            return Ok(());
        };

        let remaining = old_mask.without(mask);
        if remaining == old_mask {
            return Ok(());
        }

        if remaining.is_empty() {
            self.poller.delete(fd)?;
            self.file_events.remove(&fd);
        } else {
            self.poller.modify(fd, remaining)?;
            if let Some(event) = self.file_events.get_mut(&fd) {
                event.mask = remaining;
                if !remaining.contains(Mask::READABLE) {
                    event.read_proc = None;
                }
                if !remaining.contains(Mask::WRITABLE) {
                    event.write_proc = None;
                }
            }
        }

        trace!(fd, mask = ?remaining, "File event updated");
        Ok(())
    }

    /// Current interest set of `fd` (`Mask::NONE` if unregistered).
    pub fn file_event_mask(&self, fd: RawFd) -> Mask {
        self.file_events
            .get(&fd)
            .map(|event| event.mask)
            .unwrap_or(Mask::NONE)
    }

    /// Schedules `proc` to fire no earlier than `delay_ms` from now.
    pub fn create_time_event<F>(&mut self, delay_ms: u64, mode: TimeMode, proc: F) -> TimeEventId
    where
        F: Fn(&mut EventLoop<S>, &mut S, TimeEventId) -> u64 + 'static,
    {
        let proc: TimeProc<S> = Rc::new(proc);
        let id = TimeEventId(self.next_time_id);
        self.next_time_id += 1;

        self.time_events.push_front(TimeEvent {
            id,
            when_ms: deadline(now_ms(), delay_ms),
            mode,
            proc,
        });

        trace!(id = id.0, delay_ms, ?mode, "Time event created");
        id
    }

    pub fn delete_time_event(&mut self, id: TimeEventId) -> ReactorResult<()> {
        let position = self
            .time_events
            .iter()
            .position(|event| event.id == id)
            .ok_or(ReactorError::TimeEventNotFound(id))?;

        self.time_events.remove(position);
        Ok(())
    }

    pub fn time_event_count(&self) -> usize {
        self.time_events.len()
    }

    /// Asks [`run`](Self::run) to return once the current iteration ends.
    pub fn stop(&mut self) {
        self.stop = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stop
    }

    /// Runs iterations until [`stop`](Self::stop) is called.
    ///
    /// Returns an error only if `epoll_wait` fails with something other
    /// than an interruption.
    pub fn run(&mut self, state: &mut S) -> ReactorResult<()> {
        self.stop = false;
        debug!("Event loop started");

        while !self.stop {
            if let Err(err) = self.process_events(state) {
                error!(error = %err, "Event loop wait failed");
                return Err(err);
            }
        }

        debug!("Event loop stopped");
        Ok(())
    }

    /// Runs one iteration: wait, dispatch file events, fire due timers.
    ///
    /// Returns the number of callbacks invoked.
    pub fn process_events(&mut self, state: &mut S) -> ReactorResult<usize> {
        let timeout = self.wait_timeout_ms();
        let ready = self.poller.wait(timeout)?;
        let mut processed = 0;

        for (fd, fired) in ready {
            if fired.contains(Mask::READABLE) {
                if let Some(proc) = self.read_proc(fd) {
                    proc(self, state, fd, fired);
                    processed += 1;
                }
            }
            // The read callback may have closed the fd or dropped interest
            if fired.contains(Mask::WRITABLE) {
                if let Some(proc) = self.write_proc(fd) {
                    proc(self, state, fd, fired);
                    processed += 1;
                }
            }
        }

        processed += self.process_time_events(state);
        Ok(processed)
    }

    fn read_proc(&self, fd: RawFd) -> Option<FileProc<S>> {
        self.file_events
            .get(&fd)
            .filter(|event| event.mask.contains(Mask::READABLE))
            .and_then(|event| event.read_proc.clone())
    }

    fn write_proc(&self, fd: RawFd) -> Option<FileProc<S>> {
        self.file_events
            .get(&fd)
            .filter(|event| event.mask.contains(Mask::WRITABLE))
            .and_then(|event| event.write_proc.clone())
    }

    fn nearest_deadline(&self) -> Option<i64> {
        self.time_events.iter().map(|event| event.when_ms).min()
    }

    fn wait_timeout_ms(&self) -> i64 {
        let idle = i64::try_from(self.idle_tick_ms).unwrap_or(i64::MAX);
        match self.nearest_deadline() {
            Some(when) => (when - now_ms()).clamp(0, idle),
            None => idle,
        }
    }

    fn process_time_events(&mut self, state: &mut S) -> usize {
        let now = now_ms();

        // Clock moved backwards: everything is due now
        if now < self.last_time {
            debug!(skew_ms = self.last_time - now, "System clock moved backwards");
            for event in self.time_events.iter_mut() {
                event.when_ms = 0;
            }
        }
        self.last_time = now;

        let newest = self.next_time_id;
        let mut fired: HashSet<TimeEventId> = HashSet::new();
        let mut processed = 0;

        loop {
            let now = now_ms();
            let due = self
                .time_events
                .iter()
                .find(|event| {
                    event.id.0 < newest && event.when_ms <= now && !fired.contains(&event.id)
                })
                .map(|event| (event.id, event.mode, Rc::clone(&event.proc)));

            let Some((id, mode, proc)) = due else {
                break;
            };

            fired.insert(id);
            let delay_ms = proc(self, state, id);
            processed += 1;

            // The callback may have deleted its own event
            match mode {
                TimeMode::Once => {
                    if let Some(position) = self.time_events.iter().position(|event| event.id == id) {
                        self.time_events.remove(position);
                    }
                }
                TimeMode::Normal => {
                    if let Some(event) = self.time_events.iter_mut().find(|event| event.id == id) {
                        event.when_ms = deadline(now_ms(), delay_ms);
                    }
                }
            }
        }

        processed
    }
}

fn deadline(now: i64, delay_ms: u64) -> i64 {
    now.saturating_add(i64::try_from(delay_ms).unwrap_or(i64::MAX))
}
