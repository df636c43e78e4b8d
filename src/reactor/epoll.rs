//! Thin wrapper over `epoll(7)`.
//!
//! Translates between the reactor's [`Mask`] bits and epoll flags and keeps
//! the ready-event buffer. Registration is level-triggered.

use nix::errno::Errno;
use nix::sys::epoll::{Epoll, EpollCreateFlags, EpollEvent, EpollFlags, EpollTimeout};
use std::fmt;
use std::io;
use std::ops::BitOr;
use std::os::fd::{BorrowedFd, RawFd};

/// Ready events returned per `epoll_wait`.
const EVENT_CAPACITY: usize = 1024;

/// Interest / readiness bits for a file descriptor.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Mask(u8);

impl Mask {
    pub const NONE: Mask = Mask(0);
    pub const READABLE: Mask = Mask(0b01);
    pub const WRITABLE: Mask = Mask(0b10);

    pub fn contains(self, other: Mask) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// `self` with every bit of `other` cleared.
    pub fn without(self, other: Mask) -> Mask {
        Mask(self.0 & !other.0)
    }

    fn to_flags(self) -> EpollFlags {
        let mut flags = EpollFlags::empty();
        if self.contains(Mask::READABLE) {
            flags |= EpollFlags::EPOLLIN;
        }
        if self.contains(Mask::WRITABLE) {
            flags |= EpollFlags::EPOLLOUT;
        }
        flags
    }

    /// Errors and hang-ups surface as readable so the read callback sees
    /// the EOF or error on its next read.
    fn from_flags(flags: EpollFlags) -> Mask {
        let mut mask = Mask::NONE;
        if flags.intersects(EpollFlags::EPOLLIN | EpollFlags::EPOLLERR | EpollFlags::EPOLLHUP) {
            mask = mask | Mask::READABLE;
        }
        if flags.contains(EpollFlags::EPOLLOUT) {
            mask = mask | Mask::WRITABLE;
        }
        mask
    }
}

impl BitOr for Mask {
    type Output = Mask;

    fn bitor(self, rhs: Mask) -> Mask {
        Mask(self.0 | rhs.0)
    }
}

impl fmt::Debug for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.contains(Mask::READABLE), self.contains(Mask::WRITABLE)) {
            (true, true) => write!(f, "READABLE|WRITABLE"),
            (true, false) => write!(f, "READABLE"),
            (false, true) => write!(f, "WRITABLE"),
            (false, false) => write!(f, "NONE"),
        }
    }
}

/// An epoll instance plus its ready-event buffer.
pub struct Poller {
    epoll: Epoll,
    events: Vec<EpollEvent>,
}

impl fmt::Debug for Poller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Poller")
            .field("capacity", &self.events.len())
            .finish()
    }
}

impl Poller {
    pub fn new() -> io::Result<Self> {
        let epoll = Epoll::new(EpollCreateFlags::EPOLL_CLOEXEC).map_err(io::Error::from)?;
        Ok(Self {
            epoll,
            events: vec![EpollEvent::empty(); EVENT_CAPACITY],
        })
    }

    /// Starts watching `fd` for `mask`.
    pub fn add(&self, fd: RawFd, mask: Mask) -> io::Result<()> {
        let event = EpollEvent::new(mask.to_flags(), fd_token(fd));
        self.epoll
            .add(borrow(fd), event)
            .map_err(io::Error::from)
    }

    /// Replaces the interest set of an already watched `fd`.
    pub fn modify(&self, fd: RawFd, mask: Mask) -> io::Result<()> {
        let mut event = EpollEvent::new(mask.to_flags(), fd_token(fd));
        self.epoll
            .modify(borrow(fd), &mut event)
            .map_err(io::Error::from)
    }

    /// Stops watching `fd`.
    pub fn delete(&self, fd: RawFd) -> io::Result<()> {
        self.epoll.delete(borrow(fd)).map_err(io::Error::from)
    }

    /// Blocks for at most `timeout_ms` and returns the ready descriptors in
    /// the order the kernel reported them.
    ///
    /// An interrupted wait (`EINTR`) reports nothing ready.
    pub fn wait(&mut self, timeout_ms: i64) -> io::Result<Vec<(RawFd, Mask)>> {
        let timeout = u16::try_from(timeout_ms.max(0)).unwrap_or(u16::MAX);

        let ready = match self.epoll.wait(&mut self.events, EpollTimeout::from(timeout)) {
            Ok(n) => n,
            Err(Errno::EINTR) => 0,
            Err(errno) => return Err(io::Error::from(errno)),
        };

        Ok(self.events[..ready]
            .iter()
            .filter_map(|event| {
                let fd = RawFd::try_from(event.data()).ok()?;
                Some((fd, Mask::from_flags(event.events())))
            })
            .collect())
    }
}

fn fd_token(fd: RawFd) -> u64 {
    u64::try_from(fd).unwrap_or_default()
}

fn borrow(fd: RawFd) -> BorrowedFd<'static> {
    // SAFETY: the reactor only registers descriptors owned by live sockets,
    // and callers deregister a descriptor before closing it. The borrow
    // never outlives the single epoll_ctl call it is passed to.
    unsafe { BorrowedFd::borrow_raw(fd) }
}
