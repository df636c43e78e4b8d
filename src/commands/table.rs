//! The Command Table
//!
//! Maps lower-case command names to their handler, arity and kind, and keeps
//! per-command call statistics.
//!
//! ## Arity
//!
//! `arity` counts the command name itself, so `GET key` has arity 2. When
//! `arity_more` is set the arity is a minimum (`DEL key [key ...]`).

use crate::commands::handler::{CommandError, Handler};
use crate::commands::{hash, list, set, string, zset};
use crate::protocol::{Reply, Request};
use crate::storage::Db;
use std::collections::HashMap;
use std::fmt;
use std::time::Instant;
use tracing::debug;

/// Whether a command reads, writes or administers the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Read,
    Write,
    Admin,
}

/// Per-command counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandStats {
    /// Number of times the handler ran
    pub calls: u64,
    /// Cumulative handler time in microseconds
    pub microseconds: u64,
}

/// One entry of the command table.
#[derive(Clone)]
pub struct Command {
    pub name: &'static str,
    pub arity: usize,
    pub arity_more: bool,
    pub kind: CommandKind,
    handler: Handler,
    stats: CommandStats,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("arity_more", &self.arity_more)
            .field("kind", &self.kind)
            .field("stats", &self.stats)
            .finish()
    }
}

impl Command {
    pub fn new(
        name: &'static str,
        arity: usize,
        arity_more: bool,
        kind: CommandKind,
        handler: Handler,
    ) -> Self {
        Self {
            name,
            arity,
            arity_more,
            kind,
            handler,
            stats: CommandStats::default(),
        }
    }

    /// Whether `argc` words (command name included) satisfy the arity.
    pub fn accepts(&self, argc: usize) -> bool {
        if self.arity_more {
            argc >= self.arity
        } else {
            argc == self.arity
        }
    }

    pub fn stats(&self) -> CommandStats {
        self.stats
    }
}

/// Registry of every command the server understands.
#[derive(Debug, Clone)]
pub struct CommandTable {
    commands: HashMap<&'static str, Command>,
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandTable {
    /// Builds the table with every built-in command.
    pub fn new() -> Self {
        use CommandKind::{Admin, Read, Write};

        let builtin = [
            Command::new("ping", 1, false, Admin, string::ping),
            // Strings and keys
            Command::new("get", 2, false, Read, string::get),
            Command::new("set", 3, false, Write, string::set),
            Command::new("del", 2, true, Write, string::del),
            Command::new("exists", 2, true, Read, string::exists),
            Command::new("expire", 3, false, Write, string::expire),
            Command::new("ttl", 2, false, Read, string::ttl),
            // Lists
            Command::new("lpush", 3, true, Write, list::lpush),
            Command::new("rpush", 3, true, Write, list::rpush),
            Command::new("lpop", 2, false, Write, list::lpop),
            Command::new("rpop", 2, false, Write, list::rpop),
            Command::new("llen", 2, false, Read, list::llen),
            Command::new("lindex", 3, false, Read, list::lindex),
            Command::new("lset", 4, false, Write, list::lset),
            Command::new("lrange", 4, false, Read, list::lrange),
            // Hashes
            Command::new("hset", 4, true, Write, hash::hset),
            Command::new("hget", 3, false, Read, hash::hget),
            Command::new("hexists", 3, false, Read, hash::hexists),
            Command::new("hdel", 3, true, Write, hash::hdel),
            Command::new("hlen", 2, false, Read, hash::hlen),
            Command::new("hgetall", 2, false, Read, hash::hgetall),
            // Sets
            Command::new("sadd", 3, true, Write, set::sadd),
            Command::new("scard", 2, false, Read, set::scard),
            Command::new("sismember", 3, false, Read, set::sismember),
            Command::new("smembers", 2, false, Read, set::smembers),
            Command::new("srem", 3, true, Write, set::srem),
            // Sorted sets
            Command::new("zadd", 4, true, Write, zset::zadd),
            Command::new("zcard", 2, false, Read, zset::zcard),
            Command::new("zcount", 4, false, Read, zset::zcount),
            Command::new("zrange", 4, false, Read, zset::zrange),
            Command::new("zrank", 3, false, Read, zset::zrank),
            Command::new("zrem", 3, true, Write, zset::zrem),
            Command::new("zscore", 3, false, Read, zset::zscore),
        ];

        Self {
            commands: builtin.into_iter().map(|cmd| (cmd.name, cmd)).collect(),
        }
    }

    /// Looks a command up by name, case-insensitively.
    pub fn lookup(&self, name: &str) -> Option<&Command> {
        self.commands.get(name.to_lowercase().as_str())
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Command names in alphabetical order.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.commands.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Runs `request` against `db` and returns exactly one reply.
    pub fn execute(&mut self, db: &mut Db, request: &Request) -> Reply {
        let name = request.command.to_lowercase();

        let Some(command) = self.commands.get_mut(name.as_str()) else {
            debug!(command = %name, "Unknown command");
            return CommandError::UnknownCommand(name).into();
        };

        if !command.accepts(request.argc()) {
            return CommandError::WrongArity(name).into();
        }

        let start = Instant::now();
        let result = (command.handler)(db, request);

        command.stats.calls += 1;
        command.stats.microseconds += u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);

        match result {
            Ok(reply) => reply,
            Err(err) => {
                debug!(command = %name, error = %err, "Command failed");
                err.into()
            }
        }
    }
}
