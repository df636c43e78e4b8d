//! String and keyspace commands: `PING`, `GET`, `SET`, `DEL`, `EXISTS`,
//! `EXPIRE`, `TTL`.

use crate::clock::now_ms;
use crate::commands::handler::{parse_integer, CommandError, CommandResult};
use crate::protocol::{Reply, Request};
use crate::storage::{Db, Object, ObjectKind};

/// Longest accepted TTL: ten years.
pub const MAX_EXPIRE_SECONDS: i64 = 315_360_000;

/// PING
pub fn ping(_db: &mut Db, _request: &Request) -> CommandResult {
    Ok(Reply::status("PONG"))
}

/// GET key
pub fn get(db: &mut Db, request: &Request) -> CommandResult {
    match db.get(&request.args[0]) {
        None => Ok(Reply::nil()),
        Some(Object::String(value)) => Ok(Reply::bulk(value.clone())),
        Some(_) => Err(CommandError::WrongType),
    }
}

/// SET key value
///
/// Overwrites any existing value regardless of its type and clears the
/// key's expiration.
pub fn set(db: &mut Db, request: &Request) -> CommandResult {
    let key = request.args[0].clone();
    let value = request.args[1].clone();
    db.set(key, Object::create(ObjectKind::String, value));
    Ok(Reply::ok())
}

/// DEL key [key ...]
pub fn del(db: &mut Db, request: &Request) -> CommandResult {
    let removed = request.args.iter().filter(|key| db.remove(key)).count();
    Ok(Reply::count(removed))
}

/// EXISTS key [key ...]
pub fn exists(db: &mut Db, request: &Request) -> CommandResult {
    let present = request.args.iter().filter(|key| db.contains(key)).count();
    Ok(Reply::count(present))
}

/// EXPIRE key seconds
///
/// A TTL of zero deletes the key immediately.
pub fn expire(db: &mut Db, request: &Request) -> CommandResult {
    let key = &request.args[0];
    let seconds = parse_integer(&request.args[1])?;
    if !(0..=MAX_EXPIRE_SECONDS).contains(&seconds) {
        return Err(CommandError::NotInteger);
    }

    if !db.contains(key) {
        return Ok(Reply::integer(0));
    }

    if seconds == 0 {
        db.remove(key);
    } else {
        db.set_expire(key, now_ms() + seconds * 1000);
    }
    Ok(Reply::integer(1))
}

/// TTL key
///
/// Remaining seconds, `-1` for a key without expiration, `-2` for a missing
/// key.
pub fn ttl(db: &mut Db, request: &Request) -> CommandResult {
    let key = &request.args[0];
    if !db.contains(key) {
        return Ok(Reply::integer(-2));
    }

    match db.expire_at(key) {
        None => Ok(Reply::integer(-1)),
        Some(when) => {
            let remaining_ms = (when - now_ms()).max(0);
            Ok(Reply::integer((remaining_ms + 500) / 1000))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandTable;
    use bytes::Bytes;

    fn run(table: &mut CommandTable, db: &mut Db, words: &[&str]) -> Reply {
        let request =
            Request::from_words(words.iter().map(|w| Bytes::from(w.to_string())).collect())
                .unwrap();
        table.execute(db, &request)
    }

    fn setup() -> (CommandTable, Db) {
        (CommandTable::new(), Db::new(0))
    }

    #[test]
    fn test_ping() {
        let (mut table, mut db) = setup();
        assert_eq!(run(&mut table, &mut db, &["PING"]), Reply::status("PONG"));
        assert!(run(&mut table, &mut db, &["PING", "extra"]).is_error());
    }

    #[test]
    fn test_set_get() {
        let (mut table, mut db) = setup();

        assert_eq!(run(&mut table, &mut db, &["set", "foo", "bar"]), Reply::ok());
        assert_eq!(
            run(&mut table, &mut db, &["get", "foo"]),
            Reply::bulk(Bytes::from("bar"))
        );
        assert_eq!(run(&mut table, &mut db, &["get", "nope"]), Reply::nil());
    }

    #[test]
    fn test_get_on_container_is_wrongtype() {
        let (mut table, mut db) = setup();
        run(&mut table, &mut db, &["rpush", "l", "a"]);

        assert_eq!(
            run(&mut table, &mut db, &["get", "l"]),
            Reply::from(CommandError::WrongType)
        );
        // SET replaces whatever was there
        assert_eq!(run(&mut table, &mut db, &["set", "l", "v"]), Reply::ok());
        assert_eq!(
            run(&mut table, &mut db, &["get", "l"]),
            Reply::bulk(Bytes::from("v"))
        );
    }

    #[test]
    fn test_del_and_exists() {
        let (mut table, mut db) = setup();
        run(&mut table, &mut db, &["set", "a", "1"]);
        run(&mut table, &mut db, &["set", "b", "2"]);

        assert_eq!(run(&mut table, &mut db, &["exists", "a", "b", "c"]), Reply::integer(2));
        assert_eq!(run(&mut table, &mut db, &["del", "a", "b", "c"]), Reply::integer(2));
        assert_eq!(run(&mut table, &mut db, &["exists", "a"]), Reply::integer(0));
    }

    #[test]
    fn test_expire_zero_deletes() {
        let (mut table, mut db) = setup();
        run(&mut table, &mut db, &["set", "foo", "bar"]);

        assert_eq!(run(&mut table, &mut db, &["expire", "foo", "0"]), Reply::integer(1));
        assert_eq!(run(&mut table, &mut db, &["get", "foo"]), Reply::nil());
        assert_eq!(run(&mut table, &mut db, &["expire", "foo", "10"]), Reply::integer(0));
    }

    #[test]
    fn test_expire_validates_range() {
        let (mut table, mut db) = setup();
        run(&mut table, &mut db, &["set", "foo", "bar"]);

        let out_of_range = Reply::from(CommandError::NotInteger);
        assert_eq!(run(&mut table, &mut db, &["expire", "foo", "-1"]), out_of_range);
        assert_eq!(run(&mut table, &mut db, &["expire", "foo", "315360001"]), out_of_range);
        assert_eq!(run(&mut table, &mut db, &["expire", "foo", "soon"]), out_of_range);
        assert_eq!(run(&mut table, &mut db, &["ttl", "foo"]), Reply::integer(-1));
    }

    #[test]
    fn test_ttl() {
        let (mut table, mut db) = setup();
        assert_eq!(run(&mut table, &mut db, &["ttl", "foo"]), Reply::integer(-2));

        run(&mut table, &mut db, &["set", "foo", "bar"]);
        assert_eq!(run(&mut table, &mut db, &["ttl", "foo"]), Reply::integer(-1));

        run(&mut table, &mut db, &["expire", "foo", "100"]);
        assert_eq!(run(&mut table, &mut db, &["ttl", "foo"]), Reply::integer(100));

        // SET clears the deadline
        run(&mut table, &mut db, &["set", "foo", "baz"]);
        assert_eq!(run(&mut table, &mut db, &["ttl", "foo"]), Reply::integer(-1));
    }

    #[test]
    fn test_expired_key_reads_as_missing() {
        let (mut table, mut db) = setup();
        run(&mut table, &mut db, &["set", "foo", "bar"]);
        db.set_expire(&Bytes::from("foo"), now_ms() - 1);

        assert_eq!(run(&mut table, &mut db, &["exists", "foo"]), Reply::integer(0));
        assert_eq!(run(&mut table, &mut db, &["del", "foo"]), Reply::integer(0));
        assert_eq!(db.expired_keys(), 1);
    }
}
