//! Set commands: `SADD`, `SCARD`, `SISMEMBER`, `SMEMBERS`, `SREM`.

use crate::commands::handler::{CommandError, CommandResult};
use crate::protocol::{Reply, ReplyKind, Request};
use crate::storage::{Db, Object, ObjectKind};
use bytes::Bytes;
use std::collections::HashSet;

fn set_ref<'a>(db: &'a mut Db, key: &[u8]) -> Result<Option<&'a HashSet<Bytes>>, CommandError> {
    match db.get(key) {
        None => Ok(None),
        Some(Object::Set(set)) => Ok(Some(set)),
        Some(_) => Err(CommandError::WrongType),
    }
}

/// SADD key member [member ...]
pub fn sadd(db: &mut Db, request: &Request) -> CommandResult {
    let Object::Set(set) = db.get_or_create(&request.args[0], ObjectKind::Set) else {
        return Err(CommandError::WrongType);
    };

    let added = request.args[1..]
        .iter()
        .filter(|member| set.insert((*member).clone()))
        .count();
    Ok(Reply::count(added))
}

/// SCARD key
pub fn scard(db: &mut Db, request: &Request) -> CommandResult {
    let len = set_ref(db, &request.args[0])?.map_or(0, HashSet::len);
    Ok(Reply::count(len))
}

/// SISMEMBER key member
pub fn sismember(db: &mut Db, request: &Request) -> CommandResult {
    let found = set_ref(db, &request.args[0])?
        .map_or(false, |set| set.contains(&request.args[1]));
    Ok(Reply::integer(i64::from(found)))
}

/// SMEMBERS key
pub fn smembers(db: &mut Db, request: &Request) -> CommandResult {
    let members = set_ref(db, &request.args[0])?
        .map(|set| set.iter().cloned().collect())
        .unwrap_or_default();
    Ok(Reply::collection(ReplyKind::Set, members))
}

/// SREM key member [member ...]
pub fn srem(db: &mut Db, request: &Request) -> CommandResult {
    let key = &request.args[0];
    let removed = match db.get_mut(key) {
        None => 0,
        Some(Object::Set(set)) => request.args[1..]
            .iter()
            .filter(|member| set.remove(*member))
            .count(),
        Some(_) => return Err(CommandError::WrongType),
    };

    db.remove_if_empty(key);
    Ok(Reply::count(removed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandTable;

    fn run(table: &mut CommandTable, db: &mut Db, words: &[&str]) -> Reply {
        let request =
            Request::from_words(words.iter().map(|w| Bytes::from(w.to_string())).collect())
                .unwrap();
        table.execute(db, &request)
    }

    #[test]
    fn test_sadd_suppresses_duplicates() {
        let mut table = CommandTable::new();
        let mut db = Db::new(0);

        assert_eq!(run(&mut table, &mut db, &["sadd", "s", "a", "a", "b"]), Reply::integer(2));
        assert_eq!(run(&mut table, &mut db, &["sadd", "s", "b", "c"]), Reply::integer(1));
        assert_eq!(run(&mut table, &mut db, &["scard", "s"]), Reply::integer(3));
        assert_eq!(run(&mut table, &mut db, &["scard", "missing"]), Reply::integer(0));
    }

    #[test]
    fn test_sismember_and_smembers() {
        let mut table = CommandTable::new();
        let mut db = Db::new(0);
        run(&mut table, &mut db, &["sadd", "s", "a", "b"]);

        assert_eq!(run(&mut table, &mut db, &["sismember", "s", "a"]), Reply::integer(1));
        assert_eq!(run(&mut table, &mut db, &["sismember", "s", "z"]), Reply::integer(0));
        assert_eq!(run(&mut table, &mut db, &["sismember", "missing", "a"]), Reply::integer(0));

        let reply = run(&mut table, &mut db, &["smembers", "s"]);
        assert_eq!(reply.kind, ReplyKind::Set);
        let mut members = reply.args.clone();
        members.sort();
        assert_eq!(members, vec![Bytes::from("a"), Bytes::from("b")]);
    }

    #[test]
    fn test_srem_removes_empty_set() {
        let mut table = CommandTable::new();
        let mut db = Db::new(0);
        run(&mut table, &mut db, &["sadd", "s", "a", "b"]);

        assert_eq!(run(&mut table, &mut db, &["srem", "s", "a", "a", "z"]), Reply::integer(1));
        assert_eq!(run(&mut table, &mut db, &["srem", "s", "b"]), Reply::integer(1));
        assert!(!db.contains(b"s"));
        assert_eq!(run(&mut table, &mut db, &["srem", "s", "b"]), Reply::integer(0));
    }

    #[test]
    fn test_wrong_type() {
        let mut table = CommandTable::new();
        let mut db = Db::new(0);
        run(&mut table, &mut db, &["set", "k", "v"]);

        let wrongtype = Reply::from(CommandError::WrongType);
        assert_eq!(run(&mut table, &mut db, &["sadd", "k", "a"]), wrongtype);
        assert_eq!(run(&mut table, &mut db, &["smembers", "k"]), wrongtype);
        assert_eq!(run(&mut table, &mut db, &["srem", "k", "a"]), wrongtype);
    }
}
