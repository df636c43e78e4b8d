//! Sorted set commands: `ZADD`, `ZCARD`, `ZCOUNT`, `ZRANGE`, `ZRANK`,
//! `ZREM`, `ZSCORE`.
//!
//! `ZCOUNT` and `ZRANGE` take a closed score interval `min max`.

use crate::commands::handler::{check_pairs, parse_float, CommandError, CommandResult};
use crate::protocol::{Reply, ReplyKind, Request};
use crate::storage::{Db, Object, ObjectKind, SortedSet};
use bytes::Bytes;

fn zset_ref<'a>(db: &'a mut Db, key: &[u8]) -> Result<Option<&'a SortedSet>, CommandError> {
    match db.get(key) {
        None => Ok(None),
        Some(Object::ZSet(zset)) => Ok(Some(zset)),
        Some(_) => Err(CommandError::WrongType),
    }
}

fn score_interval(request: &Request) -> Result<(f64, f64), CommandError> {
    Ok((parse_float(&request.args[1])?, parse_float(&request.args[2])?))
}

/// ZADD key score member [score member ...]
///
/// Every score is validated before the set is touched, so a bad score
/// leaves the key unchanged.
pub fn zadd(db: &mut Db, request: &Request) -> CommandResult {
    check_pairs(request)?;

    let entries = request.args[1..]
        .chunks_exact(2)
        .map(|pair| -> Result<(f64, Bytes), CommandError> {
            Ok((parse_float(&pair[0])?, pair[1].clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let Object::ZSet(zset) = db.get_or_create(&request.args[0], ObjectKind::ZSet) else {
        return Err(CommandError::WrongType);
    };

    let added = entries
        .into_iter()
        .filter(|(score, member)| zset.add(*score, member.clone()))
        .count();
    Ok(Reply::count(added))
}

/// ZCARD key
pub fn zcard(db: &mut Db, request: &Request) -> CommandResult {
    let len = zset_ref(db, &request.args[0])?.map_or(0, SortedSet::len);
    Ok(Reply::count(len))
}

/// ZCOUNT key min max
pub fn zcount(db: &mut Db, request: &Request) -> CommandResult {
    let (min, max) = score_interval(request)?;
    let count = zset_ref(db, &request.args[0])?.map_or(0, |zset| zset.count(min, max));
    Ok(Reply::count(count))
}

/// ZRANGE key min max
///
/// Members whose score falls in `[min, max]`, lowest score first.
pub fn zrange(db: &mut Db, request: &Request) -> CommandResult {
    let (min, max) = score_interval(request)?;
    let members = zset_ref(db, &request.args[0])?
        .map(|zset| {
            zset.range_by_score(min, max)
                .into_iter()
                .map(|(member, _)| member)
                .collect()
        })
        .unwrap_or_default();
    Ok(Reply::collection(ReplyKind::ZSet, members))
}

/// ZRANK key member
pub fn zrank(db: &mut Db, request: &Request) -> CommandResult {
    let rank = zset_ref(db, &request.args[0])?.and_then(|zset| zset.rank(&request.args[1]));
    Ok(rank.map_or_else(Reply::nil, Reply::count))
}

/// ZREM key member [member ...]
pub fn zrem(db: &mut Db, request: &Request) -> CommandResult {
    let key = &request.args[0];
    let removed = match db.get_mut(key) {
        None => 0,
        Some(Object::ZSet(zset)) => request.args[1..]
            .iter()
            .filter(|member| zset.remove(member))
            .count(),
        Some(_) => return Err(CommandError::WrongType),
    };

    db.remove_if_empty(key);
    Ok(Reply::count(removed))
}

/// ZSCORE key member
pub fn zscore(db: &mut Db, request: &Request) -> CommandResult {
    let score = zset_ref(db, &request.args[0])?.and_then(|zset| zset.score(&request.args[1]));
    Ok(score.map_or_else(Reply::nil, Reply::float))
}
