//! Hash commands: `HSET`, `HGET`, `HEXISTS`, `HDEL`, `HLEN`, `HGETALL`.

use crate::commands::handler::{check_pairs, CommandError, CommandResult};
use crate::protocol::{Reply, ReplyKind, Request};
use crate::storage::{Db, Object, ObjectKind};
use bytes::Bytes;
use std::collections::HashMap;

type Hash = HashMap<Bytes, Bytes>;

fn hash_ref<'a>(db: &'a mut Db, key: &[u8]) -> Result<Option<&'a Hash>, CommandError> {
    match db.get(key) {
        None => Ok(None),
        Some(Object::Hash(hash)) => Ok(Some(hash)),
        Some(_) => Err(CommandError::WrongType),
    }
}

/// HSET key field value [field value ...]
///
/// Replies with the number of fields that were newly created.
pub fn hset(db: &mut Db, request: &Request) -> CommandResult {
    check_pairs(request)?;

    let Object::Hash(hash) = db.get_or_create(&request.args[0], ObjectKind::Hash) else {
        return Err(CommandError::WrongType);
    };

    let added = request.args[1..]
        .chunks_exact(2)
        .filter(|pair| hash.insert(pair[0].clone(), pair[1].clone()).is_none())
        .count();

    Ok(Reply::count(added))
}

/// HGET key field
pub fn hget(db: &mut Db, request: &Request) -> CommandResult {
    let value = hash_ref(db, &request.args[0])?.and_then(|hash| hash.get(&request.args[1]).cloned());
    Ok(Reply::bulk_or_nil(value))
}

/// HEXISTS key field
pub fn hexists(db: &mut Db, request: &Request) -> CommandResult {
    let found = hash_ref(db, &request.args[0])?
        .map_or(false, |hash| hash.contains_key(&request.args[1]));
    Ok(Reply::integer(i64::from(found)))
}

/// HDEL key field [field ...]
pub fn hdel(db: &mut Db, request: &Request) -> CommandResult {
    let key = &request.args[0];
    let removed = match db.get_mut(key) {
        None => 0,
        Some(Object::Hash(hash)) => request.args[1..]
            .iter()
            .filter(|field| hash.remove(*field).is_some())
            .count(),
        Some(_) => return Err(CommandError::WrongType),
    };

    db.remove_if_empty(key);
    Ok(Reply::count(removed))
}

/// HLEN key
pub fn hlen(db: &mut Db, request: &Request) -> CommandResult {
    let len = hash_ref(db, &request.args[0])?.map_or(0, HashMap::len);
    Ok(Reply::count(len))
}

/// HGETALL key
///
/// Fields and values flattened as `field, value, field, value, ...`.
pub fn hgetall(db: &mut Db, request: &Request) -> CommandResult {
    let items = hash_ref(db, &request.args[0])?
        .map(|hash| {
            hash.iter()
                .flat_map(|(field, value)| [field.clone(), value.clone()])
                .collect()
        })
        .unwrap_or_default();
    Ok(Reply::collection(ReplyKind::Hash, items))
}
