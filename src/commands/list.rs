//! List commands: `LPUSH`, `RPUSH`, `LPOP`, `RPOP`, `LLEN`, `LINDEX`,
//! `LSET`, `LRANGE`.

use crate::commands::handler::{parse_integer, CommandError, CommandResult};
use crate::protocol::{Reply, ReplyKind, Request};
use crate::storage::{Db, LinkedList, Object, ObjectKind};
use bytes::Bytes;

fn list_ref<'a>(db: &'a mut Db, key: &[u8]) -> Result<Option<&'a LinkedList<Bytes>>, CommandError> {
    match db.get(key) {
        None => Ok(None),
        Some(Object::List(list)) => Ok(Some(list)),
        Some(_) => Err(CommandError::WrongType),
    }
}

fn list_mut<'a>(
    db: &'a mut Db,
    key: &[u8],
) -> Result<Option<&'a mut LinkedList<Bytes>>, CommandError> {
    match db.get_mut(key) {
        None => Ok(None),
        Some(Object::List(list)) => Ok(Some(list)),
        Some(_) => Err(CommandError::WrongType),
    }
}

#[derive(Clone, Copy)]
enum End {
    Head,
    Tail,
}

fn push(db: &mut Db, request: &Request, end: End) -> CommandResult {
    let Object::List(list) = db.get_or_create(&request.args[0], ObjectKind::List) else {
        return Err(CommandError::WrongType);
    };

    for value in &request.args[1..] {
        match end {
            End::Head => list.push_front(value.clone()),
            End::Tail => list.push_back(value.clone()),
        };
    }

    Ok(Reply::count(list.len()))
}

fn pop(db: &mut Db, request: &Request, end: End) -> CommandResult {
    let key = &request.args[0];
    let popped = match list_mut(db, key)? {
        None => None,
        Some(list) => match end {
            End::Head => list.pop_front(),
            End::Tail => list.pop_back(),
        },
    };

    db.remove_if_empty(key);
    Ok(Reply::bulk_or_nil(popped))
}

/// LPUSH key value [value ...]
pub fn lpush(db: &mut Db, request: &Request) -> CommandResult {
    push(db, request, End::Head)
}

/// RPUSH key value [value ...]
pub fn rpush(db: &mut Db, request: &Request) -> CommandResult {
    push(db, request, End::Tail)
}

/// LPOP key
pub fn lpop(db: &mut Db, request: &Request) -> CommandResult {
    pop(db, request, End::Head)
}

/// RPOP key
pub fn rpop(db: &mut Db, request: &Request) -> CommandResult {
    pop(db, request, End::Tail)
}

/// LLEN key
pub fn llen(db: &mut Db, request: &Request) -> CommandResult {
    let len = list_ref(db, &request.args[0])?.map_or(0, LinkedList::len);
    Ok(Reply::count(len))
}

/// LINDEX key index
///
/// Out-of-range indices reply nil.
pub fn lindex(db: &mut Db, request: &Request) -> CommandResult {
    let index = parse_integer(&request.args[1])?;
    let value = list_ref(db, &request.args[0])?.and_then(|list| list.get(index).cloned());
    Ok(Reply::bulk_or_nil(value))
}

/// LSET key index value
pub fn lset(db: &mut Db, request: &Request) -> CommandResult {
    let index = parse_integer(&request.args[1])?;
    let list = list_mut(db, &request.args[0])?.ok_or(CommandError::NoSuchKey)?;

    list.set(index, request.args[2].clone())
        .ok_or(CommandError::IndexOutOfRange)?;
    Ok(Reply::ok())
}

/// LRANGE key start stop
///
/// Both bounds are clamped into the list, so a range reaching past either
/// end is cut at that end.
pub fn lrange(db: &mut Db, request: &Request) -> CommandResult {
    let start = parse_integer(&request.args[1])?;
    let stop = parse_integer(&request.args[2])?;

    let items = match list_ref(db, &request.args[0])? {
        None => Vec::new(),
        Some(list) => range(list, start, stop),
    };
    Ok(Reply::collection(ReplyKind::List, items))
}

fn range(list: &LinkedList<Bytes>, start: i64, stop: i64) -> Vec<Bytes> {
    let (Some(start), Some(stop)) = (list.clamp_index(start), list.clamp_index(stop)) else {
        return Vec::new();
    };
    if start > stop {
        return Vec::new();
    }

    let mut items = Vec::with_capacity(stop - start + 1);
    let mut cursor = list.node_at(start as i64);
    while let Some(id) = cursor {
        if items.len() > stop - start {
            break;
        }
        if let Some(value) = list.value(id) {
            items.push(value.clone());
        }
        cursor = list.next(id);
    }
    items
}
