//! # Redis
//!
//! RAM database backend for the tree store.
//!
//! ## Implementation
//!
//! - One key per document root: `users/{id}`, `decks/{id}`, `user_counter`, `deck_counter`
//! - Documents are JSON strings, deeper paths are edited inside the document
//! - Collections themselves (`users`, `decks`) are not addressable
//! - Top level counters use `INCR`
//! - Counters nested in a document (`decks/{id}/card_counter`) go through a Lua script,
//!   Redis runs scripts atomically so no other write can interleave
//! - Writes below a document root merge into the stored document inside a Lua script too,
//!   so they never write back a stale copy of sibling nodes such as `card_counter`
//!
//! Values are pruned before they leave the process, the merge script only drops
//! ancestors left empty by a removal.
use std::time::Duration;

use async_trait::async_trait;
use redis::{
    AsyncCommands, Client, Script,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use serde_json::{Map, Value};

use crate::{
    error::StoreError,
    store::TreeStore,
    tree::{get_at, prune, segments},
};

const FETCH_ADD_SCRIPT: &str = r#"
local raw = redis.call('GET', KEYS[1])
local doc = {}
if raw then
    doc = cjson.decode(raw)
end

local node = doc
for i = 1, #ARGV - 1 do
    local child = node[ARGV[i]]
    if type(child) ~= 'table' then
        child = {}
        node[ARGV[i]] = child
    end
    node = child
end

local leaf = ARGV[#ARGV]
local current = node[leaf]
if current == nil or current == cjson.null then
    current = 0
end
if type(current) ~= 'number' or current < 0 or current % 1 ~= 0 then
    return redis.error_reply('counter is not a non-negative integer')
end

node[leaf] = current + 1
redis.call('SET', KEYS[1], cjson.encode(doc))
return current
"#;

const MERGE_SCRIPT: &str = r#"
local raw = redis.call('GET', KEYS[1])
local doc = {}
if raw then
    doc = cjson.decode(raw)
end
if type(doc) ~= 'table' then
    doc = {}
end

local children = cjson.decode(ARGV[1])
local trail = { doc }
local node = doc
for i = 2, #ARGV do
    local child = node[ARGV[i]]
    if type(child) ~= 'table' then
        child = {}
        node[ARGV[i]] = child
    end
    node = child
    trail[i] = node
end

for key, value in pairs(children) do
    if value == cjson.null then
        node[key] = nil
    else
        node[key] = value
    end
end

for i = #trail, 2, -1 do
    if next(trail[i]) == nil then
        trail[i - 1][ARGV[i]] = nil
    end
end

if next(doc) == nil then
    redis.call('DEL', KEYS[1])
else
    redis.call('SET', KEYS[1], cjson.encode(doc))
end
return 1
"#;

pub async fn init_redis(redis_url: &str) -> Result<ConnectionManager, StoreError> {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(500));

    let client = Client::open(redis_url)?;
    let connection_manager = client.get_connection_manager_with_config(config).await?;

    Ok(connection_manager)
}

pub struct RedisStore {
    connection: ConnectionManager,
    fetch_add_script: Script,
    merge_script: Script,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        Ok(Self {
            connection: init_redis(redis_url).await?,
            fetch_add_script: Script::new(FETCH_ADD_SCRIPT),
            merge_script: Script::new(MERGE_SCRIPT),
        })
    }

    async fn read_document(&self, key: &str) -> Result<Value, StoreError> {
        let mut connection = self.connection.clone();
        let raw: Option<String> = connection.get(key).await?;

        match raw {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Value::Null),
        }
    }

    async fn write_document(&self, key: &str, document: Value) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();

        match prune(document) {
            Some(document) => {
                let _: () = connection.set(key, serde_json::to_string(&document)?).await?;
            }
            None => {
                let _: () = connection.del(key).await?;
            }
        }

        Ok(())
    }

    /// Writes `children` under `inner` in one script call, `null` children are removed.
    async fn merge_document(
        &self,
        key: &str,
        inner: &[&str],
        children: Map<String, Value>,
    ) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();

        let mut invocation = self.merge_script.key(key);
        for argument in merge_arguments(inner, children)? {
            invocation.arg(argument);
        }
        let _: i64 = invocation.invoke_async(&mut connection).await?;

        Ok(())
    }
}

/// Script arguments: the pruned children as JSON, then the path inside the document.
fn merge_arguments(inner: &[&str], children: Map<String, Value>) -> Result<Vec<String>, StoreError> {
    let children: Map<String, Value> = children
        .into_iter()
        .map(|(key, value)| (key, prune(value).unwrap_or(Value::Null)))
        .collect();

    let mut arguments = vec![serde_json::to_string(&children)?];
    arguments.extend(inner.iter().map(|segment| segment.to_string()));

    Ok(arguments)
}

/// Splits a path into the document key and the segments inside that document.
fn split_path(path: &str) -> (String, Vec<&str>) {
    let segments = segments(path);
    let root = segments.len().min(2);

    (segments[..root].join("/"), segments[root..].to_vec())
}

#[async_trait]
impl TreeStore for RedisStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let (key, inner) = split_path(path);
        let document = self.read_document(&key).await?;

        Ok(get_at(&document, &inner).cloned())
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let (key, inner) = split_path(path);

        match inner.split_last() {
            Some((leaf, parent)) => {
                let children = Map::from_iter([(leaf.to_string(), value)]);
                self.merge_document(&key, parent, children).await
            }
            None => self.write_document(&key, value).await,
        }
    }

    async fn update(&self, path: &str, children: Map<String, Value>) -> Result<(), StoreError> {
        let (key, inner) = split_path(path);

        self.merge_document(&key, &inner, children).await
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.set(path, Value::Null).await
    }

    async fn fetch_add(&self, path: &str) -> Result<u64, StoreError> {
        let (key, inner) = split_path(path);
        let mut connection = self.connection.clone();

        let previous: i64 = if inner.is_empty() {
            let next: i64 = connection.incr(&key, 1).await?;
            next - 1
        } else {
            let mut invocation = self.fetch_add_script.key(&key);
            for segment in &inner {
                invocation.arg(*segment);
            }
            invocation.invoke_async(&mut connection).await?
        };

        u64::try_from(previous).map_err(|_| StoreError::NotACounter(path.to_string()))
    }
}
