// In-process key-value facade with the contract the engines are written
// against: strings with TTL, hashes with integer/float increments, sorted
// sets with reverse ranking, sets, expiry, and pub/sub. Engines only ever
// touch their own key prefixes, and only through these methods, so a
// networked KV client can replace this implementation behind the same API.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvError {
    WrongType(String),
    NotNumeric(String),
}

impl std::fmt::Display for KvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KvError::WrongType(key) => write!(f, "wrong value type at key {key}"),
            KvError::NotNumeric(field) => write!(f, "field {field} holds a non-numeric value"),
        }
    }
}

pub type KvResult<T> = Result<T, KvError>;

/// A message published on a channel. One broadcast stream carries all
/// channels; subscribers filter by name.
#[derive(Debug, Clone)]
pub struct KvMessage {
    pub channel: String,
    pub payload: String,
}

enum Value {
    Str(String),
    Hash(HashMap<String, String>),
    // member -> (score, insertion seq). The seq is the tie-break: equal
    // scores rank in insertion order, stable within a rebuild.
    ZSet(HashMap<String, (f64, u64)>),
    Set(HashSet<String>),
}

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

#[derive(Clone)]
pub struct Kv {
    inner: Arc<RwLock<HashMap<String, Entry>>>,
    seq: Arc<AtomicU64>,
    pubsub: broadcast::Sender<KvMessage>,
}

impl Default for Kv {
    fn default() -> Self {
        Self::new()
    }
}

impl Kv {
    pub fn new() -> Self {
        let (pubsub, _) = broadcast::channel(1024);
        Kv {
            inner: Arc::new(RwLock::new(HashMap::new())),
            seq: Arc::new(AtomicU64::new(0)),
            pubsub,
        }
    }

    // --- strings ---

    pub fn get(&self, key: &str) -> KvResult<Option<String>> {
        let mut map = self.write();
        match live_entry(&mut map, key) {
            Some(Entry { value: Value::Str(s), .. }) => Ok(Some(s.clone())),
            Some(_) => Err(KvError::WrongType(key.to_string())),
            None => Ok(None),
        }
    }

    pub fn set(&self, key: &str, value: &str) -> KvResult<()> {
        self.set_entry(key, Value::Str(value.to_string()), None);
        Ok(())
    }

    pub fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> KvResult<()> {
        self.set_entry(key, Value::Str(value.to_string()), Some(ttl));
        Ok(())
    }

    // --- hashes ---

    pub fn hset(&self, key: &str, field: &str, value: &str) -> KvResult<()> {
        let mut map = self.write();
        let hash = hash_entry(&mut map, key)?;
        hash.insert(field.to_string(), value.to_string());
        Ok(())
    }

    pub fn hset_multi(&self, key: &str, fields: &[(&str, String)]) -> KvResult<()> {
        let mut map = self.write();
        let hash = hash_entry(&mut map, key)?;
        for (field, value) in fields {
            hash.insert((*field).to_string(), value.clone());
        }
        Ok(())
    }

    pub fn hget(&self, key: &str, field: &str) -> KvResult<Option<String>> {
        let mut map = self.write();
        match live_entry(&mut map, key) {
            Some(Entry { value: Value::Hash(h), .. }) => Ok(h.get(field).cloned()),
            Some(_) => Err(KvError::WrongType(key.to_string())),
            None => Ok(None),
        }
    }

    pub fn hgetall(&self, key: &str) -> KvResult<HashMap<String, String>> {
        let mut map = self.write();
        match live_entry(&mut map, key) {
            Some(Entry { value: Value::Hash(h), .. }) => Ok(h.clone()),
            Some(_) => Err(KvError::WrongType(key.to_string())),
            None => Ok(HashMap::new()),
        }
    }

    pub fn hincrby(&self, key: &str, field: &str, delta: i64) -> KvResult<i64> {
        let mut map = self.write();
        let hash = hash_entry(&mut map, key)?;
        let current: i64 = match hash.get(field) {
            Some(v) => v.parse().map_err(|_| KvError::NotNumeric(field.to_string()))?,
            None => 0,
        };
        let next = current + delta;
        hash.insert(field.to_string(), next.to_string());
        Ok(next)
    }

    pub fn hincrbyfloat(&self, key: &str, field: &str, delta: f64) -> KvResult<f64> {
        let mut map = self.write();
        let hash = hash_entry(&mut map, key)?;
        let current: f64 = match hash.get(field) {
            Some(v) => v.parse().map_err(|_| KvError::NotNumeric(field.to_string()))?,
            None => 0.0,
        };
        let next = current + delta;
        hash.insert(field.to_string(), next.to_string());
        Ok(next)
    }

    pub fn hdel(&self, key: &str, field: &str) -> KvResult<bool> {
        let mut map = self.write();
        match live_entry(&mut map, key) {
            Some(Entry { value: Value::Hash(h), .. }) => Ok(h.remove(field).is_some()),
            Some(_) => Err(KvError::WrongType(key.to_string())),
            None => Ok(false),
        }
    }

    pub fn hlen(&self, key: &str) -> KvResult<usize> {
        let mut map = self.write();
        match live_entry(&mut map, key) {
            Some(Entry { value: Value::Hash(h), .. }) => Ok(h.len()),
            Some(_) => Err(KvError::WrongType(key.to_string())),
            None => Ok(0),
        }
    }

    // --- sorted sets ---

    pub fn zadd(&self, key: &str, member: &str, score: f64) -> KvResult<()> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let mut map = self.write();
        let zset = zset_entry(&mut map, key)?;
        // Keep the original insertion seq when re-scoring an existing
        // member so ties stay stable across score updates.
        let seq = zset.get(member).map(|(_, s)| *s).unwrap_or(seq);
        zset.insert(member.to_string(), (score, seq));
        Ok(())
    }

    /// Batched ZADD, used by the leaderboard rebuild path.
    pub fn zadd_batch(&self, key: &str, members: &[(String, f64)]) -> KvResult<()> {
        let mut map = self.write();
        let zset = zset_entry(&mut map, key)?;
        for (member, score) in members {
            let seq = zset
                .get(member)
                .map(|(_, s)| *s)
                .unwrap_or_else(|| self.seq.fetch_add(1, Ordering::Relaxed));
            zset.insert(member.clone(), (*score, seq));
        }
        Ok(())
    }

    /// Members ordered by score descending (ties by insertion order),
    /// inclusive `start..=stop` like the Redis command.
    pub fn zrevrange_withscores(
        &self,
        key: &str,
        start: usize,
        stop: usize,
    ) -> KvResult<Vec<(String, f64)>> {
        let ordered = self.zordered(key)?;
        if start >= ordered.len() {
            return Ok(vec![]);
        }
        let stop = stop.min(ordered.len().saturating_sub(1));
        Ok(ordered[start..=stop].to_vec())
    }

    pub fn zrevrange(&self, key: &str, start: usize, stop: usize) -> KvResult<Vec<String>> {
        Ok(self
            .zrevrange_withscores(key, start, stop)?
            .into_iter()
            .map(|(m, _)| m)
            .collect())
    }

    /// 0-based rank in descending score order, `None` when absent.
    pub fn zrevrank(&self, key: &str, member: &str) -> KvResult<Option<usize>> {
        Ok(self
            .zordered(key)?
            .iter()
            .position(|(m, _)| m == member))
    }

    pub fn zscore(&self, key: &str, member: &str) -> KvResult<Option<f64>> {
        let mut map = self.write();
        match live_entry(&mut map, key) {
            Some(Entry { value: Value::ZSet(z), .. }) => Ok(z.get(member).map(|(s, _)| *s)),
            Some(_) => Err(KvError::WrongType(key.to_string())),
            None => Ok(None),
        }
    }

    pub fn zrem(&self, key: &str, member: &str) -> KvResult<bool> {
        let mut map = self.write();
        match live_entry(&mut map, key) {
            Some(Entry { value: Value::ZSet(z), .. }) => Ok(z.remove(member).is_some()),
            Some(_) => Err(KvError::WrongType(key.to_string())),
            None => Ok(false),
        }
    }

    pub fn zcard(&self, key: &str) -> KvResult<usize> {
        let mut map = self.write();
        match live_entry(&mut map, key) {
            Some(Entry { value: Value::ZSet(z), .. }) => Ok(z.len()),
            Some(_) => Err(KvError::WrongType(key.to_string())),
            None => Ok(0),
        }
    }

    /// Atomically remove and return the lowest-scored member whose score is
    /// at most `max_score`. This is the queue's claim primitive.
    pub fn zpop_ready(&self, key: &str, max_score: f64) -> KvResult<Option<(String, f64)>> {
        let mut map = self.write();
        match live_entry(&mut map, key) {
            Some(Entry { value: Value::ZSet(z), .. }) => {
                let best = z
                    .iter()
                    .filter(|(_, (score, _))| *score <= max_score)
                    .min_by(|(_, (sa, qa)), (_, (sb, qb))| {
                        sa.partial_cmp(sb)
                            .unwrap_or(std::cmp::Ordering::Equal)
                            .then(qa.cmp(qb))
                    })
                    .map(|(m, (s, _))| (m.clone(), *s));
                if let Some((member, score)) = best {
                    z.remove(&member);
                    Ok(Some((member, score)))
                } else {
                    Ok(None)
                }
            }
            Some(_) => Err(KvError::WrongType(key.to_string())),
            None => Ok(None),
        }
    }

    /// Count of members with score strictly greater than `min_score`.
    pub fn zcount_above(&self, key: &str, min_score: f64) -> KvResult<usize> {
        let mut map = self.write();
        match live_entry(&mut map, key) {
            Some(Entry { value: Value::ZSet(z), .. }) => {
                Ok(z.values().filter(|(s, _)| *s > min_score).count())
            }
            Some(_) => Err(KvError::WrongType(key.to_string())),
            None => Ok(0),
        }
    }

    // --- sets ---

    pub fn sadd(&self, key: &str, member: &str) -> KvResult<bool> {
        let mut map = self.write();
        let set = match live_entry_or_insert(&mut map, key, || Value::Set(HashSet::new())) {
            Entry { value: Value::Set(s), .. } => s,
            _ => return Err(KvError::WrongType(key.to_string())),
        };
        Ok(set.insert(member.to_string()))
    }

    pub fn srem(&self, key: &str, member: &str) -> KvResult<bool> {
        let mut map = self.write();
        match live_entry(&mut map, key) {
            Some(Entry { value: Value::Set(s), .. }) => Ok(s.remove(member)),
            Some(_) => Err(KvError::WrongType(key.to_string())),
            None => Ok(false),
        }
    }

    pub fn smembers(&self, key: &str) -> KvResult<Vec<String>> {
        let mut map = self.write();
        match live_entry(&mut map, key) {
            Some(Entry { value: Value::Set(s), .. }) => {
                let mut members: Vec<String> = s.iter().cloned().collect();
                members.sort();
                Ok(members)
            }
            Some(_) => Err(KvError::WrongType(key.to_string())),
            None => Ok(vec![]),
        }
    }

    pub fn scard(&self, key: &str) -> KvResult<usize> {
        let mut map = self.write();
        match live_entry(&mut map, key) {
            Some(Entry { value: Value::Set(s), .. }) => Ok(s.len()),
            Some(_) => Err(KvError::WrongType(key.to_string())),
            None => Ok(0),
        }
    }

    pub fn sismember(&self, key: &str, member: &str) -> KvResult<bool> {
        let mut map = self.write();
        match live_entry(&mut map, key) {
            Some(Entry { value: Value::Set(s), .. }) => Ok(s.contains(member)),
            Some(_) => Err(KvError::WrongType(key.to_string())),
            None => Ok(false),
        }
    }

    // --- key lifecycle ---

    pub fn expire(&self, key: &str, ttl: Duration) -> KvResult<bool> {
        let mut map = self.write();
        match live_entry(&mut map, key) {
            Some(entry) => {
                entry.expires_at = Some(Instant::now() + ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn del(&self, key: &str) -> KvResult<bool> {
        Ok(self.write().remove(key).is_some())
    }

    pub fn exists(&self, key: &str) -> KvResult<bool> {
        let mut map = self.write();
        Ok(live_entry(&mut map, key).is_some())
    }

    // --- pub/sub ---

    pub fn publish(&self, channel: &str, payload: &str) {
        // No subscribers is not an error.
        let _ = self.pubsub.send(KvMessage {
            channel: channel.to_string(),
            payload: payload.to_string(),
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<KvMessage> {
        self.pubsub.subscribe()
    }

    /// Drop every expired entry. The engines expire lazily on access; this
    /// sweep keeps abandoned keys from accumulating.
    pub fn sweep_expired(&self) -> usize {
        let mut map = self.write();
        let before = map.len();
        map.retain(|_, entry| !entry.expired());
        before - map.len()
    }

    // --- internals ---

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    fn set_entry(&self, key: &str, value: Value, ttl: Option<Duration>) {
        let mut map = self.write();
        map.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: ttl.map(|t| Instant::now() + t),
            },
        );
    }

    fn zordered(&self, key: &str) -> KvResult<Vec<(String, f64)>> {
        let mut map = self.write();
        match live_entry(&mut map, key) {
            Some(Entry { value: Value::ZSet(z), .. }) => {
                let mut members: Vec<(&String, &(f64, u64))> = z.iter().collect();
                members.sort_by(|(_, (sa, qa)), (_, (sb, qb))| {
                    sb.partial_cmp(sa)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then(qa.cmp(qb))
                });
                Ok(members
                    .into_iter()
                    .map(|(m, (s, _))| (m.clone(), *s))
                    .collect())
            }
            Some(_) => Err(KvError::WrongType(key.to_string())),
            None => Ok(vec![]),
        }
    }
}

fn live_entry<'a>(map: &'a mut HashMap<String, Entry>, key: &str) -> Option<&'a mut Entry> {
    if map.get(key).is_some_and(|e| e.expired()) {
        map.remove(key);
    }
    map.get_mut(key)
}

fn live_entry_or_insert<'a>(
    map: &'a mut HashMap<String, Entry>,
    key: &str,
    make: impl FnOnce() -> Value,
) -> &'a mut Entry {
    if map.get(key).is_some_and(|e| e.expired()) {
        map.remove(key);
    }
    map.entry(key.to_string()).or_insert_with(|| Entry {
        value: make(),
        expires_at: None,
    })
}

fn hash_entry<'a>(
    map: &'a mut HashMap<String, Entry>,
    key: &str,
) -> KvResult<&'a mut HashMap<String, String>> {
    match live_entry_or_insert(map, key, || Value::Hash(HashMap::new())) {
        Entry { value: Value::Hash(h), .. } => Ok(h),
        _ => Err(KvError::WrongType(key.to_string())),
    }
}

fn zset_entry<'a>(
    map: &'a mut HashMap<String, Entry>,
    key: &str,
) -> KvResult<&'a mut HashMap<String, (f64, u64)>> {
    match live_entry_or_insert(map, key, || Value::ZSet(HashMap::new())) {
        Entry { value: Value::ZSet(z), .. } => Ok(z),
        _ => Err(KvError::WrongType(key.to_string())),
    }
}

/// Background sweep for expired keys. Exits when the shutdown flag flips.
pub fn spawn_expiry_sweeper(kv: Kv, shutdown: Arc<std::sync::atomic::AtomicBool>) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(30)).await;
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            let purged = kv.sweep_expired();
            if purged > 0 {
                eprintln!("🧹 KV sweep: purged {purged} expired keys");
            }
        }
    });
}
