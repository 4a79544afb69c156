use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::token::GameToken;

static HOST_MUTEX: RwLock<HashMap<GameToken, Uuid>> = RwLock::const_new(HashMap::new());

/// Attempts to acquire the process-local host mutex for `code`, returning a
/// fresh token on success. Fails if another host connection already holds
/// it. Narrowed from the teacher's `Games` registry (which owned the whole
/// game object in-process) down to just this mutex, since durable game
/// state now lives in the store.
pub async fn acquire_host(code: GameToken) -> Option<Uuid> {
    let mut lock = HOST_MUTEX.write().await;
    if lock.contains_key(&code) {
        return None;
    }
    let token = Uuid::new_v4();
    lock.insert(code, token);
    Some(token)
}

/// Releases the host mutex for `code`, but only if `token` still owns it.
pub async fn release_host(code: GameToken, token: Uuid) {
    let mut lock = HOST_MUTEX.write().await;
    if lock.get(&code) == Some(&token) {
        lock.remove(&code);
    }
}
