//! Process-wide mapping from live requests to their session registries.
//!
//! Every thread servicing a request goes through a single lock here, so the
//! mapping stays consistent under any mix of readers and writers. Entries are
//! removed with [`clear`], which [`RequestContext`](super::RequestContext)
//! does on drop; [`purge`] sweeps entries whose request never finished.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use super::ContextId;
use crate::Registry;

/// A registry shared between the binding and the request that owns it.
pub type SharedRegistry = Arc<Mutex<Registry>>;

#[derive(Debug)]
struct Binding {
    registry: SharedRegistry,
    bound_at: Instant,
}

static BINDINGS: LazyLock<RwLock<HashMap<ContextId, Binding>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Attaches `registry` to the request, replacing any previous one.
pub fn set(id: ContextId, registry: SharedRegistry) {
    BINDINGS.write().insert(
        id,
        Binding {
            registry,
            bound_at: Instant::now(),
        },
    );
}

/// The registry attached to the request, if any.
pub fn get(id: ContextId) -> Option<SharedRegistry> {
    BINDINGS
        .read()
        .get(&id)
        .map(|binding| Arc::clone(&binding.registry))
}

/// The registry attached to the request, attaching an empty one first if needed.
pub fn get_or_insert(id: ContextId) -> SharedRegistry {
    if let Some(registry) = get(id) {
        return registry;
    }

    let mut bindings = BINDINGS.write();
    let binding = bindings.entry(id).or_insert_with(|| Binding {
        registry: SharedRegistry::default(),
        bound_at: Instant::now(),
    });
    Arc::clone(&binding.registry)
}

/// Detaches the request's registry, returning it.
pub fn clear(id: ContextId) -> Option<SharedRegistry> {
    BINDINGS.write().remove(&id).map(|binding| binding.registry)
}

/// Removes bindings attached longer than `max_age` ago and returns how many
/// were removed. A zero `max_age` removes every binding.
pub fn purge(max_age: Duration) -> usize {
    let mut bindings = BINDINGS.write();
    let before = bindings.len();

    if max_age.is_zero() {
        bindings.clear();
    } else {
        let now = Instant::now();
        bindings.retain(|_, binding| now.duration_since(binding.bound_at) <= max_age);
    }

    let purged = before - bindings.len();
    if purged > 0 {
        tracing::debug!(purged, "purged stale request bindings");
    }
    purged
}

/// The number of live bindings.
pub fn len() -> usize {
    BINDINGS.read().len()
}
