//! # IDs
//! Process-unique identifiers, namespaced by a marker type. Projects use these
//! to compare identity without holding on to the thing they identify.
//!
//! Get a fresh ID with `Default`. IDs of different namespaces may share a numeric value but never compare equal,
//! as they are different types.

// One counter per namespace, created lazily on first use of that namespace.
static ID_SERVER: parking_lot::RwLock<
    std::collections::BTreeMap<std::any::TypeId, std::sync::atomic::AtomicU64>,
> = parking_lot::const_rwlock(std::collections::BTreeMap::new());

/// ID that is unique within this execution of the program, among IDs of the same namespace `T`.
pub struct UniqueID<T: std::any::Any> {
    id: std::num::NonZeroU64,
    _namespace: std::marker::PhantomData<fn() -> T>,
}
impl<T: std::any::Any> Clone for UniqueID<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T: std::any::Any> Copy for UniqueID<T> {}
impl<T: std::any::Any> PartialEq for UniqueID<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl<T: std::any::Any> Eq for UniqueID<T> {}
impl<T: std::any::Any> PartialOrd for UniqueID<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
/// Allocation order. Meaningless beyond giving IDs a total order for sorting.
impl<T: std::any::Any> Ord for UniqueID<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}
impl<T: std::any::Any> std::hash::Hash for UniqueID<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T: std::any::Any> UniqueID<T> {
    /// Get the raw numeric value of this ID.
    #[must_use]
    pub fn get(&self) -> u64 {
        self.id.get()
    }
    fn next() -> Self {
        let ty = std::any::TypeId::of::<T>();
        let fetched = ID_SERVER
            .read()
            .get(&ty)
            .map(|counter| counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed));

        let raw = fetched.unwrap_or_else(|| {
            // First ID of this namespace. Another thread may have raced us here, so go through the entry.
            let mut write = ID_SERVER.write();
            write
                .entry(ty)
                .or_insert_with(|| std::sync::atomic::AtomicU64::new(1))
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
        });

        // Zero is never handed out, and 2^64 allocations will not happen in one process.
        let Some(id) = std::num::NonZeroU64::new(raw) else {
            log::error!("{} ID overflow!", std::any::type_name::<T>());
            panic!("{} ID overflow!", std::any::type_name::<T>());
        };
        Self {
            id,
            _namespace: std::marker::PhantomData,
        }
    }
}
impl<T: std::any::Any> Default for UniqueID<T> {
    fn default() -> Self {
        Self::next()
    }
}
impl<T: std::any::Any> std::fmt::Display for UniqueID<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = std::any::type_name::<T>();
        // rsplit always yields at least one item.
        let short = name.rsplit("::").next().unwrap_or(name);
        write!(f, "{short}#{}", self.id)
    }
}
impl<T: std::any::Any> std::fmt::Debug for UniqueID<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}
