//! # Events
//!
//! Subscribers are told about what a transaction, undo, or redo did to the store - after the fact, once the
//! whole change is visible. Delivery is synchronous on the thread that made the change. Within one change,
//! all disappearances are delivered first, then appearances, then field changes, and finally the history event.
//!
//! Subscriptions are held by [`Watch`] handles. The project keeps only weak references to its subscribers,
//! so dropping the handle is all it takes to unsubscribe.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::asset::{Asset, AssetKind, AssetView, FieldName, Value};
use crate::path::AssetPath;

/// An asset is now present at `path` where there was none, or one of another kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Appeared {
    pub path: AssetPath,
    pub asset: Arc<Asset>,
}
impl Appeared {
    #[must_use]
    pub fn view(&self) -> AssetView {
        AssetView::new(self.path.clone(), self.asset.clone())
    }
    #[must_use]
    pub fn kind(&self) -> &AssetKind {
        self.asset.kind()
    }
}

/// The asset that was at `path` is gone. `asset` is its last state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Disappeared {
    pub path: AssetPath,
    pub asset: Arc<Asset>,
}
impl Disappeared {
    #[must_use]
    pub fn view(&self) -> AssetView {
        AssetView::new(self.path.clone(), self.asset.clone())
    }
    #[must_use]
    pub fn kind(&self) -> &AssetKind {
        self.asset.kind()
    }
}

/// A field of an asset that existed both before and after the change now holds a different value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldChanged {
    pub path: AssetPath,
    pub kind: AssetKind,
    pub field: FieldName,
    pub old: Option<Value>,
    pub new: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HistoryEvent {
    Committed { description: Arc<str>, revision: u64 },
    Undone { description: Arc<str>, revision: u64 },
    Redone { description: Arc<str>, revision: u64 },
}
impl HistoryEvent {
    #[must_use]
    pub fn description(&self) -> &str {
        match self {
            Self::Committed { description, .. }
            | Self::Undone { description, .. }
            | Self::Redone { description, .. } => description,
        }
    }
    /// The project revision after the step.
    #[must_use]
    pub fn revision(&self) -> u64 {
        match self {
            Self::Committed { revision, .. }
            | Self::Undone { revision, .. }
            | Self::Redone { revision, .. } => *revision,
        }
    }
}

/// The net effect of one change, in delivery order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventBatch {
    pub disappeared: Vec<Disappeared>,
    pub appeared: Vec<Appeared>,
    pub changed: Vec<FieldChanged>,
}
impl EventBatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.disappeared.is_empty() && self.appeared.is_empty() && self.changed.is_empty()
    }
}

type Callback<E> = Box<dyn FnMut(&E) + Send>;
type Filter<E> = Box<dyn Fn(&E) -> bool + Send + Sync>;

struct Slot<E> {
    alive: AtomicBool,
    callback: parking_lot::Mutex<Option<Callback<E>>>,
    filter: Option<Filter<E>>,
}
impl<E> Slot<E> {
    fn deliver(&self, event: &E) {
        if !self.alive.load(Ordering::Acquire) {
            return;
        }
        if let Some(filter) = &self.filter {
            if !filter(event) {
                return;
            }
        }
        // Locked for the duration of the call. A callback never runs twice at once - the project
        // rejects changes made from inside callbacks, so delivery can't nest.
        if let Some(callback) = self.callback.lock().as_mut() {
            callback(event);
        }
    }
}

/// Type-erased view of a slot, for [`Watch`].
trait Subscription: Send + Sync {
    fn release(&self);
    fn is_active(&self) -> bool;
}
impl<E> Subscription for Slot<E> {
    fn release(&self) {
        self.alive.store(false, Ordering::Release);
        // If this is the slot currently being called, it's dropped along with the slot instead.
        if let Some(mut callback) = self.callback.try_lock() {
            callback.take();
        }
    }
    fn is_active(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}

/// Handle to a subscription. Delivery stops as soon as it is released or dropped, including
/// for the remaining events of a batch currently being delivered.
#[must_use = "dropping a Watch immediately unsubscribes it"]
pub struct Watch {
    slot: Arc<dyn Subscription>,
}
impl Watch {
    /// Stop delivery. Equivalent to dropping the handle.
    pub fn release(self) {}
    /// Whether the subscription is still delivering. Becomes `false` once released.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.slot.is_active()
    }
}
impl Drop for Watch {
    fn drop(&mut self) {
        self.slot.release();
    }
}
impl std::fmt::Debug for Watch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watch")
            .field("active", &self.is_active())
            .finish()
    }
}

/// A list of subscribers to one kind of event.
pub(crate) struct Channel<E> {
    slots: parking_lot::Mutex<Vec<Weak<Slot<E>>>>,
}
impl<E> Default for Channel<E> {
    fn default() -> Self {
        Self {
            slots: Vec::new().into(),
        }
    }
}
impl<E: 'static> Channel<E> {
    pub fn subscribe(
        &self,
        filter: Option<Filter<E>>,
        callback: impl FnMut(&E) + Send + 'static,
    ) -> Watch {
        let slot = Arc::new(Slot {
            alive: AtomicBool::new(true),
            callback: parking_lot::Mutex::new(Some(Box::new(callback))),
            filter,
        });
        let mut slots = self.slots.lock();
        slots.retain(|slot| slot.strong_count() != 0);
        slots.push(Arc::downgrade(&slot));
        Watch { slot }
    }
    /// Deliver every event to every live subscriber, in subscription order.
    pub fn emit_all(&self, events: &[E]) {
        if events.is_empty() {
            return;
        }
        // Collect strong handles and let go of the list, so callbacks may subscribe.
        let live: Vec<Arc<Slot<E>>> = {
            let mut slots = self.slots.lock();
            slots.retain(|slot| slot.strong_count() != 0);
            slots.iter().filter_map(Weak::upgrade).collect()
        };
        for event in events {
            for slot in &live {
                slot.deliver(event);
            }
        }
    }
    pub fn emit(&self, event: &E) {
        self.emit_all(std::slice::from_ref(event));
    }
}

/// Every channel of a project.
#[derive(Default)]
pub(crate) struct Channels {
    pub appear: Channel<Appeared>,
    pub disappear: Channel<Disappeared>,
    pub fields: Channel<FieldChanged>,
    pub history: Channel<HistoryEvent>,
}
impl Channels {
    /// Deliver a whole batch followed by its history event.
    pub fn deliver(&self, batch: &EventBatch, history: Option<&HistoryEvent>) {
        self.disappear.emit_all(&batch.disappeared);
        self.appear.emit_all(&batch.appeared);
        self.fields.emit_all(&batch.changed);
        if let Some(history) = history {
            self.history.emit(history);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter(channel: &Channel<u32>) -> (Watch, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let watch = channel.subscribe(None, {
            let count = count.clone();
            move |_| {
                count.fetch_add(1, Ordering::Relaxed);
            }
        });
        (watch, count)
    }
    #[test]
    fn drop_unsubscribes() {
        let channel = Channel::<u32>::default();
        let (watch, count) = counter(&channel);
        channel.emit(&1);
        assert_eq!(count.load(Ordering::Relaxed), 1);
        drop(watch);
        channel.emit(&2);
        assert_eq!(count.load(Ordering::Relaxed), 1);
        assert!(channel.slots.lock().iter().all(|slot| slot.strong_count() == 0));
    }
    #[test]
    fn filtered() {
        let channel = Channel::<u32>::default();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let _watch = channel.subscribe(Some(Box::new(|n: &u32| n % 2 == 0)), {
            let seen = seen.clone();
            move |n| seen.lock().push(*n)
        });
        channel.emit_all(&[1, 2, 3, 4]);
        assert_eq!(*seen.lock(), [2, 4]);
    }
    #[test]
    fn release_mid_batch() {
        // The first subscriber releases the second after the first event - the second must never see the rest.
        let channel = Channel::<u32>::default();
        let victim: Arc<parking_lot::Mutex<Option<Watch>>> = Arc::default();
        let _killer = channel.subscribe(None, {
            let victim = victim.clone();
            move |_| {
                victim.lock().take();
            }
        });
        let (watch, count) = counter(&channel);
        *victim.lock() = Some(watch);
        channel.emit_all(&[1, 2, 3]);
        assert_eq!(count.load(Ordering::Relaxed), 0);
    }
    #[test]
    fn release_self_in_callback() {
        let channel = Channel::<u32>::default();
        let own: Arc<parking_lot::Mutex<Option<Watch>>> = Arc::default();
        let count = Arc::new(AtomicUsize::new(0));
        let watch = channel.subscribe(None, {
            let own = own.clone();
            let count = count.clone();
            move |_| {
                count.fetch_add(1, Ordering::Relaxed);
                // Releasing while our own callback is running
                own.lock().take();
            }
        });
        assert!(watch.is_active());
        *own.lock() = Some(watch);
        channel.emit_all(&[1, 2]);
        assert_eq!(count.load(Ordering::Relaxed), 1);
        assert!(own.lock().is_none());
    }
}
