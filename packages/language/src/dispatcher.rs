//! # Mutation Dispatcher
//!
//! Three independent broadcast channels (node, child set, scope) owned by the editing session.
//!
//! ```text
//!   session op ──► Channel::fire(&mutation)
//!                     │ snapshot subscriber list
//!                     ├──► local subscribers whose filter == mutation.target()
//!                     └──► global subscribers (only if mutation.is_global())
//! ```
//!
//! Fan-out is synchronous over the list as it stood when the event fired: a subscriber added
//! during dispatch misses the in-flight event, and one removed during dispatch is skipped.
//! Subscribing returns a [`Subscription`] guard that deregisters on drop.

use crate::mutations::{ChildSetMutation, Mutation, NodeMutation, ScopeMutation};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

type Handler<M> = Rc<RefCell<dyn FnMut(&M)>>;

struct Subscriber<M: Mutation> {
    id: u64,
    filter: Option<M::Target>,
    handler: Handler<M>,
}

struct Registry<M: Mutation> {
    next_id: u64,
    subscribers: Vec<Subscriber<M>>,
}

impl<M: Mutation> Registry<M> {
    fn contains(&self, id: u64) -> bool {
        self.subscribers.iter().any(|s| s.id == id)
    }
}

trait Deregister {
    fn deregister(&self, id: u64);
}

impl<M: Mutation> Deregister for RefCell<Registry<M>> {
    fn deregister(&self, id: u64) {
        match self.try_borrow_mut() {
            Ok(mut registry) => registry.subscribers.retain(|s| s.id != id),
            Err(_) => tracing::warn!(subscription = id, "registry busy, subscription not removed"),
        }
    }
}

/// Guard for a registered observer. Dropping it deregisters the observer.
#[must_use = "dropping a subscription immediately deregisters it"]
pub struct Subscription {
    id: u64,
    registry: Option<Weak<dyn Deregister>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Deregister now. Calling this on an already-removed observer is a no-op.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(registry) = self.registry.take().and_then(|weak| weak.upgrade()) {
            registry.deregister(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Broadcast channel for one mutation type
pub struct Channel<M: Mutation> {
    registry: Rc<RefCell<Registry<M>>>,
}

impl<M: Mutation + 'static> Channel<M> {
    pub fn new() -> Self {
        Self {
            registry: Rc::new(RefCell::new(Registry {
                next_id: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Observe every global event on this channel.
    pub fn subscribe(&self, handler: impl FnMut(&M) + 'static) -> Subscription {
        self.register(None, Rc::new(RefCell::new(handler)))
    }

    /// Observe events about a single node, child set or scope, including local-only ones.
    pub fn subscribe_to(&self, target: M::Target, handler: impl FnMut(&M) + 'static) -> Subscription {
        self.register(Some(target), Rc::new(RefCell::new(handler)))
    }

    fn register(&self, filter: Option<M::Target>, handler: Handler<M>) -> Subscription {
        let mut registry = self.registry.borrow_mut();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.subscribers.push(Subscriber { id, filter, handler });
        let weak: Weak<RefCell<Registry<M>>> = Rc::downgrade(&self.registry);
        let weak: Weak<dyn Deregister> = weak;
        Subscription {
            id,
            registry: Some(weak),
        }
    }

    pub fn fire(&self, mutation: &M) {
        let target = mutation.target();
        let global = mutation.is_global();
        let snapshot: Vec<(u64, Handler<M>)> = self
            .registry
            .borrow()
            .subscribers
            .iter()
            .filter(|s| match s.filter {
                Some(filter) => filter == target,
                None => global,
            })
            .map(|s| (s.id, Rc::clone(&s.handler)))
            .collect();

        for (id, handler) in snapshot {
            if !self.registry.borrow().contains(id) {
                continue;
            }
            match handler.try_borrow_mut() {
                Ok(mut handler) => (&mut *handler)(mutation),
                Err(_) => {
                    tracing::warn!(subscription = id, target = ?target, "skipping re-entrant dispatch")
                }
            };
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.borrow().subscribers.len()
    }

    /// Drop every subscriber. Outstanding guards become inert.
    pub fn clear(&self) {
        self.registry.borrow_mut().subscribers.clear();
    }
}

impl<M: Mutation + 'static> Default for Channel<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// The session's three channels
#[derive(Default)]
pub struct MutationDispatcher {
    pub nodes: Channel<NodeMutation>,
    pub child_sets: Channel<ChildSetMutation>,
    pub scopes: Channel<ScopeMutation>,
}

impl MutationDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&self) {
        self.nodes.clear();
        self.child_sets.clear();
        self.scopes.clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.nodes.subscriber_count() + self.child_sets.subscriber_count() + self.scopes.subscriber_count()
    }
}

impl std::fmt::Debug for MutationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationDispatcher")
            .field("nodes", &self.nodes.subscriber_count())
            .field("child_sets", &self.child_sets.subscriber_count())
            .field("scopes", &self.scopes.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutations::NodeMutationKind;
    use crate::tree::NodeId;
    use std::cell::Cell;

    fn property_mutation(node: u32) -> NodeMutation {
        NodeMutation {
            node: NodeId(node),
            kind: NodeMutationKind::SetProperty {
                property: "value".to_string(),
                value: serde_json::json!("x"),
            },
        }
    }

    #[test]
    fn test_global_and_local_delivery() {
        let channel: Channel<NodeMutation> = Channel::new();
        let global = Rc::new(Cell::new(0));
        let local = Rc::new(Cell::new(0));

        let g = Rc::clone(&global);
        let _global_sub = channel.subscribe(move |_| g.set(g.get() + 1));
        let l = Rc::clone(&local);
        let _local_sub = channel.subscribe_to(NodeId(7), move |_| l.set(l.get() + 1));

        channel.fire(&property_mutation(7));
        channel.fire(&property_mutation(8));

        assert_eq!(global.get(), 2);
        assert_eq!(local.get(), 1);
    }

    #[test]
    fn test_runtime_annotations_skip_global() {
        let channel: Channel<NodeMutation> = Channel::new();
        let global = Rc::new(Cell::new(0));
        let local = Rc::new(Cell::new(0));
        let g = Rc::clone(&global);
        let _a = channel.subscribe(move |_| g.set(g.get() + 1));
        let l = Rc::clone(&local);
        let _b = channel.subscribe_to(NodeId(1), move |_| l.set(l.get() + 1));

        channel.fire(&NodeMutation {
            node: NodeId(1),
            kind: NodeMutationKind::SetRuntimeAnnotations { annotations: vec![] },
        });

        assert_eq!(global.get(), 0);
        assert_eq!(local.get(), 1);
    }

    #[test]
    fn test_drop_deregisters() {
        let channel: Channel<NodeMutation> = Channel::new();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let sub = channel.subscribe(move |_| c.set(c.get() + 1));
        assert_eq!(channel.subscriber_count(), 1);

        drop(sub);
        channel.fire(&property_mutation(1));

        assert_eq!(channel.subscriber_count(), 0);
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_unsubscribe_after_clear_is_noop() {
        let channel: Channel<NodeMutation> = Channel::new();
        let sub = channel.subscribe(|_| {});
        channel.clear();
        sub.unsubscribe();
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[test]
    fn test_removed_during_dispatch_is_skipped() {
        let channel: Channel<NodeMutation> = Channel::new();
        let victim_calls = Rc::new(Cell::new(0));
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let s = Rc::clone(&slot);
        let _killer = channel.subscribe(move |_| {
            s.borrow_mut().take();
        });
        let v = Rc::clone(&victim_calls);
        *slot.borrow_mut() = Some(channel.subscribe(move |_| v.set(v.get() + 1)));

        channel.fire(&property_mutation(1));

        assert_eq!(victim_calls.get(), 0);
        assert_eq!(channel.subscriber_count(), 1);
    }

    #[test]
    fn test_added_during_dispatch_misses_event() {
        let channel: Rc<Channel<NodeMutation>> = Rc::new(Channel::new());
        let late_calls = Rc::new(Cell::new(0));
        let held: Rc<RefCell<Vec<Subscription>>> = Rc::new(RefCell::new(Vec::new()));

        let ch = Rc::clone(&channel);
        let h = Rc::clone(&held);
        let late = Rc::clone(&late_calls);
        let _adder = channel.subscribe(move |_| {
            let late = Rc::clone(&late);
            h.borrow_mut().push(ch.subscribe(move |_| late.set(late.get() + 1)));
        });

        channel.fire(&property_mutation(1));
        assert_eq!(late_calls.get(), 0);

        channel.fire(&property_mutation(1));
        assert_eq!(late_calls.get(), 1);
    }
}
