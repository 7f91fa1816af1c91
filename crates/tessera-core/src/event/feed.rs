// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use super::observer::{ChangeEvent, ChangeObserver, NodeId, NotifyHandler};

/// A change notification as carried by a [`ChangeFeed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeNotification {
    /// The entity that changed.
    pub entity: NodeId,
    /// What changed.
    pub event: ChangeEvent,
}

/// Replicates scene change notifications to every subscribed rendering context.
///
/// Each subscriber owns an unbounded channel. Contexts drain their channel once per
/// frame into their own [`ChangeObserver`], so several contexts (one per GPU, for
/// instance) can share one scene without sharing mutable tracking state.
#[derive(Debug, Default)]
pub struct ChangeFeed {
    subscribers: Vec<flume::Sender<ChangeNotification>>,
}

impl ChangeFeed {
    /// Creates a feed without subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber and returns its receiving end.
    pub fn subscribe(&mut self) -> ChangeReceiver {
        let (sender, receiver) = flume::unbounded();
        self.subscribers.push(sender);
        log::debug!(
            "ChangeFeed: subscriber added ({} total).",
            self.subscribers.len()
        );
        ChangeReceiver { receiver }
    }

    /// Sends a notification to every live subscriber.
    ///
    /// Subscribers whose receiver was dropped are removed. Returns the number of
    /// subscribers that received the notification.
    pub fn publish(&mut self, entity: NodeId, event: ChangeEvent) -> usize {
        let notification = ChangeNotification { entity, event };
        self.subscribers.retain(|sender| match sender.send(notification) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("ChangeFeed: dropping disconnected subscriber: {e}");
                false
            }
        });
        self.subscribers.len()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

/// The receiving end of a [`ChangeFeed`] subscription.
#[derive(Debug)]
pub struct ChangeReceiver {
    receiver: flume::Receiver<ChangeNotification>,
}

impl ChangeReceiver {
    /// Number of notifications waiting to be dispatched.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Drains every pending notification into `observer`, in publication order.
    ///
    /// Returns the number of notifications drained.
    pub fn dispatch_into<P, H>(&self, observer: &mut ChangeObserver<P, H>) -> usize
    where
        P: Clone + PartialEq,
        H: NotifyHandler<P>,
    {
        let mut drained = 0;
        for notification in self.receiver.try_iter() {
            observer.notify(notification.entity, &notification.event);
            drained += 1;
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ChangeKind;

    #[test]
    fn every_subscriber_receives_each_notification() {
        let mut feed = ChangeFeed::new();
        let first = feed.subscribe();
        let second = feed.subscribe();
        let node = NodeId::new(0, 0);

        assert_eq!(feed.publish(node, ChangeEvent::transform()), 2);
        assert_eq!(first.pending(), 1);
        assert_eq!(second.pending(), 1);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let mut feed = ChangeFeed::new();
        let kept = feed.subscribe();
        drop(feed.subscribe());

        assert_eq!(feed.publish(NodeId::new(1, 0), ChangeEvent::transform()), 1);
        assert_eq!(feed.subscriber_count(), 1);
        assert_eq!(kept.pending(), 1);
    }

    #[test]
    fn dispatch_preserves_publication_order() {
        let mut feed = ChangeFeed::new();
        let receiver = feed.subscribe();
        let a = NodeId::new(1, 0);
        let b = NodeId::new(2, 0);
        feed.publish(b, ChangeEvent::new(ChangeKind::Object));
        feed.publish(a, ChangeEvent::transform());
        feed.publish(b, ChangeEvent::transform());

        let mut order = Vec::new();
        {
            let mut observer =
                ChangeObserver::<u32, _>::new(|event: &ChangeEvent, payload: &u32| {
                    order.push((*payload, event.kind));
                });
            observer.attach(a, 10).unwrap();
            observer.attach(b, 20).unwrap();
            assert_eq!(receiver.dispatch_into(&mut observer), 3);
        }
        assert_eq!(
            order,
            vec![
                (20, ChangeKind::Object),
                (10, ChangeKind::Transform),
                (20, ChangeKind::Transform)
            ]
        );
        assert_eq!(receiver.pending(), 0);
    }
}
