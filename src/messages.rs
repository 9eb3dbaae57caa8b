//! Event-thread to update-thread message queue.
//!
//! The event thread never touches scene state directly; it enqueues
//! closures that the update thread applies at the start of the next frame,
//! before any property reads. That ordering is the only synchronization
//! between the two threads besides the buffer-index flip.

use std::sync::mpsc::{channel, Receiver, Sender};

use log::trace;

use crate::core::Scene;

/// A deferred scene mutation.
pub type Message = Box<dyn FnOnce(&mut Scene) + Send>;

/// Cloneable handle for enqueueing messages from the event thread.
#[derive(Clone)]
pub struct MessageSender {
    sender: Sender<Message>,
}

impl MessageSender {
    /// Enqueue a mutation for the next frame. Messages sent after the
    /// update thread has shut down are dropped.
    pub fn send(&self, message: Message) {
        let _ = self.sender.send(message);
    }
}

/// The update-thread end of the queue.
pub struct MessageQueue {
    sender: Sender<Message>,
    receiver: Receiver<Message>,
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageQueue {
    pub fn new() -> Self {
        let (sender, receiver) = channel();
        Self { sender, receiver }
    }

    pub fn sender(&self) -> MessageSender {
        MessageSender {
            sender: self.sender.clone(),
        }
    }

    /// Apply every queued message, in send order. Called exactly once per
    /// frame, before property reads.
    pub fn process(&mut self, scene: &mut Scene) {
        let mut count = 0usize;
        while let Ok(message) = self.receiver.try_recv() {
            message(scene);
            count += 1;
        }
        if count > 0 {
            trace!("applied {} queued messages", count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vector3;

    #[test]
    fn test_messages_apply_in_send_order() {
        let mut queue = MessageQueue::new();
        let mut scene = Scene::new(crate::math::Vector2::new(480.0, 800.0));
        let node = scene.nodes.create_node();

        let sender = queue.sender();
        sender.send(Box::new(move |scene: &mut Scene| {
            if let Some(n) = scene.nodes.get_mut(node) {
                n.position.set(0, Vector3::new(1.0, 0.0, 0.0));
            }
        }));
        sender.send(Box::new(move |scene: &mut Scene| {
            if let Some(n) = scene.nodes.get_mut(node) {
                n.position.set(0, Vector3::new(2.0, 0.0, 0.0));
            }
        }));

        queue.process(&mut scene);
        assert_eq!(scene.nodes.get(node).unwrap().position.get(0).x, 2.0);
    }

    #[test]
    fn test_senders_work_across_threads() {
        let mut queue = MessageQueue::new();
        let mut scene = Scene::new(crate::math::Vector2::new(480.0, 800.0));
        let node = scene.nodes.create_node();

        let sender = queue.sender();
        let handle = std::thread::spawn(move || {
            sender.send(Box::new(move |scene: &mut Scene| {
                if let Some(n) = scene.nodes.get_mut(node) {
                    n.opacity.set(0, 0.5);
                }
            }));
        });
        handle.join().unwrap();

        queue.process(&mut scene);
        assert_eq!(*scene.nodes.get(node).unwrap().opacity.get(0), 0.5);
    }
}
