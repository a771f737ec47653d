//! Event bus for purchase progress.
//!
//! A thin wrapper over a tokio broadcast channel. Publishing never blocks;
//! subscribers that fall behind lose the oldest events.

use tokio::sync::broadcast;
use voicedeck_types::PurchaseEvent;

/// Broadcast bus carrying `PurchaseEvent`s to any number of subscribers.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<PurchaseEvent>,
}

impl EventBus {
	/// Creates a bus buffering up to `capacity` events per subscriber.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Receives every event published after this call.
	pub fn subscribe(&self) -> broadcast::Receiver<PurchaseEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event, returning the number of subscribers reached.
	///
	/// Fails only when nobody is subscribed.
	pub fn publish(
		&self,
		event: PurchaseEvent,
	) -> Result<usize, broadcast::error::SendError<PurchaseEvent>> {
		self.sender.send(event)
	}
}
