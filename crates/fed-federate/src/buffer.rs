//! Inbound interaction buffer.
//!
//! Interactions are delivered on the runtime's message thread but must only
//! take effect during grant processing, so deliveries land in this buffer
//! and are drained at the start of the next grant, in arrival order.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use crate::interaction::Interaction;

/// A FIFO buffer shared between the delivery path and grant processing.
///
/// Cloning is cheap and yields a handle onto the same buffer.
#[derive(Clone, Default)]
pub struct InteractionBuffer {
    inner: Arc<Mutex<VecDeque<Interaction>>>,
}

impl InteractionBuffer {
    pub fn new() -> InteractionBuffer {
        InteractionBuffer::default()
    }

    /// Append a delivered interaction.  Never blocks on grant processing
    /// for longer than the drain itself.
    pub fn push(&self, interaction: Interaction) {
        self.lock().push_back(interaction);
    }

    /// Take every buffered interaction, preserving arrival order.
    pub fn drain(&self) -> Vec<Interaction> {
        self.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Interaction>> {
        // a poisoned buffer still holds valid interactions
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
