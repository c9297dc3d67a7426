//! Handle-based publish/subscribe registry.

use std::collections::BTreeMap;

/// Identifies one subscription; hand it back to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(u64);

type Handler<E> = Box<dyn FnMut(&E) + Send>;

/// Subscribers to events of type `E`, notified in subscription order.
pub struct Subscriptions<E> {
    next: u64,
    handlers: BTreeMap<Token, Handler<E>>,
}

impl<E> Default for Subscriptions<E> {
    fn default() -> Self {
        Self {
            next: 0,
            handlers: BTreeMap::new(),
        }
    }
}

impl<E> std::fmt::Debug for Subscriptions<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriptions")
            .field("subscribers", &self.handlers.len())
            .finish()
    }
}

impl<E> Subscriptions<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, handler: impl FnMut(&E) + Send + 'static) -> Token {
        let token = Token(self.next);
        self.next += 1;
        self.handlers.insert(token, Box::new(handler));
        token
    }

    /// Returns whether the token was still subscribed.
    pub fn unsubscribe(&mut self, token: Token) -> bool {
        self.handlers.remove(&token).is_some()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Deliver `event` to everyone subscribed when the call began.
    pub fn publish(&mut self, event: &E) {
        let tokens: Vec<Token> = self.handlers.keys().copied().collect();
        for token in tokens {
            if let Some(handler) = self.handlers.get_mut(&token) {
                handler(event);
            }
        }
    }
}
