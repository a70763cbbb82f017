//! Building blocks shared by the in-memory store actor.
//!
//! - [`Entity`]: a record kept in a [`Table`], with lifecycle hooks and
//!   domain-specific actions.
//! - [`Table`]: keyed storage that drives those hooks. Cloneable, so a
//!   transaction can stage writes on a copy and swap it in on commit.
//! - [`Response`] and [`request!`]: the oneshot reply plumbing every actor
//!   message uses.

use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::hash::Hash;
use tokio::sync::oneshot;

use crate::store::StoreError;

// =============================================================================
// 1. THE ABSTRACTION
// =============================================================================

/// Trait that any record kept by the store actor must implement.
pub trait Entity: Clone + Send + Sync + 'static {
    type Id: Eq + Hash + Copy + Send + Sync + Display + Debug;
    type CreateParams: Send + Debug;
    type Patch: Send + Debug;
    type Action: Send + Debug;
    type ActionResult: Send + Debug;

    fn id(&self) -> &Self::Id;

    /// Error reported when `id` is not in the table.
    fn not_found(id: Self::Id) -> StoreError;

    /// Construct the full entity from a fresh id and the creation payload.
    fn from_create_params(id: Self::Id, params: Self::CreateParams) -> Result<Self, StoreError>;

    // --- Lifecycle Hooks ---

    fn on_create(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn on_update(&mut self, patch: Self::Patch) -> Result<(), StoreError>;

    /// Handle a domain-specific action. Must leave `self` untouched on error.
    fn handle_action(&mut self, action: Self::Action) -> Result<Self::ActionResult, StoreError>;
}

// =============================================================================
// 2. THE GENERIC TABLE
// =============================================================================

#[derive(Clone)]
pub struct Table<T: Entity> {
    rows: HashMap<T::Id, T>,
    next_id: fn() -> T::Id,
}

impl<T: Entity> Table<T> {
    pub fn new(next_id: fn() -> T::Id) -> Self {
        Self {
            rows: HashMap::new(),
            next_id,
        }
    }

    pub fn create(&mut self, params: T::CreateParams) -> Result<T, StoreError> {
        let id = (self.next_id)();
        let mut item = T::from_create_params(id, params)?;
        item.on_create()?;
        self.rows.insert(id, item.clone());
        Ok(item)
    }

    pub fn get(&self, id: T::Id) -> Option<&T> {
        self.rows.get(&id)
    }

    pub fn require(&self, id: T::Id) -> Result<&T, StoreError> {
        self.rows.get(&id).ok_or_else(|| T::not_found(id))
    }

    pub fn update(&mut self, id: T::Id, patch: T::Patch) -> Result<T, StoreError> {
        let item = self.rows.get_mut(&id).ok_or_else(|| T::not_found(id))?;
        // Hooks may fail halfway; only keep the result if they succeed.
        let mut updated = item.clone();
        updated.on_update(patch)?;
        *item = updated.clone();
        Ok(updated)
    }

    pub fn perform(&mut self, id: T::Id, action: T::Action) -> Result<T::ActionResult, StoreError> {
        let item = self.rows.get_mut(&id).ok_or_else(|| T::not_found(id))?;
        item.handle_action(action)
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.rows.values()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

// =============================================================================
// 3. THE GENERIC MESSAGES
// =============================================================================

pub type Response<T> = oneshot::Sender<Result<T, StoreError>>;

/// Reply on a [`Response`] channel. A caller that gave up waiting is not an
/// error for the actor.
pub fn respond<T>(respond_to: Response<T>, result: Result<T, StoreError>) {
    let _ = respond_to.send(result);
}

/// Send a request to an actor and await its reply.
///
/// Builds the oneshot channel, fills in the `respond_to` field of the
/// variant, and maps a closed mailbox to `$closed`.
macro_rules! request {
    ($sender:expr, $request:ident::$variant:ident { $($field:ident $(: $value:expr)?),* $(,)? }, closed = $closed:expr) => {{
        tracing::debug!("Sending request");
        let (respond_to, response) = tokio::sync::oneshot::channel();
        $sender
            .send($request::$variant { $($field $(: $value)?,)* respond_to })
            .await
            .map_err(|_| $closed)?;
        response.await.map_err(|_| $closed)?
    }};
}

pub(crate) use request;
