//! Typed change delivery for sweeps over domain items.

use std::marker::PhantomData;

use super::change::{ChangeEvent, ChangeSink, SinkError};

/// Receives changes as typed identities and domain items instead of raw
/// records.
///
/// Inserts and updates carry the source item that produced them. Deletes
/// only carry the identity, decoded from the snapshot key.
pub trait ItemSink<Id, T> {
    fn on_added(&mut self, id: Id, item: &T) -> Result<(), SinkError>;
    fn on_updated(&mut self, id: Id, item: &T) -> Result<(), SinkError>;
    fn on_deleted(&mut self, id: Id) -> Result<(), SinkError>;
}

impl<Id, T, S: ItemSink<Id, T> + ?Sized> ItemSink<Id, T> for &mut S {
    fn on_added(&mut self, id: Id, item: &T) -> Result<(), SinkError> {
        (**self).on_added(id, item)
    }

    fn on_updated(&mut self, id: Id, item: &T) -> Result<(), SinkError> {
        (**self).on_updated(id, item)
    }

    fn on_deleted(&mut self, id: Id) -> Result<(), SinkError> {
        (**self).on_deleted(id)
    }
}

/// Owned typed change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemChange<Id, T> {
    Added(Id, T),
    Updated(Id, T),
    Deleted(Id),
}

impl<Id, T: Clone> ItemSink<Id, T> for Vec<ItemChange<Id, T>> {
    fn on_added(&mut self, id: Id, item: &T) -> Result<(), SinkError> {
        self.push(ItemChange::Added(id, item.clone()));
        Ok(())
    }

    fn on_updated(&mut self, id: Id, item: &T) -> Result<(), SinkError> {
        self.push(ItemChange::Updated(id, item.clone()));
        Ok(())
    }

    fn on_deleted(&mut self, id: Id) -> Result<(), SinkError> {
        self.push(ItemChange::Deleted(id));
        Ok(())
    }
}

/// Bridges record-level events to an [`ItemSink`].
///
/// The merge classifies a source record while it is being fed, so the
/// driver parks the item in `current` right before feeding its record.
pub(crate) struct ItemAdapter<D, S, T, Id> {
    decode: D,
    sink: S,
    pub(crate) current: Option<T>,
    _id: PhantomData<fn() -> Id>,
}

impl<D, S, T, Id> ItemAdapter<D, S, T, Id> {
    pub(crate) fn new(decode: D, sink: S) -> Self {
        Self {
            decode,
            sink,
            current: None,
            _id: PhantomData,
        }
    }
}

impl<D, S, T, Id> ChangeSink for ItemAdapter<D, S, T, Id>
where
    D: Fn(&[u8]) -> Id,
    S: ItemSink<Id, T>,
{
    fn on_change(&mut self, event: ChangeEvent<'_>) -> Result<(), SinkError> {
        let id = (self.decode)(event.key());
        match event {
            ChangeEvent::Insert(_) => {
                let item = self.current.as_ref().ok_or_else(missing_item)?;
                self.sink.on_added(id, item)
            }
            ChangeEvent::Update { .. } => {
                let item = self.current.as_ref().ok_or_else(missing_item)?;
                self.sink.on_updated(id, item)
            }
            ChangeEvent::Delete(_) => self.sink.on_deleted(id),
        }
    }
}

fn missing_item() -> SinkError {
    "change without a source item in flight".into()
}
