//! Blob-typed row fields and their discovery

use std::fmt;
use std::io::Read;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, StoreError};

use super::{BlobReader, BlobRef, BlobStore};

/// A row field holding externally stored bytes
///
/// In the table file only the reference string is written (or `null` when
/// unset). A blob is in one of three states:
/// - unset
/// - pending: bytes held in memory by `Blob::from_bytes`, written through
///   the table's blob store on `append`/`update`
/// - stored: a reference, bound to the store that can open it
#[derive(Clone, Default)]
pub struct Blob {
    state: State,
    store: Option<Arc<BlobStore>>,
}

#[derive(Clone, Default, PartialEq)]
enum State {
    #[default]
    Unset,
    Pending(Arc<[u8]>),
    Stored(BlobRef),
}

impl Blob {
    /// A pending blob holding `data` in memory
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        let data: Vec<u8> = data.into();
        Self {
            state: State::Pending(Arc::from(data)),
            store: None,
        }
    }

    /// A stored reference not yet bound to a store
    pub fn from_ref(reference: BlobRef) -> Self {
        Self {
            state: State::Stored(reference),
            store: None,
        }
    }

    pub(crate) fn stored(reference: BlobRef, store: Arc<BlobStore>) -> Self {
        Self {
            state: State::Stored(reference),
            store: Some(store),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.state == State::Unset
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, State::Pending(_))
    }

    /// The content reference, once stored
    pub fn reference(&self) -> Option<&BlobRef> {
        match &self.state {
            State::Stored(reference) => Some(reference),
            _ => None,
        }
    }

    /// Open the content for streaming reads
    pub fn reader(&self) -> Result<BlobReader> {
        match (&self.state, &self.store) {
            (State::Unset, _) => Err(StoreError::BlobNotFound("blob is unset".to_string())),
            (State::Pending(data), _) => Ok(BlobReader::memory(Arc::clone(data))),
            (State::Stored(reference), Some(store)) => store.open(reference),
            (State::Stored(reference), None) => Err(StoreError::BlobNotFound(format!(
                "{} is not bound to a blob store",
                reference
            ))),
        }
    }

    /// Read the whole content into memory
    pub fn read_to_vec(&self) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        self.reader()?.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Make this blob resolvable through `store`
    ///
    /// Pending bytes are written. A stored reference must already exist in
    /// `store`, or be readable from the store it is currently bound to, in
    /// which case it is copied over.
    pub(crate) fn persist_into(&mut self, store: &Arc<BlobStore>) -> Result<()> {
        match &self.state {
            State::Unset => {}
            State::Pending(data) => {
                let reference = store.put(data)?;
                self.state = State::Stored(reference);
            }
            State::Stored(reference) if store.contains(reference) => {}
            State::Stored(reference) => {
                let source = self
                    .store
                    .as_ref()
                    .filter(|other| other.dir() != store.dir())
                    .ok_or_else(|| StoreError::BlobNotFound(reference.to_string()))?;
                let mut reader = source.open(reference)?;
                let mut writer = store.new_blob()?;
                std::io::copy(&mut reader, &mut writer)?;
                writer.commit()?;
            }
        }
        self.store = Some(Arc::clone(store));
        Ok(())
    }

    /// Bind a loaded reference to the store that holds it
    pub(crate) fn bind(&mut self, store: &Arc<BlobStore>) {
        self.store = Some(Arc::clone(store));
    }
}

impl PartialEq for Blob {
    fn eq(&self, other: &Self) -> bool {
        self.state == other.state
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            State::Unset => f.write_str("Blob(unset)"),
            State::Pending(data) => write!(f, "Blob(pending, {} bytes)", data.len()),
            State::Stored(reference) => write!(f, "Blob({})", reference),
        }
    }
}

impl Serialize for Blob {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match &self.state {
            State::Unset => serializer.serialize_none(),
            State::Stored(reference) => reference.serialize(serializer),
            State::Pending(_) => Err(serde::ser::Error::custom(
                "blob payload has not been written to a blob store",
            )),
        }
    }
}

impl<'de> Deserialize<'de> for Blob {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(match Option::<BlobRef>::deserialize(deserializer)? {
            Some(reference) => Blob::from_ref(reference),
            None => Blob::default(),
        })
    }
}

// =============================================================================
// Blob Field Discovery
// =============================================================================

/// Structural visitor over every `Blob` reachable from a value
///
/// Implement it for row types with `blob_fields!`; containers delegate to
/// their elements, so nested structs, `Vec`s and `Option`s are covered by
/// listing the field that holds them.
pub trait BlobFields {
    fn for_each_blob(&self, f: &mut dyn FnMut(&Blob)) {
        let _ = f;
    }

    fn for_each_blob_mut(&mut self, f: &mut dyn FnMut(&mut Blob)) {
        let _ = f;
    }
}

impl BlobFields for Blob {
    fn for_each_blob(&self, f: &mut dyn FnMut(&Blob)) {
        f(self)
    }

    fn for_each_blob_mut(&mut self, f: &mut dyn FnMut(&mut Blob)) {
        f(self)
    }
}

impl<T: BlobFields> BlobFields for Option<T> {
    fn for_each_blob(&self, f: &mut dyn FnMut(&Blob)) {
        if let Some(inner) = self {
            inner.for_each_blob(f);
        }
    }

    fn for_each_blob_mut(&mut self, f: &mut dyn FnMut(&mut Blob)) {
        if let Some(inner) = self {
            inner.for_each_blob_mut(f);
        }
    }
}

impl<T: BlobFields> BlobFields for Box<T> {
    fn for_each_blob(&self, f: &mut dyn FnMut(&Blob)) {
        (**self).for_each_blob(f)
    }

    fn for_each_blob_mut(&mut self, f: &mut dyn FnMut(&mut Blob)) {
        (**self).for_each_blob_mut(f)
    }
}

impl<T: BlobFields> BlobFields for Vec<T> {
    fn for_each_blob(&self, f: &mut dyn FnMut(&Blob)) {
        for item in self {
            item.for_each_blob(f);
        }
    }

    fn for_each_blob_mut(&mut self, f: &mut dyn FnMut(&mut Blob)) {
        for item in self {
            item.for_each_blob_mut(f);
        }
    }
}

impl<T: BlobFields, const N: usize> BlobFields for [T; N] {
    fn for_each_blob(&self, f: &mut dyn FnMut(&Blob)) {
        for item in self {
            item.for_each_blob(f);
        }
    }

    fn for_each_blob_mut(&mut self, f: &mut dyn FnMut(&mut Blob)) {
        for item in self {
            item.for_each_blob_mut(f);
        }
    }
}

/// Implement `BlobFields` for a struct by listing the fields that hold blobs
///
/// ```
/// use linestore::{blob_fields, Blob};
///
/// struct Attachment { name: String, data: Blob }
/// struct Page { title: String, cover: Blob, attachments: Vec<Attachment> }
/// struct Tag { label: String }
///
/// blob_fields!(Attachment { data });
/// blob_fields!(Page { cover, attachments });
/// blob_fields!(Tag {});
/// ```
#[macro_export]
macro_rules! blob_fields {
    ($ty:ty { $($field:ident),* $(,)? }) => {
        impl $crate::BlobFields for $ty {
            fn for_each_blob(&self, f: &mut dyn FnMut(&$crate::Blob)) {
                let _ = &f;
                $( $crate::BlobFields::for_each_blob(&self.$field, f); )*
            }

            fn for_each_blob_mut(&mut self, f: &mut dyn FnMut(&mut $crate::Blob)) {
                let _ = &f;
                $( $crate::BlobFields::for_each_blob_mut(&mut self.$field, f); )*
            }
        }
    };
}
