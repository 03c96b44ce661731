//! Typed adapters for statically known reply shapes.
//!
//! Each adapter enforces its shape while the reply is delivered: a scalar
//! rejects aggregates, a sequence rejects nesting, a map rejects everything
//! that is not a map. Shape violations resolve only the request the adapter
//! belongs to; the connection has already parsed the frame and stays up.

use bytes::Bytes;

use crate::{
    adapter::{leaf_error, ResponseAdapter},
    error::{Error, Result},
    resp3::Kind,
};

/// Conversion from a leaf payload into a concrete value.
pub trait FromLeaf: Sized {
    /// Convert the payload of a leaf of `kind` into `Self`.
    fn from_leaf(kind: Kind, payload: &[u8]) -> Result<Self>;
}

impl FromLeaf for i64 {
    fn from_leaf(kind: Kind, payload: &[u8]) -> Result<Self> {
        if kind == Kind::Null {
            return Err(Error::Null);
        }
        if payload.is_empty() {
            return Err(Error::EmptyField);
        }
        std::str::from_utf8(payload)
            .ok()
            .and_then(|text| text.parse().ok())
            .ok_or(Error::NotANumber)
    }
}

impl FromLeaf for f64 {
    fn from_leaf(kind: Kind, payload: &[u8]) -> Result<Self> {
        if kind == Kind::Null {
            return Err(Error::Null);
        }
        if payload.is_empty() {
            return Err(Error::EmptyField);
        }
        std::str::from_utf8(payload)
            .ok()
            .and_then(|text| text.parse().ok())
            .ok_or(Error::NotADouble)
    }
}

impl FromLeaf for bool {
    fn from_leaf(kind: Kind, payload: &[u8]) -> Result<Self> {
        if kind == Kind::Null {
            return Err(Error::Null);
        }
        match payload {
            b"t" => Ok(true),
            b"f" => Ok(false),
            _ => Err(Error::UnexpectedBoolValue),
        }
    }
}

impl FromLeaf for String {
    fn from_leaf(kind: Kind, payload: &[u8]) -> Result<Self> {
        if kind == Kind::Null {
            return Err(Error::Null);
        }
        Ok(String::from_utf8_lossy(payload).into_owned())
    }
}

impl FromLeaf for Bytes {
    fn from_leaf(kind: Kind, payload: &[u8]) -> Result<Self> {
        if kind == Kind::Null {
            return Err(Error::Null);
        }
        Ok(Bytes::copy_from_slice(payload))
    }
}

impl<T: FromLeaf> FromLeaf for Option<T> {
    fn from_leaf(kind: Kind, payload: &[u8]) -> Result<Self> {
        if kind == Kind::Null {
            return Ok(None);
        }
        T::from_leaf(kind, payload).map(Some)
    }
}

/// Adapter for replies that are a single leaf.
#[derive(Clone, Debug, Default)]
pub struct ScalarAdapter<T> {
    value: Option<T>,
}

impl<T: FromLeaf> ScalarAdapter<T> {
    /// Create an empty scalar sink.
    #[must_use]
    pub fn new() -> Self { Self { value: None } }

    /// The decoded value, if the reply has arrived.
    #[must_use]
    pub fn value(&self) -> Option<&T> { self.value.as_ref() }

    /// Take the decoded value out of the adapter.
    pub fn take(&mut self) -> Option<T> { self.value.take() }
}

impl<T: FromLeaf> ResponseAdapter for ScalarAdapter<T> {
    fn on_header(&mut self, _kind: Kind, _count: usize, _depth: usize) -> Result<()> {
        Err(Error::ExpectsSimpleType)
    }

    fn on_leaf(&mut self, kind: Kind, _depth: usize, payload: &[u8]) -> Result<()> {
        // Server errors are reported through `set_error`; swallowing them
        // here keeps the shape check from masking the real failure.
        if leaf_error(kind, payload).is_some() {
            return Ok(());
        }
        self.value = Some(T::from_leaf(kind, payload)?);
        Ok(())
    }
}

/// Scalar sink for a signed integer reply.
pub type IntAdapter = ScalarAdapter<i64>;
/// Scalar sink for a double reply.
pub type DoubleAdapter = ScalarAdapter<f64>;
/// Scalar sink for a boolean reply.
pub type BoolAdapter = ScalarAdapter<bool>;
/// Scalar sink for a textual reply.
pub type StringAdapter = ScalarAdapter<String>;
/// Scalar sink for a binary reply.
pub type BytesAdapter = ScalarAdapter<Bytes>;
/// Scalar sink where a null reply maps to `None`.
pub type OptionalAdapter<T> = ScalarAdapter<Option<T>>;

/// Adapter for flat aggregate replies collected into a vector.
#[derive(Clone, Debug)]
pub struct SeqAdapter<T> {
    items: Vec<T>,
    exact_len: Option<usize>,
}

impl<T: FromLeaf> SeqAdapter<T> {
    /// Accept any flat aggregate of any length.
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            exact_len: None,
        }
    }

    /// Accept only aggregates holding exactly `len` elements.
    #[must_use]
    pub fn with_exact(len: usize) -> Self {
        Self {
            items: Vec::new(),
            exact_len: Some(len),
        }
    }

    /// The collected elements.
    #[must_use]
    pub fn items(&self) -> &[T] { &self.items }

    /// Consume the adapter, returning the collected elements.
    #[must_use]
    pub fn into_items(self) -> Vec<T> { self.items }
}

impl<T: FromLeaf> Default for SeqAdapter<T> {
    fn default() -> Self { Self::new() }
}

impl<T: FromLeaf> ResponseAdapter for SeqAdapter<T> {
    fn on_header(&mut self, _kind: Kind, _count: usize, depth: usize) -> Result<()> {
        if depth > 0 {
            return Err(Error::NestedAggregateUnsupported);
        }
        Ok(())
    }

    fn on_leaf(&mut self, kind: Kind, depth: usize, payload: &[u8]) -> Result<()> {
        if leaf_error(kind, payload).is_some() {
            return Ok(());
        }
        if depth == 0 {
            if kind == Kind::Null {
                return Err(Error::Null);
            }
            return Err(Error::ExpectsAggregateType);
        }
        self.items.push(T::from_leaf(kind, payload)?);
        Ok(())
    }

    fn on_close(&mut self, _kind: Kind, depth: usize) -> Result<()> {
        if depth == 0 {
            if let Some(expected) = self.exact_len {
                if self.items.len() != expected {
                    return Err(Error::IncompatibleSize);
                }
            }
        }
        Ok(())
    }
}

/// Adapter for set replies; any other aggregate kind is rejected.
#[derive(Clone, Debug)]
pub struct SetAdapter<T> {
    items: Vec<T>,
}

impl<T: FromLeaf> SetAdapter<T> {
    /// Create an empty set sink.
    #[must_use]
    pub fn new() -> Self { Self { items: Vec::new() } }

    /// The collected members, in arrival order.
    #[must_use]
    pub fn items(&self) -> &[T] { &self.items }

    /// Consume the adapter, returning the collected members.
    #[must_use]
    pub fn into_items(self) -> Vec<T> { self.items }
}

impl<T: FromLeaf> Default for SetAdapter<T> {
    fn default() -> Self { Self::new() }
}

impl<T: FromLeaf> ResponseAdapter for SetAdapter<T> {
    fn on_header(&mut self, kind: Kind, _count: usize, depth: usize) -> Result<()> {
        if depth > 0 {
            return Err(Error::NestedAggregateUnsupported);
        }
        if kind != Kind::Set {
            return Err(Error::ExpectsSetType);
        }
        Ok(())
    }

    fn on_leaf(&mut self, kind: Kind, depth: usize, payload: &[u8]) -> Result<()> {
        if leaf_error(kind, payload).is_some() {
            return Ok(());
        }
        if depth == 0 {
            return Err(Error::ExpectsAggregateType);
        }
        self.items.push(T::from_leaf(kind, payload)?);
        Ok(())
    }
}

/// Adapter for map replies collected as key-value pairs.
#[derive(Clone, Debug)]
pub struct MapAdapter<V> {
    entries: Vec<(String, V)>,
    pending_key: Option<String>,
}

impl<V: FromLeaf> MapAdapter<V> {
    /// Create an empty map sink.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            pending_key: None,
        }
    }

    /// The collected entries, in arrival order.
    #[must_use]
    pub fn entries(&self) -> &[(String, V)] { &self.entries }

    /// Consume the adapter, returning the collected entries.
    #[must_use]
    pub fn into_entries(self) -> Vec<(String, V)> { self.entries }
}

impl<V: FromLeaf> Default for MapAdapter<V> {
    fn default() -> Self { Self::new() }
}

impl<V: FromLeaf> ResponseAdapter for MapAdapter<V> {
    fn on_header(&mut self, kind: Kind, _count: usize, depth: usize) -> Result<()> {
        if depth > 0 {
            return Err(Error::NestedAggregateUnsupported);
        }
        if kind != Kind::Map {
            return Err(Error::ExpectsMapType);
        }
        Ok(())
    }

    fn on_leaf(&mut self, kind: Kind, depth: usize, payload: &[u8]) -> Result<()> {
        if leaf_error(kind, payload).is_some() {
            return Ok(());
        }
        if depth == 0 {
            return Err(Error::ExpectsAggregateType);
        }
        match self.pending_key.take() {
            None => {
                self.pending_key = Some(String::from_utf8_lossy(payload).into_owned());
            }
            Some(key) => {
                self.entries.push((key, V::from_leaf(kind, payload)?));
            }
        }
        Ok(())
    }

    fn on_close(&mut self, _kind: Kind, depth: usize) -> Result<()> {
        if depth == 0 && self.pending_key.is_some() {
            return Err(Error::IncompatibleSize);
        }
        Ok(())
    }
}
