//! Message definitions for the publisher
//!
//! `Message` is what callers hand to `BatchPublisher::publish`. The payload is
//! raw bytes so binary bodies are accepted as-is; text is converted through the
//! `From` impls below.
//!
//! Batches are limited by the size of the request they turn into, so each
//! message can report its encoded length on the wire:
//! - `data` is field 1 (length-delimited)
//! - every attribute is one entry of the map in field 2, itself a message
//!   holding the key (field 1) and the value (field 2)

use std::collections::BTreeMap;

use bytes::Bytes;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub data: Bytes,
    pub attributes: BTreeMap<String, String>,
}

impl Message {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Adds or replaces an attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_attributes<I, K, V>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.attributes.extend(
            attributes
                .into_iter()
                .map(|(k, v)| (k.into(), v.into())),
        );
        self
    }

    /// Size of this message once encoded into a publish request.
    pub fn encoded_len(&self) -> usize {
        let attributes: usize = self
            .attributes
            .iter()
            .map(|(k, v)| field_len(field_len(k.len()) + field_len(v.len())))
            .sum();
        optional_field_len(self.data.len()) + attributes
    }
}

impl From<Bytes> for Message {
    fn from(data: Bytes) -> Self {
        Self::new(data)
    }
}

impl From<Vec<u8>> for Message {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&'static [u8]> for Message {
    fn from(data: &'static [u8]) -> Self {
        Self::new(Bytes::from_static(data))
    }
}

impl From<String> for Message {
    fn from(data: String) -> Self {
        Self::new(data)
    }
}

impl From<&str> for Message {
    fn from(data: &str) -> Self {
        Self::new(Bytes::copy_from_slice(data.as_bytes()))
    }
}

/// Length of a length-delimited field carrying `len` bytes: tag, length prefix, body.
pub(crate) fn field_len(len: usize) -> usize {
    1 + varint_len(len) + len
}

/// Proto3 omits empty scalar fields.
fn optional_field_len(len: usize) -> usize {
    if len == 0 { 0 } else { field_len(len) }
}

fn varint_len(mut value: usize) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}
