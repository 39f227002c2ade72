use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{TypeError, TypeResult};

/// Length of a canonical document identifier.
pub const ID_LEN: usize = 24;

/// Canonical identifier of a stored document.
///
/// Always exactly 24 ASCII alphanumeric characters. Drivers may keep a
/// different native representation (see [`ObjectId`]); application code only
/// ever sees this string form.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocId(String);

impl DocId {
    /// Parse a canonical identifier, rejecting any other shape.
    pub fn parse(s: &str) -> TypeResult<Self> {
        if is_canonical(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(TypeError::InvalidIdentifier(s.to_string()))
        }
    }

    /// Generate a fresh identifier from the current time, random bytes and a
    /// process-wide counter.
    pub fn generate() -> Self {
        ObjectId::generate().to_doc_id()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The driver-native form, if this identifier is hex-encoded.
    pub fn to_object_id(&self) -> Option<ObjectId> {
        ObjectId::from_hex(&self.0).ok()
    }
}

fn is_canonical(s: &str) -> bool {
    s.len() == ID_LEN && s.bytes().all(|b| b.is_ascii_alphanumeric())
}

impl TryFrom<String> for DocId {
    type Error = TypeError;

    fn try_from(s: String) -> TypeResult<Self> {
        if is_canonical(&s) {
            Ok(Self(s))
        } else {
            Err(TypeError::InvalidIdentifier(s))
        }
    }
}

impl From<DocId> for String {
    fn from(id: DocId) -> Self {
        id.0
    }
}

impl AsRef<str> for DocId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocId({})", self.0)
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Driver-native 12-byte identifier, hex-encoded into a [`DocId`].
///
/// Layout: 4 bytes big-endian seconds since the epoch, 5 random bytes, 3
/// bytes of a process-wide counter.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId([u8; 12]);

static COUNTER: OnceLock<AtomicU32> = OnceLock::new();
static PROCESS_RANDOM: OnceLock<[u8; 5]> = OnceLock::new();

impl ObjectId {
    pub fn generate() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        let random = PROCESS_RANDOM.get_or_init(rand::random::<[u8; 5]>);
        let counter = COUNTER
            .get_or_init(|| AtomicU32::new(rand::random::<u32>()))
            .fetch_add(1, Ordering::Relaxed);

        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..9].copy_from_slice(random);
        bytes[9..].copy_from_slice(&counter.to_be_bytes()[1..]);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }

    /// Lowercase hex (24 characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> TypeResult<Self> {
        let bytes = hex::decode(s).map_err(|_| TypeError::InvalidIdentifier(s.to_string()))?;
        let arr: [u8; 12] = bytes
            .try_into()
            .map_err(|_| TypeError::InvalidIdentifier(s.to_string()))?;
        Ok(Self(arr))
    }

    pub fn to_doc_id(&self) -> DocId {
        DocId(self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

/// Anything that is, or exposes, a document identifier.
pub trait ToDocId {
    /// The canonical identifier, or `None` if this value does not carry one.
    fn doc_id(&self) -> Option<DocId>;
}

impl ToDocId for DocId {
    fn doc_id(&self) -> Option<DocId> {
        Some(self.clone())
    }
}

impl ToDocId for ObjectId {
    fn doc_id(&self) -> Option<DocId> {
        Some(self.to_doc_id())
    }
}

impl ToDocId for str {
    fn doc_id(&self) -> Option<DocId> {
        DocId::parse(self).ok()
    }
}

impl ToDocId for String {
    fn doc_id(&self) -> Option<DocId> {
        self.as_str().doc_id()
    }
}

/// JSON strings, and objects carrying a string `_id`.
impl ToDocId for serde_json::Value {
    fn doc_id(&self) -> Option<DocId> {
        match self {
            serde_json::Value::String(s) => s.doc_id(),
            serde_json::Value::Object(map) => map.get("_id").and_then(|v| v.as_str()?.doc_id()),
            _ => None,
        }
    }
}

impl<T: ToDocId> ToDocId for Option<T> {
    fn doc_id(&self) -> Option<DocId> {
        self.as_ref().and_then(ToDocId::doc_id)
    }
}

impl<T: ToDocId + ?Sized> ToDocId for &T {
    fn doc_id(&self) -> Option<DocId> {
        (**self).doc_id()
    }
}

/// Canonicalize any identifier-bearing value.
pub fn to_id<T: ToDocId + ?Sized>(value: &T) -> Option<DocId> {
    value.doc_id()
}

/// Compare two identifier-bearing values by canonical identifier.
///
/// Works regardless of whether either side has been populated yet.
pub fn ids_equal<A: ToDocId + ?Sized, B: ToDocId + ?Sized>(a: &A, b: &B) -> bool {
    a.doc_id() == b.doc_id()
}
