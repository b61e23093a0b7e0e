//! The heap object model (§3). Objects are addressed by the stable
//! [`ObjRef`] handle into a [`crate::heap::Heap`] arena rather than by
//! pointer, per the typed-arena redesign in §9: this removes the
//! intrusive linked allocation list the source uses and sidesteps the
//! aliasing concerns that come with it, while keeping the same
//! "freed only at teardown" lifetime (the arena is simply dropped whole).

use crate::chunk::Chunk;
use crate::value::Value;
use tansy_util::Idx;

/// A stable handle to a heap-allocated [`Object`].
///
/// Two `ObjRef`s compare equal iff they name the same arena slot. For
/// strings this is equivalent to content equality, because every string
/// is interned before any `Value::Obj` can reference it (§3, §8).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjRef(u32);

impl Idx for ObjRef {
    fn from_usize(idx: usize) -> Self {
        assert!(idx <= u32::MAX as usize, "object arena overflow");
        ObjRef(idx as u32)
    }
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Byte-sequence string, immutable once created, with a precomputed
/// FNV-1a hash (§4.4) used both for hash-table probing and for the
/// `tableFindString` intern lookup.
#[derive(Clone, Debug)]
pub struct ObjString {
    bytes: Vec<u8>,
    pub hash: u32,
}

impl ObjString {
    pub(crate) fn new(bytes: Vec<u8>) -> Self {
        let hash = fnv1a_32(&bytes);
        Self { bytes, hash }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> u32 {
        self.bytes.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Lossy UTF-8 view, used only for display; the language does not
    /// require valid Unicode in strings (§1 Non-goals).
    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

/// FNV-1a, 32-bit variant, matching §4.4's hashing requirement exactly.
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    const OFFSET_BASIS: u32 = 2166136261;
    const PRIME: u32 = 16777619;
    let mut hash = OFFSET_BASIS;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// A compiled function: its arity, owned [`Chunk`], and an optional name
/// (absent for the implicit top-level script function, per §3).
#[derive(Clone, Debug)]
pub struct ObjFunction {
    pub arity: u8,
    pub chunk: Chunk,
    pub name: Option<ObjRef>,
}

impl ObjFunction {
    pub fn new(name: Option<ObjRef>) -> Self {
        Self { arity: 0, chunk: Chunk::new(), name }
    }
}

/// The kind of problem a native reported, open per §4.7's taxonomy.
/// Variants cover argument-count and argument-type mismatches; the
/// domain-specific I/O/process/regex kinds named in the taxonomy are not
/// populated because the natives that would raise them are out of scope
/// (§1), but the channel itself is fully wired and exercised by the
/// natives this crate does ship (`tansy-runtime`'s `clock`/`type`/`getenv`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    ArgCount1,
    ArgCount2,
    ArgCount3,
    ArgCount1To2,
    ArgCount2To3,
    ArgCountAtLeast1,
    ArgTypeString,
    ArgTypeNumber,
    ArgTypeArray,
    ArgTypeFileHandle,
    ArgTypeFunction,
}

impl ErrorKind {
    pub fn message(&self) -> &'static str {
        match self {
            ErrorKind::ArgCount1 => "expected 1 argument",
            ErrorKind::ArgCount2 => "expected 2 arguments",
            ErrorKind::ArgCount3 => "expected 3 arguments",
            ErrorKind::ArgCount1To2 => "expected 1 or 2 arguments",
            ErrorKind::ArgCount2To3 => "expected 2 or 3 arguments",
            ErrorKind::ArgCountAtLeast1 => "expected at least 1 argument",
            ErrorKind::ArgTypeString => "argument must be a string",
            ErrorKind::ArgTypeNumber => "argument must be a number",
            ErrorKind::ArgTypeArray => "argument must be an array",
            ErrorKind::ArgTypeFileHandle => "argument must be a file handle",
            ErrorKind::ArgTypeFunction => "argument must be a function",
        }
    }
}

/// What a native reports on failure (§9's redesign of the native error
/// channel): a sum type the VM consumes directly, rather than peeking at
/// a returned `Value` for a hidden `FError` object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NativeFail {
    pub kind: ErrorKind,
    pub errno: Option<i32>,
}

impl NativeFail {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, errno: None }
    }

    pub fn with_errno(kind: ErrorKind, errno: i32) -> Self {
        Self { kind, errno: Some(errno) }
    }
}

pub type NativeResult = Result<Value, NativeFail>;

/// Collaborator interface a native function gets to reach back into the
/// VM, used for the host-initiated callback re-entry path (§4.6,
/// "Callback re-entry"). Implemented by `tansy_runtime::Vm`; kept as a
/// trait here so `tansy-value` never depends on the VM crate.
pub trait NativeContext {
    /// Invokes a user-level function value with `args`, driving the
    /// interpreter loop until that call returns, and yields its result.
    fn call_callback(&mut self, callback: Value, args: &[Value]) -> NativeResult;

    fn heap(&self) -> &crate::heap::Heap;
    fn heap_mut(&mut self) -> &mut crate::heap::Heap;

    /// Interns `bytes` as a String, for natives that construct new string
    /// results (e.g. `type`'s returned type name).
    fn intern_string(&mut self, bytes: Vec<u8>) -> ObjRef;
}

/// Signature of a host-provided function callable from user code via the
/// ordinary `CALL` opcode (§3, §4.7).
pub type NativeFn = fn(ctx: &mut dyn NativeContext, args: &[Value]) -> NativeResult;

/// A native function binding: a host function pointer plus a display name.
#[derive(Clone, Copy)]
pub struct ObjNative {
    pub function: NativeFn,
    pub name: ObjRef,
}

impl std::fmt::Debug for ObjNative {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjNative").field("name", &self.name).finish()
    }
}

/// A user-level hash, owning its own [`crate::table::Table`] (§3). Not
/// populated by any native in this build (the array/hash native surface
/// is out of scope, §1) but modeled so the `Object` variant set matches
/// the spec exactly.
#[derive(Clone, Debug, Default)]
pub struct ObjUserHash {
    pub table: crate::table::Table,
}

/// A user-level array, owning a dynamic sequence of [`Value`] (§3).
#[derive(Clone, Debug, Default)]
pub struct ObjUserArray {
    pub items: Vec<Value>,
}

/// An opaque host file handle plus metadata (§3). No native opens one in
/// this build; retained only so `Object`'s variant set is complete.
#[derive(Clone, Copy, Debug)]
pub struct ObjFileHandle {
    pub readable: bool,
    pub writable: bool,
    pub open: bool,
    pub locked: bool,
}

/// A native-reported error kind plus captured OS errno (§3). Per §4.6,
/// this is never a value the user program can observe directly -- the
/// VM intercepts `NativeFail` before a `Value::Obj` of this variant could
/// ever be constructed. Kept so `Object`'s variant set matches §3.
#[derive(Clone, Copy, Debug)]
pub struct ObjFError {
    pub kind: ErrorKind,
    pub errno: Option<i32>,
}

/// The sum of heap-allocated object kinds (§3).
#[derive(Debug)]
pub enum Object {
    String(ObjString),
    Function(ObjFunction),
    Native(ObjNative),
    UserHash(ObjUserHash),
    UserArray(ObjUserArray),
    FileHandle(ObjFileHandle),
    FError(ObjFError),
}

impl Object {
    pub fn as_string(&self) -> Option<&ObjString> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&ObjFunction> {
        match self {
            Object::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_function_mut(&mut self) -> Option<&mut ObjFunction> {
        match self {
            Object::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_native(&self) -> Option<&ObjNative> {
        match self {
            Object::Native(n) => Some(n),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Object::String(_) => "string",
            Object::Function(_) => "function",
            Object::Native(_) => "native",
            Object::UserHash(_) => "hash",
            Object::UserArray(_) => "array",
            Object::FileHandle(_) => "filehandle",
            Object::FError(_) => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1a_is_deterministic_and_sensitive() {
        assert_eq!(fnv1a_32(b"hi"), fnv1a_32(b"hi"));
        assert_ne!(fnv1a_32(b"hi"), fnv1a_32(b"ho"));
    }

    #[test]
    fn empty_string_hashes_to_offset_basis() {
        assert_eq!(fnv1a_32(b""), 2166136261);
    }

    #[test]
    fn obj_string_tracks_length_and_hash() {
        let s = ObjString::new(b"hello".to_vec());
        assert_eq!(s.len(), 5);
        assert_eq!(s.hash, fnv1a_32(b"hello"));
    }
}
