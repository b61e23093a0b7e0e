//! The object arena (§3, §9's typed-arena redesign). All heap allocations
//! live in one `IndexVec` keyed by [`ObjRef`]; nothing is ever freed before
//! the whole arena is dropped, matching the source's "free everything at
//! teardown" lifetime without the intrusive linked list it uses to get there.

use crate::object::{
    fnv1a_32, ErrorKind, NativeFn, Object, ObjFileHandle, ObjFError, ObjFunction, ObjNative,
    ObjRef, ObjString, ObjUserArray, ObjUserHash,
};
use crate::table::Table;
use crate::value::Value;
use tansy_util::IndexVec;

#[derive(Debug, Default)]
pub struct Heap {
    objects: IndexVec<ObjRef, Object>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, r: ObjRef) -> &Object {
        self.objects.get(r).expect("dangling ObjRef")
    }

    pub fn get_mut(&mut self, r: ObjRef) -> &mut Object {
        self.objects.get_mut(r).expect("dangling ObjRef")
    }

    pub fn get_string(&self, r: ObjRef) -> &ObjString {
        self.get(r).as_string().expect("ObjRef did not name a string")
    }

    pub fn string_hash(&self, r: ObjRef) -> u32 {
        self.get_string(r).hash
    }

    pub fn string_bytes(&self, r: ObjRef) -> &[u8] {
        self.get_string(r).as_bytes()
    }

    fn alloc(&mut self, obj: Object) -> ObjRef {
        self.objects.push(obj)
    }

    /// Interns `bytes`: returns the existing `ObjRef` if `strings` already
    /// holds an identical string, otherwise allocates a new `ObjString` and
    /// registers it. This is `copyString`/`newString` collapsed into one
    /// entry point, since both always go through the intern pool (§4.4).
    pub fn intern_string(&mut self, strings: &mut Table, bytes: Vec<u8>) -> ObjRef {
        let hash = fnv1a_32(&bytes);
        if let Some(existing) = strings.find_string(self, &bytes, hash) {
            return existing;
        }
        let obj_ref = self.alloc(Object::String(ObjString::new(bytes)));
        strings.set(self, obj_ref, Value::Bool(true));
        obj_ref
    }

    pub fn new_function(&mut self, name: Option<ObjRef>) -> ObjRef {
        self.alloc(Object::Function(ObjFunction::new(name)))
    }

    pub fn new_native(&mut self, function: NativeFn, name: ObjRef) -> ObjRef {
        self.alloc(Object::Native(ObjNative { function, name }))
    }

    pub fn new_user_hash(&mut self) -> ObjRef {
        self.alloc(Object::UserHash(ObjUserHash::default()))
    }

    pub fn new_user_array(&mut self) -> ObjRef {
        self.alloc(Object::UserArray(ObjUserArray::default()))
    }

    pub fn new_file_handle(&mut self, readable: bool, writable: bool) -> ObjRef {
        self.alloc(Object::FileHandle(ObjFileHandle { readable, writable, open: true, locked: false }))
    }

    pub fn new_function_error(&mut self, kind: ErrorKind, errno: Option<i32>) -> ObjRef {
        self.alloc(Object::FError(ObjFError { kind, errno }))
    }

    /// Renders a value for `print`/`echo` (§4.4's `printValue`): numbers and
    /// primitives format via [`Value`]'s own `Display`, objects need the
    /// heap to look up their contents.
    pub fn format_value(&self, value: Value) -> String {
        match value {
            Value::Obj(r) => match self.get(r) {
                Object::String(s) => s.as_str_lossy().into_owned(),
                Object::Function(f) => match f.name {
                    Some(n) => format!("<fn {}>", self.get_string(n).as_str_lossy()),
                    None => "<script>".to_string(),
                },
                Object::Native(n) => format!("<native {}>", self.get_string(n.name).as_str_lossy()),
                Object::UserHash(h) => format!("<hash {} entries>", h.table.live_count()),
                Object::UserArray(a) => format!("<array {} items>", a.items.len()),
                Object::FileHandle(_) => "<filehandle>".to_string(),
                Object::FError(e) => format!("<error {}>", e.kind.message()),
            },
            other => other.to_string(),
        }
    }

    pub fn type_name(&self, value: Value) -> &'static str {
        match value {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Obj(r) => self.get(r).type_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_the_same_bytes_returns_the_same_ref() {
        let mut heap = Heap::new();
        let mut strings = Table::new();
        let a = heap.intern_string(&mut strings, b"hello".to_vec());
        let b = heap.intern_string(&mut strings, b"hello".to_vec());
        assert_eq!(a, b);
    }

    #[test]
    fn interning_different_bytes_returns_different_refs() {
        let mut heap = Heap::new();
        let mut strings = Table::new();
        let a = heap.intern_string(&mut strings, b"hello".to_vec());
        let b = heap.intern_string(&mut strings, b"world".to_vec());
        assert_ne!(a, b);
    }

    #[test]
    fn format_value_renders_strings_without_quotes() {
        let mut heap = Heap::new();
        let mut strings = Table::new();
        let s = heap.intern_string(&mut strings, b"hi".to_vec());
        assert_eq!(heap.format_value(Value::Obj(s)), "hi");
    }

    #[test]
    fn format_value_renders_anonymous_script_function() {
        let mut heap = Heap::new();
        let f = heap.new_function(None);
        assert_eq!(heap.format_value(Value::Obj(f)), "<script>");
    }

    #[test]
    fn type_name_covers_primitives_and_objects() {
        let mut heap = Heap::new();
        assert_eq!(heap.type_name(Value::Nil), "nil");
        assert_eq!(heap.type_name(Value::Number(1.0)), "number");
        let arr = heap.new_user_array();
        assert_eq!(heap.type_name(Value::Obj(arr)), "array");
    }
}
