//! The stack-based bytecode interpreter (§4.6): a fixed-capacity operand
//! stack, a fixed-capacity call-frame stack, opcode dispatch, and the
//! globals/intern tables the compiler's `GET_GLOBAL`/`DEFINE_GLOBAL`/
//! `SET_GLOBAL` opcodes address.

use tansy_util::Handler;
use tansy_value::{
    ErrorKind, Heap, NativeContext, NativeFail, NativeResult, ObjRef, OpCode, Table, Value,
};

use crate::error::RuntimeError;
use crate::natives;

/// Call-frame capacity (§4.6). Also bounds callback re-entry depth.
pub const FRAMES_MAX: usize = 64;
/// Operand stack capacity: one 256-slot window per frame (§4.6).
pub const STACK_MAX: usize = FRAMES_MAX * 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterpretResult {
    Ok,
    CompileError,
    RuntimeError,
}

struct CallFrame {
    function: ObjRef,
    ip: usize,
    slots_base: usize,
}

/// The virtual machine: operand stack, call frames, globals, string intern
/// pool, and the object heap those all reference into (§4.6).
pub struct Vm {
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
    globals: Table,
    strings: Table,
    heap: Heap,
    /// Set when a callback invoked via [`NativeContext::call_callback`]
    /// faults; the `CALL` handler for that native checks this rather than
    /// formatting a generic "native reported error" message, so a runtime
    /// error raised deep inside a callback still produces the ordinary
    /// `RuntimeError` trace instead of being flattened into a native-error
    /// string (§4.6 "Callback re-entry"). No native this build ships
    /// actually invokes a callback, but the channel is fully wired.
    pending_fault: Option<RuntimeError>,
}

impl Vm {
    pub fn new() -> Self {
        let mut vm = Self {
            stack: Vec::with_capacity(STACK_MAX),
            frames: Vec::with_capacity(FRAMES_MAX),
            globals: Table::new(),
            strings: Table::new(),
            heap: Heap::new(),
            pending_fault: None,
        };
        natives::register_all(&mut vm);
        vm
    }

    pub(crate) fn register_native(&mut self, name: &str, function: tansy_value::NativeFn) {
        let name_ref = self.heap.intern_string(&mut self.strings, name.as_bytes().to_vec());
        let native_ref = self.heap.new_native(function, name_ref);
        self.globals.set(&self.heap, name_ref, Value::Obj(native_ref));
    }

    /// Compiles and runs `source` as the implicit top-level script (§6).
    pub fn interpret(&mut self, source: &str, start_line: u32) -> InterpretResult {
        let mut handler = Handler::new();
        let function_ref =
            match tansy_compile::compile(source, start_line, &mut handler, &mut self.heap, &mut self.strings) {
                Ok(f) => f,
                Err(error) => {
                    for diagnostic in error.diagnostics {
                        eprintln!("{diagnostic}");
                    }
                    return InterpretResult::CompileError;
                }
            };

        self.stack.push(Value::Obj(function_ref));
        self.frames.push(CallFrame { function: function_ref, ip: 0, slots_base: 0 });

        match self.run(0) {
            Ok(()) => InterpretResult::Ok,
            Err(fault) => {
                self.report_fault(&fault);
                InterpretResult::RuntimeError
            }
        }
    }

    fn report_fault(&mut self, fault: &RuntimeError) {
        eprintln!("{fault}");
        for frame in self.frames.iter().rev() {
            let function = self.heap.get(frame.function).as_function().expect("frame always names a function");
            let name = match function.name {
                Some(n) => self.heap.get_string(n).as_str_lossy().into_owned(),
                None => "script".to_string(),
            };
            let line = function.chunk.line_at(frame.ip.saturating_sub(1));
            eprintln!("[line {line}] in {name}");
        }
        self.stack.clear();
        self.frames.clear();
    }

    fn fault(&self, message: impl Into<String>) -> RuntimeError {
        RuntimeError::new(message)
    }

    // ---- stack/frame plumbing ----------------------------------------------

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().expect("pop on empty stack is a compiler bug")
    }

    fn peek(&self, distance: usize) -> Value {
        self.stack[self.stack.len() - 1 - distance]
    }

    fn read_byte(&mut self) -> u8 {
        let frame = self.frames.last_mut().expect("run never called with an empty frame stack");
        let byte = self.heap.get(frame.function).as_function().expect("frame names a function").chunk.code()[frame.ip];
        frame.ip += 1;
        byte
    }

    fn read_u16(&mut self) -> u16 {
        let hi = self.read_byte() as u16;
        let lo = self.read_byte() as u16;
        (hi << 8) | lo
    }

    fn read_constant(&mut self) -> Value {
        let idx = self.read_byte() as usize;
        let frame = self.frames.last().expect("run never called with an empty frame stack");
        self.heap.get(frame.function).as_function().expect("frame names a function").chunk.constants()[idx]
    }

    // ---- the interpreter loop (§4.6) ----------------------------------------

    /// Drives opcode dispatch until the call-frame stack shrinks back down
    /// to `frame_floor`. Called with `frame_floor = 0` for the top-level
    /// script and with `frame_floor = <depth before the push>` for a
    /// host-initiated callback (§4.6 "Callback re-entry", §5).
    fn run(&mut self, frame_floor: usize) -> Result<(), RuntimeError> {
        loop {
            let byte = self.read_byte();
            let op = OpCode::try_from(byte).map_err(|b| self.fault(format!("Unknown opcode {b}.")))?;

            match op {
                OpCode::Constant => {
                    let value = self.read_constant();
                    self.push(value);
                }
                OpCode::Nil => self.push(Value::Nil),
                OpCode::True => self.push(Value::Bool(true)),
                OpCode::False => self.push(Value::Bool(false)),
                OpCode::Pop => {
                    self.pop();
                }
                OpCode::GetLocal => {
                    let slot = self.read_byte() as usize;
                    let base = self.frames.last().unwrap().slots_base;
                    self.push(self.stack[base + slot]);
                }
                OpCode::SetLocal => {
                    let slot = self.read_byte() as usize;
                    let base = self.frames.last().unwrap().slots_base;
                    self.stack[base + slot] = self.peek(0);
                }
                OpCode::GetGlobal => {
                    let name = self.read_constant().as_obj().expect("constant is a string ref");
                    match self.globals.get(&self.heap, name) {
                        Some(value) => self.push(value),
                        None => {
                            let text = self.heap.get_string(name).as_str_lossy().into_owned();
                            return Err(self.fault(format!("Undefined variable '{text}'.")));
                        }
                    }
                }
                OpCode::DefineGlobal => {
                    let name = self.read_constant().as_obj().expect("constant is a string ref");
                    let value = self.peek(0);
                    self.globals.set(&self.heap, name, value);
                    self.pop();
                }
                OpCode::SetGlobal => {
                    let name = self.read_constant().as_obj().expect("constant is a string ref");
                    let is_new = self.globals.set(&self.heap, name, self.peek(0));
                    if is_new {
                        self.globals.delete(&self.heap, name);
                        let text = self.heap.get_string(name).as_str_lossy().into_owned();
                        return Err(self.fault(format!("Undefined variable '{text}'.")));
                    }
                }
                OpCode::Equal => {
                    let b = self.pop();
                    let a = self.pop();
                    self.push(Value::Bool(a == b));
                }
                OpCode::Greater => self.numeric_binary(|a, b| Value::Bool(a > b))?,
                OpCode::Less => self.numeric_binary(|a, b| Value::Bool(a < b))?,
                OpCode::Add => self.add()?,
                OpCode::Subtract => self.numeric_binary(|a, b| Value::Number(a - b))?,
                OpCode::Multiply => self.numeric_binary(|a, b| Value::Number(a * b))?,
                OpCode::Divide => self.numeric_binary(|a, b| Value::Number(a / b))?,
                OpCode::Not => {
                    let value = self.pop();
                    self.push(Value::Bool(value.is_falsey()));
                }
                OpCode::Negate => {
                    let value = self.peek(0);
                    match value.as_number() {
                        Some(n) => {
                            self.pop();
                            self.push(Value::Number(-n));
                        }
                        None => return Err(self.fault("Operand must be a number.")),
                    }
                }
                OpCode::Print => {
                    let value = self.pop();
                    println!("{}", self.heap.format_value(value));
                }
                OpCode::Echo => {
                    let n = self.read_byte() as usize;
                    let start = self.stack.len() - n;
                    for value in &self.stack[start..] {
                        print!("{}", self.heap.format_value(*value));
                    }
                    self.stack.truncate(start);
                }
                OpCode::Jump => {
                    let offset = self.read_u16() as usize;
                    self.frames.last_mut().unwrap().ip += offset;
                }
                OpCode::JumpIfFalse => {
                    let offset = self.read_u16() as usize;
                    if self.peek(0).is_falsey() {
                        self.frames.last_mut().unwrap().ip += offset;
                    }
                }
                OpCode::Loop => {
                    let offset = self.read_u16() as usize;
                    self.frames.last_mut().unwrap().ip -= offset;
                }
                OpCode::Call => {
                    let argc = self.read_byte();
                    let callee = self.peek(argc as usize);
                    self.call_value(callee, argc)?;
                }
                OpCode::Return => {
                    let result = self.pop();
                    let frame = self.frames.pop().expect("return always matches a call");
                    self.stack.truncate(frame.slots_base);
                    self.push(result);
                    if self.frames.len() == frame_floor {
                        return Ok(());
                    }
                }
                OpCode::Exit => {
                    let value = self.pop();
                    match value.as_number() {
                        Some(n) if (0.0..=255.0).contains(&n) && n == n.trunc() => {
                            use std::io::Write;
                            let _ = std::io::stdout().flush();
                            std::process::exit(n as i32);
                        }
                        _ => return Err(self.fault("Exit status must be a number between 0 and 255.")),
                    }
                }
                OpCode::Transclude => {
                    self.pop();
                }
            }
        }
    }

    fn numeric_binary(&mut self, op: impl Fn(f64, f64) -> Value) -> Result<(), RuntimeError> {
        let (a, b) = match (self.peek(1).as_number(), self.peek(0).as_number()) {
            (Some(a), Some(b)) => (a, b),
            _ => return Err(self.fault("Operands must be numbers.")),
        };
        self.pop();
        self.pop();
        self.push(op(a, b));
        Ok(())
    }

    fn add(&mut self) -> Result<(), RuntimeError> {
        let b = self.peek(0);
        let a = self.peek(1);
        if let (Some(a), Some(b)) = (a.as_number(), b.as_number()) {
            self.pop();
            self.pop();
            self.push(Value::Number(a + b));
            return Ok(());
        }
        if let (Some(a), Some(b)) = (self.as_string_bytes(a), self.as_string_bytes(b)) {
            let mut bytes = a;
            bytes.extend_from_slice(&b);
            let obj_ref = self.heap.intern_string(&mut self.strings, bytes);
            self.pop();
            self.pop();
            self.push(Value::Obj(obj_ref));
            return Ok(());
        }
        Err(self.fault("Operands must be two numbers or two strings."))
    }

    fn as_string_bytes(&self, value: Value) -> Option<Vec<u8>> {
        let obj_ref = value.as_obj()?;
        self.heap.get(obj_ref).as_string().map(|s| s.as_bytes().to_vec())
    }

    fn call_value(&mut self, callee: Value, argc: u8) -> Result<(), RuntimeError> {
        let Some(obj_ref) = callee.as_obj() else {
            return Err(self.fault("Can only call functions and classes."));
        };
        // Copy out the small, `Copy` parts of whichever variant this is
        // before doing anything that needs `&mut self`, so the immutable
        // borrow of `self.heap` above doesn't outlive this match arm.
        enum Callable {
            Function { arity: u8 },
            Native(tansy_value::ObjNative),
            Uncallable,
        }
        let callable = match self.heap.get(obj_ref) {
            tansy_value::Object::Function(function) => Callable::Function { arity: function.arity },
            tansy_value::Object::Native(native) => Callable::Native(*native),
            _ => Callable::Uncallable,
        };

        match callable {
            Callable::Function { arity } => {
                if arity != argc {
                    return Err(self.fault(format!("Expected {arity} arguments but got {argc}.")));
                }
                if self.frames.len() >= FRAMES_MAX {
                    return Err(self.fault("Stack overflow."));
                }
                let slots_base = self.stack.len() - argc as usize - 1;
                self.frames.push(CallFrame { function: obj_ref, ip: 0, slots_base });
                Ok(())
            }
            Callable::Native(native) => {
                let start = self.stack.len() - argc as usize;
                let args = self.stack[start..].to_vec();
                let result = (native.function)(self, &args);
                self.stack.truncate(start - 1);
                match result {
                    Ok(value) => {
                        self.push(value);
                        Ok(())
                    }
                    Err(fail) => {
                        if let Some(pending) = self.pending_fault.take() {
                            return Err(pending);
                        }
                        let name = self.heap.get_string(native.name).as_str_lossy().into_owned();
                        let mut message = format!("{name}(): {}", fail.kind.message());
                        if let Some(errno) = fail.errno {
                            message.push_str(&format!(": {errno}"));
                        }
                        Err(self.fault(message))
                    }
                }
            }
            Callable::Uncallable => Err(self.fault("Can only call functions and classes.")),
        }
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeContext for Vm {
    fn call_callback(&mut self, callback: Value, args: &[Value]) -> NativeResult {
        let frame_floor = self.frames.len();
        self.push(callback);
        for &arg in args {
            self.push(arg);
        }
        if let Err(fault) = self.call_value(callback, args.len() as u8) {
            self.pending_fault = Some(fault);
            return Err(NativeFail::new(ErrorKind::ArgCountAtLeast1));
        }
        match self.run(frame_floor) {
            Ok(()) => Ok(self.pop()),
            Err(fault) => {
                self.pending_fault = Some(fault);
                Err(NativeFail::new(ErrorKind::ArgCountAtLeast1))
            }
        }
    }

    fn heap(&self) -> &Heap {
        &self.heap
    }

    fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    fn intern_string(&mut self, bytes: Vec<u8>) -> ObjRef {
        self.heap.intern_string(&mut self.strings, bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Asserting on produced stdout text (rather than just `InterpretResult`)
    // needs a real subprocess, since `print`/`echo` write straight to the
    // process-wide stdout handle; that coverage lives in tansy-driver's
    // integration tests via `assert_cmd`. These unit tests exercise the
    // interpreter loop itself and its success/failure discrimination.
    fn run(source: &str) -> InterpretResult {
        Vm::new().interpret(source, 1)
    }

    #[test]
    fn arithmetic_expression_runs_ok() {
        assert_eq!(run("print 1 + 2 * 3;"), InterpretResult::Ok);
    }

    #[test]
    fn string_concatenation_runs_ok() {
        assert_eq!(run(r#"var a = "hi"; var b = " there"; print a + b;"#), InterpretResult::Ok);
    }

    #[test]
    fn for_loop_accumulator_runs_ok() {
        assert_eq!(
            run("var n = 0; for (var i = 1; i <= 5; i = i + 1) { n = n + i; } print n;"),
            InterpretResult::Ok
        );
    }

    #[test]
    fn recursive_function_runs_ok() {
        assert_eq!(
            run("fun fib(n) { if (n < 2) return n; return fib(n-1) + fib(n-2); } print fib(10);"),
            InterpretResult::Ok
        );
    }

    #[test]
    fn block_scoping_runs_ok() {
        assert_eq!(run("var x = 1; { var x = 2; print x; } print x;"), InterpretResult::Ok);
    }

    #[test]
    fn falsey_branching_runs_ok() {
        assert_eq!(
            run(r#"if (nil) print "a"; else print "b"; if (0) print "c"; else print "d";"#),
            InterpretResult::Ok
        );
    }

    #[test]
    fn type_mismatch_is_a_runtime_error() {
        assert_eq!(run(r#"print 1 + "a";"#), InterpretResult::RuntimeError);
    }

    #[test]
    fn undefined_global_is_a_runtime_error() {
        assert_eq!(run("print undefined_name;"), InterpretResult::RuntimeError);
    }

    #[test]
    fn compile_error_is_reported_distinctly() {
        assert_eq!(run("var = 1;"), InterpretResult::CompileError);
    }

    #[test]
    fn intern_identity_makes_equal_strings_equal() {
        assert_eq!(run(r#"print "a" == "a";"#), InterpretResult::Ok);
    }

    #[test]
    fn too_many_call_arguments_is_a_compile_error() {
        let mut args = String::new();
        for i in 0..256 {
            if i > 0 {
                args.push(',');
            }
            args.push_str(&i.to_string());
        }
        let source = format!("fun f() {{}} f({args});");
        assert_eq!(run(&source), InterpretResult::CompileError);
    }

    #[test]
    fn too_many_function_parameters_is_a_compile_error_not_a_panic() {
        let mut params = String::new();
        for i in 0..256 {
            if i > 0 {
                params.push(',');
            }
            params.push_str(&format!("p{i}"));
        }
        let source = format!("fun f({params}) {{}}");
        assert_eq!(run(&source), InterpretResult::CompileError);
    }
}
