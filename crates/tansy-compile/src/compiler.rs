//! The single-pass Pratt-precedence compiler (§4.2): scanner output goes
//! straight to bytecode, with no intermediate AST.

use tansy_lex::{Scanner, Token, TokenKind};
use tansy_util::Handler;
use tansy_value::{Chunk, Heap, ObjRef, OpCode, Table, Value};

use crate::local::{CompilerState, FunctionType, Local, MAX_LOCALS, UNINITIALIZED};
use crate::precedence::Precedence;
use crate::rules::{rule_for, Infix, Prefix};

/// Function parameters (and therefore call arguments) may not exceed this
/// count (§4.2).
const MAX_PARAMS: usize = 256;

pub struct Compiler<'src, 'ctx> {
    scanner: Scanner<'src>,
    previous: Token<'src>,
    current: Token<'src>,
    had_error: bool,
    panic_mode: bool,
    handler: &'ctx mut Handler,
    heap: &'ctx mut Heap,
    strings: &'ctx mut Table,
    states: Vec<CompilerState>,
}

impl<'src, 'ctx> Compiler<'src, 'ctx> {
    pub fn new(
        source: &'src str,
        start_line: u32,
        handler: &'ctx mut Handler,
        heap: &'ctx mut Heap,
        strings: &'ctx mut Table,
    ) -> Self {
        let dummy = Token::new(TokenKind::Eof, "", start_line);
        Self {
            scanner: Scanner::new(source, start_line),
            previous: dummy,
            current: dummy,
            had_error: false,
            panic_mode: false,
            handler,
            heap,
            strings,
            states: vec![CompilerState::new(FunctionType::Script, None)],
        }
    }

    /// Compiles the whole buffer as the implicit top-level script function.
    /// Returns `None` if any compile error occurred (§4.2's "no function"
    /// outcome).
    pub fn compile(mut self) -> Option<ObjRef> {
        self.advance();
        while !self.check(TokenKind::Eof) {
            self.declaration();
        }
        self.consume(TokenKind::Eof, "Expect end of expression.");
        let function_ref = self.end_compiler();
        if self.had_error {
            None
        } else {
            Some(function_ref)
        }
    }

    // ---- token stream plumbing -------------------------------------------------

    fn advance(&mut self) {
        self.previous = self.current;
        loop {
            self.current = self.scanner.scan_token();
            if self.current.kind != TokenKind::Error {
                break;
            }
            self.error_at_current(self.current.lexeme);
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if !self.check(kind) {
            return false;
        }
        self.advance();
        true
    }

    fn consume(&mut self, kind: TokenKind, message: &str) {
        if self.current.kind == kind {
            self.advance();
            return;
        }
        self.error_at_current(message);
    }

    // ---- error reporting ---------------------------------------------------

    fn error_at_current(&mut self, message: &str) {
        self.error_at(self.current.line, message);
    }

    fn error(&mut self, message: &str) {
        self.error_at(self.previous.line, message);
    }

    fn error_at(&mut self, line: u32, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.had_error = true;
        self.handler.error(message.to_string(), line);
    }

    /// Consumes tokens until a likely statement boundary, per §4.2's panic
    /// recovery: a just-consumed semicolon or a statement-start keyword.
    fn synchronize(&mut self) {
        self.panic_mode = false;
        while self.current.kind != TokenKind::Eof {
            if self.previous.kind == TokenKind::Semicolon {
                return;
            }
            match self.current.kind {
                TokenKind::Class
                | TokenKind::Fun
                | TokenKind::Var
                | TokenKind::Unvar
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Print
                | TokenKind::Return => return,
                _ => {}
            }
            self.advance();
        }
    }

    // ---- chunk / bytecode emission -----------------------------------------

    fn state(&self) -> &CompilerState {
        self.states.last().expect("compiler stack is never empty")
    }

    fn state_mut(&mut self) -> &mut CompilerState {
        self.states.last_mut().expect("compiler stack is never empty")
    }

    fn chunk_mut(&mut self) -> &mut Chunk {
        &mut self.state_mut().chunk
    }

    fn emit_byte(&mut self, byte: u8) {
        let line = self.previous.line;
        self.chunk_mut().write(byte, line);
    }

    fn emit_op(&mut self, op: OpCode) {
        self.emit_byte(op.as_u8());
    }

    fn emit_ops(&mut self, a: OpCode, b: OpCode) {
        self.emit_op(a);
        self.emit_op(b);
    }

    fn emit_op_u8(&mut self, op: OpCode, operand: u8) {
        self.emit_op(op);
        self.emit_byte(operand);
    }

    /// Emits a two-byte placeholder jump operand and returns its offset for
    /// later patching.
    fn emit_jump(&mut self, op: OpCode) -> usize {
        self.emit_op(op);
        self.emit_byte(0xff);
        self.emit_byte(0xff);
        self.chunk_mut().len() - 2
    }

    fn patch_jump(&mut self, offset: usize) {
        let jump = self.chunk_mut().len() - offset - 2;
        if jump > u16::MAX as usize {
            self.error("Too much code to jump over.");
            return;
        }
        let bytes = (jump as u16).to_be_bytes();
        self.patch_byte(offset, bytes[0]);
        self.patch_byte(offset + 1, bytes[1]);
    }

    fn patch_byte(&mut self, offset: usize, byte: u8) {
        // `Chunk` only exposes append-style writes; patching a jump operand
        // needs direct slot access, so reach into the raw code buffer via a
        // small helper rather than widen `Chunk`'s public surface for one
        // caller.
        self.state_mut().chunk.patch(offset, byte);
    }

    fn emit_loop(&mut self, loop_start: usize) {
        self.emit_op(OpCode::Loop);
        let offset = self.chunk_mut().len() - loop_start + 2;
        if offset > u16::MAX as usize {
            self.error("Loop body too large.");
            return;
        }
        let bytes = (offset as u16).to_be_bytes();
        self.emit_byte(bytes[0]);
        self.emit_byte(bytes[1]);
    }

    fn make_constant(&mut self, value: Value) -> u8 {
        match self.chunk_mut().add_constant(value) {
            Some(idx) => idx,
            None => {
                self.error("Too many constants in one chunk.");
                0
            }
        }
    }

    fn emit_constant(&mut self, value: Value) {
        let idx = self.make_constant(value);
        self.emit_op_u8(OpCode::Constant, idx);
    }

    fn identifier_constant(&mut self, name: &str) -> u8 {
        let obj_ref = self.heap.intern_string(self.strings, name.as_bytes().to_vec());
        self.make_constant(Value::Obj(obj_ref))
    }

    /// Pops the active `CompilerState`, installs its chunk into a freshly
    /// allocated `ObjFunction` in the heap, and returns a handle to it.
    fn end_compiler(&mut self) -> ObjRef {
        let line = self.previous.line;
        self.chunk_mut().write_op(OpCode::Nil, line);
        self.chunk_mut().write_op(OpCode::Return, line);

        let state = self.states.pop().expect("end_compiler without a matching state");
        let name_ref = state.function_name.as_deref().map(|n| {
            self.heap.intern_string(self.strings, n.as_bytes().to_vec())
        });
        let function_ref = self.heap.new_function(name_ref);
        let function = self.heap.get_mut(function_ref).as_function_mut().expect("just allocated");
        function.arity = state.arity;
        function.chunk = state.chunk;
        function_ref
    }

    // ---- scopes and locals --------------------------------------------------

    fn begin_scope(&mut self) {
        self.state_mut().scope_depth += 1;
    }

    fn end_scope(&mut self) {
        self.state_mut().scope_depth -= 1;
        let depth = self.state().scope_depth;
        while let Some(local) = self.state().locals.last() {
            if local.depth > depth {
                self.emit_op(OpCode::Pop);
                self.state_mut().locals.pop();
            } else {
                break;
            }
        }
    }

    fn declare_variable(&mut self) {
        if self.state().scope_depth == 0 {
            return;
        }
        let name = self.previous.lexeme.to_string();
        let depth = self.state().scope_depth;
        for local in self.state().locals.iter().rev() {
            if local.depth != UNINITIALIZED && local.depth < depth {
                break;
            }
            if local.name == name {
                self.error("Already a variable with this name in this scope.");
                return;
            }
        }
        self.add_local(name);
    }

    fn add_local(&mut self, name: String) {
        if self.state().locals.len() >= MAX_LOCALS {
            self.error("Too many local variables in function.");
            return;
        }
        self.state_mut().locals.push(Local { name, depth: UNINITIALIZED });
    }

    fn mark_initialized(&mut self) {
        if self.state().scope_depth == 0 {
            return;
        }
        let depth = self.state().scope_depth;
        if let Some(local) = self.state_mut().locals.last_mut() {
            local.depth = depth;
        }
    }

    fn resolve_local(&mut self, name: &str) -> Option<u8> {
        for (i, local) in self.state().locals.iter().enumerate().rev() {
            if local.name == name {
                if local.depth == UNINITIALIZED {
                    self.error("Cannot read local variable in its own initializer.");
                }
                return Some(i as u8);
            }
        }
        None
    }

    fn parse_variable(&mut self, error_message: &str) -> u8 {
        self.consume(TokenKind::Identifier, error_message);
        self.declare_variable();
        if self.state().scope_depth > 0 {
            return 0;
        }
        self.identifier_constant(self.previous.lexeme)
    }

    fn define_variable(&mut self, global: u8) {
        if self.state().scope_depth > 0 {
            self.mark_initialized();
            return;
        }
        self.emit_op_u8(OpCode::DefineGlobal, global);
    }

    // ---- declarations ---------------------------------------------------------

    fn declaration(&mut self) {
        if self.matches(TokenKind::Fun) {
            self.fun_declaration();
        } else if self.matches(TokenKind::Var) || self.matches(TokenKind::Unvar) {
            self.var_declaration();
        } else {
            self.statement();
        }
        if self.panic_mode {
            self.synchronize();
        }
    }

    fn fun_declaration(&mut self) {
        let global = self.parse_variable("Expect function name.");
        self.mark_initialized();
        self.function(FunctionType::Function);
        self.define_variable(global);
    }

    fn function(&mut self, function_type: FunctionType) {
        let name = self.previous.lexeme.to_string();
        self.states.push(CompilerState::new(function_type, Some(name)));
        self.begin_scope();

        self.consume(TokenKind::LeftParen, "Expect '(' after function name.");
        if !self.check(TokenKind::RightParen) {
            loop {
                if self.state().arity as usize >= MAX_PARAMS - 1 {
                    self.error_at_current("Cannot have more than 255 parameters.");
                }
                self.state_mut().arity = self.state_mut().arity.saturating_add(1);
                let constant = self.parse_variable("Expect parameter name.");
                self.define_variable(constant);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after parameters.");
        self.consume(TokenKind::LeftBrace, "Expect '{' before function body.");
        self.block();

        let function_ref = self.end_compiler();
        self.emit_constant(Value::Obj(function_ref));
    }

    fn var_declaration(&mut self) {
        let global = self.parse_variable("Expect variable name.");
        if self.matches(TokenKind::Equal) {
            self.expression();
        } else {
            self.emit_op(OpCode::Nil);
        }
        self.consume(TokenKind::Semicolon, "Expect ';' after variable declaration.");
        self.define_variable(global);
    }

    // ---- statements -------------------------------------------------------------

    fn statement(&mut self) {
        if self.matches(TokenKind::Print) {
            self.print_statement();
        } else if self.matches(TokenKind::Echo) {
            self.echo_statement();
        } else if self.matches(TokenKind::Exit) {
            self.exit_statement();
        } else if self.matches(TokenKind::If) {
            self.if_statement();
        } else if self.matches(TokenKind::Return) {
            self.return_statement();
        } else if self.matches(TokenKind::While) {
            self.while_statement();
        } else if self.matches(TokenKind::For) {
            self.for_statement();
        } else if self.matches(TokenKind::Transclude) {
            self.transclude_statement();
        } else if self.matches(TokenKind::LeftBrace) {
            self.begin_scope();
            self.block();
            self.end_scope();
        } else {
            self.expression_statement();
        }
    }

    fn print_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after value.");
        self.emit_op(OpCode::Print);
    }

    fn echo_statement(&mut self) {
        let mut count: usize = 0;
        loop {
            self.expression();
            count += 1;
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.consume(TokenKind::Semicolon, "Expect ';' after echo arguments.");
        if count > u8::MAX as usize {
            self.error("Too many arguments to echo.");
            count = 0;
        }
        self.emit_op_u8(OpCode::Echo, count as u8);
    }

    fn exit_statement(&mut self) {
        if self.check(TokenKind::Semicolon) {
            self.emit_op(OpCode::Nil);
        } else {
            self.expression();
        }
        self.consume(TokenKind::Semicolon, "Expect ';' after exit statement.");
        self.emit_op(OpCode::Exit);
    }

    fn return_statement(&mut self) {
        if self.state().function_type == FunctionType::Script {
            self.error("Cannot return from top-level code.");
        }
        if self.matches(TokenKind::Semicolon) {
            self.emit_op(OpCode::Nil);
            self.emit_op(OpCode::Return);
        } else {
            self.expression();
            self.consume(TokenKind::Semicolon, "Expect ';' after return value.");
            self.emit_op(OpCode::Return);
        }
    }

    fn if_statement(&mut self) {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'if'.");
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after condition.");

        let then_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.statement();

        let else_jump = self.emit_jump(OpCode::Jump);
        self.patch_jump(then_jump);
        self.emit_op(OpCode::Pop);

        if self.matches(TokenKind::Else) {
            self.statement();
        }
        self.patch_jump(else_jump);
    }

    fn while_statement(&mut self) {
        let loop_start = self.chunk_mut().len();
        self.consume(TokenKind::LeftParen, "Expect '(' after 'while'.");
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after condition.");

        let exit_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.statement();
        self.emit_loop(loop_start);

        self.patch_jump(exit_jump);
        self.emit_op(OpCode::Pop);
    }

    fn for_statement(&mut self) {
        self.begin_scope();
        self.consume(TokenKind::LeftParen, "Expect '(' after 'for'.");

        if self.matches(TokenKind::Semicolon) {
            // no initializer
        } else if self.matches(TokenKind::Var) || self.matches(TokenKind::Unvar) {
            self.var_declaration();
        } else {
            self.expression_statement();
        }

        let mut loop_start = self.chunk_mut().len();
        let mut exit_jump: Option<usize> = None;
        if !self.matches(TokenKind::Semicolon) {
            self.expression();
            self.consume(TokenKind::Semicolon, "Expect ';' after loop condition.");
            exit_jump = Some(self.emit_jump(OpCode::JumpIfFalse));
            self.emit_op(OpCode::Pop);
        }

        if !self.matches(TokenKind::RightParen) {
            let body_jump = self.emit_jump(OpCode::Jump);
            let increment_start = self.chunk_mut().len();
            self.expression();
            self.emit_op(OpCode::Pop);
            self.consume(TokenKind::RightParen, "Expect ')' after for clauses.");

            self.emit_loop(loop_start);
            loop_start = increment_start;
            self.patch_jump(body_jump);
        }

        self.statement();
        self.emit_loop(loop_start);

        if let Some(exit_jump) = exit_jump {
            self.patch_jump(exit_jump);
            self.emit_op(OpCode::Pop);
        }

        self.end_scope();
    }

    /// Parses `transclude "path";` and emits `CONSTANT <path>; TRANSCLUDE`.
    /// Per spec.md's own "explicitly out of scope" framing for this
    /// directive, this is the full extent of what's implemented: the path
    /// string is not read from disk or spliced into the token stream, and
    /// `TRANSCLUDE` is a runtime no-op that just discards the constant.
    fn transclude_statement(&mut self) {
        self.consume(TokenKind::String, "Expect file path string after 'transclude'.");
        let path_bytes = unescape_string(self.previous.lexeme);
        let obj_ref = self.heap.intern_string(self.strings, path_bytes);
        self.consume(TokenKind::Semicolon, "Expect ';' after transclude path.");
        self.emit_constant(Value::Obj(obj_ref));
        self.emit_op(OpCode::Transclude);
    }

    fn block(&mut self) {
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            self.declaration();
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after block.");
    }

    fn expression_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after expression.");
        self.emit_op(OpCode::Pop);
    }

    // ---- expressions (Pratt core) -----------------------------------------------

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();
        let prefix = rule_for(self.previous.kind).prefix;
        if prefix == Prefix::None {
            self.error("Expect expression.");
            return;
        }
        let can_assign = precedence <= Precedence::Assignment;
        self.run_prefix(prefix, can_assign);

        while precedence <= rule_for(self.current.kind).precedence {
            self.advance();
            let infix = rule_for(self.previous.kind).infix;
            self.run_infix(infix, can_assign);
        }

        if can_assign && self.matches(TokenKind::Equal) {
            self.error("Invalid assignment target.");
        }
    }

    fn run_prefix(&mut self, prefix: Prefix, can_assign: bool) {
        match prefix {
            Prefix::None => unreachable!("checked by caller"),
            Prefix::Grouping => self.grouping(),
            Prefix::Unary => self.unary(),
            Prefix::Number => self.number(),
            Prefix::StringLit => self.string_literal(),
            Prefix::Literal => self.literal(),
            Prefix::Variable => self.variable(can_assign),
        }
    }

    fn run_infix(&mut self, infix: Infix, can_assign: bool) {
        match infix {
            Infix::None => unreachable!("loop condition already filtered this out"),
            Infix::Binary => self.binary(),
            Infix::And => self.and_(),
            Infix::Or => self.or_(),
            Infix::Call => self.call(can_assign),
        }
    }

    fn grouping(&mut self) {
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after expression.");
    }

    fn unary(&mut self) {
        let operator = self.previous.kind;
        self.parse_precedence(Precedence::Unary);
        match operator {
            TokenKind::Minus => self.emit_op(OpCode::Negate),
            TokenKind::Bang => self.emit_op(OpCode::Not),
            _ => unreachable!("unary rule only registers these two kinds"),
        }
    }

    fn binary(&mut self) {
        let operator = self.previous.kind;
        let rule = rule_for(operator);
        self.parse_precedence(rule.precedence.next());
        match operator {
            TokenKind::Plus => self.emit_op(OpCode::Add),
            TokenKind::Minus => self.emit_op(OpCode::Subtract),
            TokenKind::Star => self.emit_op(OpCode::Multiply),
            TokenKind::Slash => self.emit_op(OpCode::Divide),
            TokenKind::EqualEqual => self.emit_op(OpCode::Equal),
            TokenKind::BangEqual => self.emit_ops(OpCode::Equal, OpCode::Not),
            TokenKind::Greater => self.emit_op(OpCode::Greater),
            TokenKind::GreaterEqual => self.emit_ops(OpCode::Less, OpCode::Not),
            TokenKind::Less => self.emit_op(OpCode::Less),
            TokenKind::LessEqual => self.emit_ops(OpCode::Greater, OpCode::Not),
            _ => unreachable!("binary rule only registers these kinds"),
        }
    }

    fn and_(&mut self) {
        let end_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.parse_precedence(Precedence::And);
        self.patch_jump(end_jump);
    }

    fn or_(&mut self) {
        let else_jump = self.emit_jump(OpCode::JumpIfFalse);
        let end_jump = self.emit_jump(OpCode::Jump);
        self.patch_jump(else_jump);
        self.emit_op(OpCode::Pop);
        self.parse_precedence(Precedence::Or);
        self.patch_jump(end_jump);
    }

    fn call(&mut self, _can_assign: bool) {
        let argc = self.argument_list();
        self.emit_op_u8(OpCode::Call, argc);
    }

    fn argument_list(&mut self) -> u8 {
        let mut argc: usize = 0;
        if !self.check(TokenKind::RightParen) {
            loop {
                self.expression();
                if argc >= MAX_PARAMS - 1 {
                    self.error("Cannot have more than 255 arguments.");
                }
                argc += 1;
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after arguments.");
        argc as u8
    }

    fn number(&mut self) {
        match self.previous.lexeme.parse::<f64>() {
            Ok(value) => self.emit_constant(Value::Number(value)),
            Err(_) => self.error("Invalid number literal."),
        }
    }

    fn string_literal(&mut self) {
        let lexeme = self.previous.lexeme;
        if find_malformed_hex_escape(lexeme).is_some() {
            self.error("Invalid hex escape sequence.");
            return;
        }
        let bytes = unescape_string(lexeme);
        let obj_ref = self.heap.intern_string(self.strings, bytes);
        self.emit_constant(Value::Obj(obj_ref));
    }

    fn literal(&mut self) {
        match self.previous.kind {
            TokenKind::False => self.emit_op(OpCode::False),
            TokenKind::Nil => self.emit_op(OpCode::Nil),
            TokenKind::True => self.emit_op(OpCode::True),
            _ => unreachable!("literal rule only registers these kinds"),
        }
    }

    fn variable(&mut self, can_assign: bool) {
        self.named_variable(self.previous.lexeme.to_string(), can_assign);
    }

    fn named_variable(&mut self, name: String, can_assign: bool) {
        let local_slot = self.resolve_local(&name);
        let (get_op, set_op, operand) = if let Some(slot) = local_slot {
            (OpCode::GetLocal, OpCode::SetLocal, slot)
        } else {
            let idx = self.identifier_constant(&name);
            (OpCode::GetGlobal, OpCode::SetGlobal, idx)
        };

        if can_assign && self.matches(TokenKind::Equal) {
            self.expression();
            self.emit_op_u8(set_op, operand);
        } else {
            self.emit_op_u8(get_op, operand);
        }
    }
}

/// Interprets the escape sequences allowed inside a scanned string lexeme
/// (§4.2): `"`-delimited strings accept `\n \r \t \" \\ \xHH`; `'`-delimited
/// strings only accept `\'`. The surrounding delimiter quotes are stripped.
///
/// Malformed `\xHH` (fewer than two following hex digits) is treated as a
/// compile-time error rather than replicated as undefined fallthrough
/// behavior (§9 Open Question, resolved conservatively) -- callers are
/// expected to have already validated via [`validate_escapes`] before
/// relying on this not panicking; this function itself never panics and
/// instead substitutes a literal `x` for a malformed escape.
fn unescape_string(lexeme: &str) -> Vec<u8> {
    let bytes = lexeme.as_bytes();
    let delimiter = bytes[0];
    let inner = &bytes[1..bytes.len() - 1];
    let mut out = Vec::with_capacity(inner.len());
    let mut i = 0;
    while i < inner.len() {
        let c = inner[i];
        if c == b'\\' && i + 1 < inner.len() {
            let next = inner[i + 1];
            if delimiter == b'\'' {
                if next == b'\'' {
                    out.push(b'\'');
                    i += 2;
                    continue;
                }
            } else {
                match next {
                    b'n' => {
                        out.push(b'\n');
                        i += 2;
                        continue;
                    }
                    b'r' => {
                        out.push(b'\r');
                        i += 2;
                        continue;
                    }
                    b't' => {
                        out.push(b'\t');
                        i += 2;
                        continue;
                    }
                    b'"' => {
                        out.push(b'"');
                        i += 2;
                        continue;
                    }
                    b'\\' => {
                        out.push(b'\\');
                        i += 2;
                        continue;
                    }
                    b'x' if i + 3 < inner.len() && is_hex(inner[i + 2]) && is_hex(inner[i + 3]) => {
                        let hi = hex_value(inner[i + 2]);
                        let lo = hex_value(inner[i + 3]);
                        out.push((hi << 4) | lo);
                        i += 4;
                        continue;
                    }
                    _ => {}
                }
            }
        }
        out.push(c);
        i += 1;
    }
    out
}

/// Scans `lexeme` for a malformed `\x` escape without consuming it, so the
/// compiler can raise "Invalid hex escape sequence." before ever emitting a
/// constant. Returns the byte offset of the first malformed occurrence.
fn find_malformed_hex_escape(lexeme: &str) -> Option<usize> {
    let bytes = lexeme.as_bytes();
    let delimiter = bytes[0];
    if delimiter == b'\'' {
        return None;
    }
    let inner = &bytes[1..bytes.len() - 1];
    let mut i = 0;
    while i < inner.len() {
        if inner[i] == b'\\' && i + 1 < inner.len() {
            if inner[i + 1] == b'x' {
                let ok = i + 3 < inner.len() && is_hex(inner[i + 2]) && is_hex(inner[i + 3]);
                if !ok {
                    return Some(i);
                }
                i += 4;
                continue;
            }
            i += 2;
            continue;
        }
        i += 1;
    }
    None
}

fn is_hex(c: u8) -> bool {
    c.is_ascii_hexdigit()
}

fn hex_value(c: u8) -> u8 {
    (c as char).to_digit(16).expect("checked by is_hex") as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unescapes_common_sequences_in_double_quoted_strings() {
        assert_eq!(unescape_string(r#""a\nb\t\"c\\d""#), b"a\nb\t\"c\\d");
    }

    #[test]
    fn single_quoted_strings_only_unescape_the_quote() {
        assert_eq!(unescape_string(r"'a\'b\n'"), b"a'b\\n");
    }

    #[test]
    fn hex_escape_decodes_byte() {
        assert_eq!(unescape_string(r#""\x41""#), b"A");
    }

    #[test]
    fn malformed_hex_escape_is_detected() {
        assert_eq!(find_malformed_hex_escape(r#""\xZZ""#), Some(0));
        assert_eq!(find_malformed_hex_escape(r#""\x4""#), Some(0));
        assert_eq!(find_malformed_hex_escape(r#""\x41""#), None);
    }
}
