//! Bytecode disassembler (§4.9, ADDED): not required by the spec's core,
//! but every compiler in this corpus ships one, so this crate carries it
//! behind the `disassemble` feature and the driver exposes it via a flag.

use tansy_value::{Chunk, Heap, OpCode};

pub fn disassemble_chunk(chunk: &Chunk, heap: &Heap, name: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("== {name} ==\n"));
    let mut offset = 0;
    while offset < chunk.len() {
        offset = disassemble_instruction(chunk, heap, offset, &mut out);
    }
    out
}

fn disassemble_instruction(chunk: &Chunk, heap: &Heap, offset: usize, out: &mut String) -> usize {
    out.push_str(&format!("{offset:04} "));
    if offset > 0 && chunk.line_at(offset) == chunk.line_at(offset - 1) {
        out.push_str("   | ");
    } else {
        out.push_str(&format!("{:4} ", chunk.line_at(offset)));
    }

    let byte = chunk.code()[offset];
    let op = match OpCode::try_from(byte) {
        Ok(op) => op,
        Err(unknown) => {
            out.push_str(&format!("Unknown opcode {unknown}\n"));
            return offset + 1;
        }
    };

    match op {
        OpCode::Constant => constant_instruction("CONSTANT", chunk, heap, offset, out),
        OpCode::Nil => simple_instruction("NIL", offset, out),
        OpCode::True => simple_instruction("TRUE", offset, out),
        OpCode::False => simple_instruction("FALSE", offset, out),
        OpCode::Pop => simple_instruction("POP", offset, out),
        OpCode::GetLocal => byte_instruction("GET_LOCAL", chunk, offset, out),
        OpCode::SetLocal => byte_instruction("SET_LOCAL", chunk, offset, out),
        OpCode::GetGlobal => constant_instruction("GET_GLOBAL", chunk, heap, offset, out),
        OpCode::DefineGlobal => constant_instruction("DEFINE_GLOBAL", chunk, heap, offset, out),
        OpCode::SetGlobal => constant_instruction("SET_GLOBAL", chunk, heap, offset, out),
        OpCode::Equal => simple_instruction("EQUAL", offset, out),
        OpCode::Greater => simple_instruction("GREATER", offset, out),
        OpCode::Less => simple_instruction("LESS", offset, out),
        OpCode::Add => simple_instruction("ADD", offset, out),
        OpCode::Subtract => simple_instruction("SUBTRACT", offset, out),
        OpCode::Multiply => simple_instruction("MULTIPLY", offset, out),
        OpCode::Divide => simple_instruction("DIVIDE", offset, out),
        OpCode::Not => simple_instruction("NOT", offset, out),
        OpCode::Negate => simple_instruction("NEGATE", offset, out),
        OpCode::Print => simple_instruction("PRINT", offset, out),
        OpCode::Echo => byte_instruction("ECHO", chunk, offset, out),
        OpCode::Jump => jump_instruction("JUMP", 1, chunk, offset, out),
        OpCode::JumpIfFalse => jump_instruction("JUMP_IF_FALSE", 1, chunk, offset, out),
        OpCode::Loop => jump_instruction("LOOP", -1, chunk, offset, out),
        OpCode::Call => byte_instruction("CALL", chunk, offset, out),
        OpCode::Return => simple_instruction("RETURN", offset, out),
        OpCode::Exit => simple_instruction("EXIT", offset, out),
        OpCode::Transclude => constant_instruction("TRANSCLUDE", chunk, heap, offset, out),
    }
}

fn simple_instruction(name: &str, offset: usize, out: &mut String) -> usize {
    out.push_str(&format!("{name}\n"));
    offset + 1
}

fn byte_instruction(name: &str, chunk: &Chunk, offset: usize, out: &mut String) -> usize {
    let slot = chunk.code()[offset + 1];
    out.push_str(&format!("{name:<16} {slot:4}\n"));
    offset + 2
}

fn constant_instruction(name: &str, chunk: &Chunk, heap: &Heap, offset: usize, out: &mut String) -> usize {
    let index = chunk.code()[offset + 1] as usize;
    let value = chunk.constants()[index];
    out.push_str(&format!("{name:<16} {index:4} '{}'\n", heap.format_value(value)));
    offset + 2
}

fn jump_instruction(name: &str, sign: i32, chunk: &Chunk, offset: usize, out: &mut String) -> usize {
    let hi = chunk.code()[offset + 1] as u16;
    let lo = chunk.code()[offset + 2] as u16;
    let jump = (hi << 8) | lo;
    let target = offset as i64 + 3 + sign as i64 * jump as i64;
    out.push_str(&format!("{name:<16} {offset:4} -> {target}\n"));
    offset + 3
}

#[cfg(test)]
mod tests {
    use super::*;
    use tansy_util::Handler;

    #[test]
    fn disassembles_a_tiny_chunk() {
        let mut handler = Handler::default();
        let mut heap = Heap::new();
        let mut strings = tansy_value::Table::new();
        let function_ref = crate::Compiler::new("print 1 + 2;", 1, &mut handler, &mut heap, &mut strings)
            .compile()
            .unwrap();
        let function = heap.get(function_ref).as_function().unwrap();
        let text = disassemble_chunk(&function.chunk, &heap, "test");
        assert!(text.contains("CONSTANT"));
        assert!(text.contains("ADD"));
        assert!(text.contains("PRINT"));
    }
}
