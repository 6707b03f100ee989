//! Quorum bytecode: instruction encoding and the evaluating stack machine.
//!
//! Every instruction is one byte. The top two bits select the class, the low
//! six bits carry a payload:
//!
//! | class | meaning |
//! |-------|---------|
//! | `00`  | special; only `0x01` (ADD) is defined: pop a, b and push a + b |
//! | `01`  | push `found[id]` |
//! | `10`  | pop v and push `v >= K` |
//! | `11`  | prefix: `prefix = prefix << 6 | payload` |
//!
//! Operands wider than six bits are spelled as prefix bytes, most significant
//! group first, followed by the witness or threshold byte carrying the lowest
//! six bits. The next witness or threshold instruction consumes the prefix.
//!
//! The encoding must match other Sigsum implementations byte for byte; it is
//! not a general-purpose varint.

/// Pops two values and pushes their sum.
pub const OP_ADD: u8 = 0x01;

/// Class bits of a witness reference.
pub const CLASS_WITNESS: u8 = 0x40;

/// Class bits of a threshold test.
pub const CLASS_THRESHOLD: u8 = 0x80;

/// Class bits of a prefix continuation.
pub const CLASS_PREFIX: u8 = 0xc0;

const CLASS_MASK: u8 = 0xc0;
const PAYLOAD_MASK: u8 = 0x3f;
const PAYLOAD_BITS: u32 = 6;

/// Bytes needed to encode `value` as an operand: one per started 6-bit group.
pub fn encoded_len(value: usize) -> usize {
    let mut len = 1;
    let mut rest = value >> PAYLOAD_BITS;
    while rest > 0 {
        len += 1;
        rest >>= PAYLOAD_BITS;
    }
    len
}

/// Append `value` as prefix bytes followed by one `class` instruction.
pub fn write_operand(out: &mut Vec<u8>, class: u8, value: usize) {
    let len = encoded_len(value);
    for group in (1..len).rev() {
        let bits = (value >> (group as u32 * PAYLOAD_BITS)) as u8 & PAYLOAD_MASK;
        out.push(CLASS_PREFIX | bits);
    }
    out.push(class | (value as u8 & PAYLOAD_MASK));
}

/// Evaluate a compiled quorum program.
///
/// `found[i]` is 1 when witness `i` (in compiled order) produced a valid
/// cosignature. Returns true only when the program leaves exactly one value
/// on the stack and that value is 1.
///
/// Malformed programs are a negative answer, not an error: an unknown
/// opcode, a witness id outside `witness_count`, stack underflow or an
/// overflowing ADD all return false. Runs in time linear in the program length.
pub fn eval_quorum_bytecode(bytecode: &[u8], witness_count: usize, found: &[u8]) -> bool {
    let mut stack: Vec<u8> = Vec::with_capacity(bytecode.len());
    let mut prefix: u32 = 0;

    for &instr in bytecode {
        let payload = u32::from(instr & PAYLOAD_MASK);
        match instr & CLASS_MASK {
            0x00 => {
                prefix = 0;
                if instr != OP_ADD {
                    return false;
                }
                let (Some(a), Some(b)) = (stack.pop(), stack.pop()) else {
                    return false;
                };
                let Some(sum) = a.checked_add(b) else {
                    return false;
                };
                stack.push(sum);
            }
            CLASS_WITNESS => {
                let id = ((prefix << PAYLOAD_BITS) | payload) as usize;
                prefix = 0;
                if id >= witness_count {
                    return false;
                }
                let Some(&value) = found.get(id) else {
                    return false;
                };
                stack.push(value);
            }
            CLASS_THRESHOLD => {
                let k = (prefix << PAYLOAD_BITS) | payload;
                prefix = 0;
                let Some(value) = stack.pop() else {
                    return false;
                };
                stack.push(u8::from(u32::from(value) >= k));
            }
            _ => {
                prefix = (prefix << PAYLOAD_BITS) | payload;
            }
        }
    }

    stack.len() == 1 && stack[0] == 1
}
