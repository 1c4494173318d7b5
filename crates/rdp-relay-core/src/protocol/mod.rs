//! Protocol module containing the instruction model, the text codec and the
//! off-screen layer pool.

pub mod codec;
pub mod instruction;
pub mod layer;

pub use codec::{decode_elements, decode_instruction, encode_elements, encode_instruction, ProtocolError};
pub use instruction::{CompositeMode, Instruction, LayerId, StatusCode};
pub use layer::LayerPool;
