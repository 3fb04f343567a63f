/// A chunk of file data tagged with its block id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Position of the block in the file, counting from 0.
    pub id: u32,
    /// Raw block data.
    pub payload: Vec<u8>,
}

impl Block {
    pub fn new(id: u32, payload: Vec<u8>) -> Self {
        Self { id, payload }
    }
}
