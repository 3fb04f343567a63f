use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::{BLOCK_SIZE, TransferError};

/// 256-bit digest used for both the per-block and the final hash.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// BLAKE3, the algorithm the server fingerprints files with.
    #[default]
    Blake3,
    Sha256,
}

enum BlockState {
    Blake3(Box<blake3::Hasher>),
    Sha256(Sha256),
}

impl BlockState {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Blake3 => BlockState::Blake3(Box::new(blake3::Hasher::new())),
            HashAlgorithm::Sha256 => BlockState::Sha256(Sha256::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            BlockState::Blake3(h) => {
                h.update(data);
            }
            BlockState::Sha256(h) => h.update(data),
        }
    }

    /// Returns the raw 32-byte digest and resets the state.
    fn finish_reset(&mut self) -> [u8; 32] {
        match self {
            BlockState::Blake3(h) => {
                let out = *h.finalize().as_bytes();
                h.reset();
                out
            }
            BlockState::Sha256(h) => h.finalize_reset().into(),
        }
    }
}

/// Two-level content fingerprint.
///
/// The input is cut into consecutive [`BLOCK_SIZE`] blocks (the last one
/// may be shorter), each block is digested independently, the raw digests
/// are concatenated in block order and the result is digested once more.
/// The output is the lowercase hex of that final digest.
///
/// Feeding the same bytes through any sequence of [`update`](Self::update)
/// calls yields the same fingerprint.
pub struct ContentHasher {
    algorithm: HashAlgorithm,
    block: BlockState,
    in_block: usize,
    digests: Vec<u8>,
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentHasher {
    /// Creates a BLAKE3 hasher.
    pub fn new() -> Self {
        Self::with_algorithm(HashAlgorithm::default())
    }

    pub fn with_algorithm(algorithm: HashAlgorithm) -> Self {
        Self {
            algorithm,
            block: BlockState::new(algorithm),
            in_block: 0,
            digests: Vec::new(),
        }
    }

    /// Absorbs more input.
    pub fn update(&mut self, mut data: &[u8]) {
        while !data.is_empty() {
            let take = (BLOCK_SIZE - self.in_block).min(data.len());
            self.block.update(&data[..take]);
            self.in_block += take;
            data = &data[take..];

            if self.in_block == BLOCK_SIZE {
                self.close_block();
            }
        }
    }

    /// Number of blocks digested so far, counting a partial trailing block.
    pub fn blocks(&self) -> usize {
        self.digests.len() / 32 + usize::from(self.in_block > 0)
    }

    /// Finishes the trailing block (if any) and returns the hex fingerprint.
    pub fn finalize(mut self) -> String {
        if self.in_block > 0 {
            self.close_block();
        }
        let digest: [u8; 32] = match self.algorithm {
            HashAlgorithm::Blake3 => *blake3::hash(&self.digests).as_bytes(),
            HashAlgorithm::Sha256 => Sha256::digest(&self.digests).into(),
        };
        hex::encode(digest)
    }

    fn close_block(&mut self) {
        let digest = self.block.finish_reset();
        self.digests.extend_from_slice(&digest);
        self.in_block = 0;
    }
}

/// Number of blocks an input of `len` bytes splits into.
pub fn block_count(len: u64) -> u64 {
    len.div_ceil(BLOCK_SIZE as u64)
}

/// Fingerprints an in-memory buffer with BLAKE3.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = ContentHasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Fingerprints everything readable from `reader`.
pub fn hash_reader<R: Read>(mut reader: R, algorithm: HashAlgorithm) -> std::io::Result<String> {
    let mut hasher = ContentHasher::with_algorithm(algorithm);
    let mut buf = vec![0u8; 256 * 1024];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}

/// Fingerprints a file on disk with BLAKE3.
///
/// Blocking; async callers should run it under `spawn_blocking`.
pub fn hash_file(path: &Path) -> Result<String, TransferError> {
    let file = std::fs::File::open(path)?;
    Ok(hash_reader(file, HashAlgorithm::Blake3)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Reference computation: explicit block split, no streaming.
    fn reference(data: &[u8]) -> String {
        let mut concat = Vec::new();
        for block in data.chunks(BLOCK_SIZE) {
            concat.extend_from_slice(blake3::hash(block).as_bytes());
        }
        blake3::hash(&concat).to_hex().to_string()
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn deterministic() {
        let data = pattern(10_000);
        let h1 = hash_bytes(&data);
        let h2 = hash_bytes(&data);
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
        assert!(h1.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn empty_input_hashes_empty_concatenation() {
        let hasher = ContentHasher::new();
        assert_eq!(hasher.blocks(), 0);
        assert_eq!(hasher.finalize(), blake3::hash(b"").to_hex().to_string());
    }

    #[test]
    fn block_counts_at_boundaries() {
        assert_eq!(block_count(0), 0);
        assert_eq!(block_count(1), 1);
        assert_eq!(block_count(BLOCK_SIZE as u64), 1);
        assert_eq!(block_count(BLOCK_SIZE as u64 + 1), 2);
        assert_eq!(block_count(3 * BLOCK_SIZE as u64), 3);
    }

    #[test]
    fn exact_block_has_no_trailing_block() {
        let data = pattern(BLOCK_SIZE);
        let mut hasher = ContentHasher::new();
        hasher.update(&data);
        assert_eq!(hasher.blocks(), 1);
        assert_eq!(hasher.finalize(), reference(&data));
    }

    #[test]
    fn one_byte_past_block_adds_block() {
        let data = pattern(BLOCK_SIZE + 1);
        let mut hasher = ContentHasher::new();
        hasher.update(&data);
        assert_eq!(hasher.blocks(), 2);
        assert_eq!(hasher.finalize(), reference(&data));
    }

    #[test]
    fn exact_multiple_of_block_size() {
        let data = pattern(3 * BLOCK_SIZE);
        let mut hasher = ContentHasher::new();
        hasher.update(&data);
        assert_eq!(hasher.blocks(), 3);
        assert_eq!(hasher.finalize(), reference(&data));
    }

    #[test]
    fn not_a_plain_digest() {
        // The two-level construction differs from hashing the bytes directly.
        let data = b"hello world";
        assert_ne!(hash_bytes(data), blake3::hash(data).to_hex().to_string());
        assert_eq!(hash_bytes(data), reference(data));
    }

    #[test]
    fn streaming_split_does_not_matter() {
        let data = pattern(BLOCK_SIZE * 2 + 777);
        let one_shot = hash_bytes(&data);

        let mut hasher = ContentHasher::new();
        for piece in data.chunks(65_521) {
            hasher.update(piece);
        }
        assert_eq!(hasher.finalize(), one_shot);

        let mut hasher = ContentHasher::new();
        let (a, b) = data.split_at(BLOCK_SIZE - 1);
        hasher.update(a);
        hasher.update(&[]);
        hasher.update(b);
        assert_eq!(hasher.finalize(), one_shot);
    }

    #[test]
    fn single_byte_mutation_changes_hash() {
        let data = pattern(BLOCK_SIZE + 4096);
        let original = hash_bytes(&data);

        for pos in [0, BLOCK_SIZE - 1, BLOCK_SIZE, data.len() - 1] {
            let mut mutated = data.clone();
            mutated[pos] ^= 0x01;
            assert_ne!(hash_bytes(&mutated), original, "mutation at {pos} not detected");
        }
    }

    #[test]
    fn sha256_variant() {
        let data = pattern(1000);
        let mut hasher = ContentHasher::with_algorithm(HashAlgorithm::Sha256);
        hasher.update(&data);
        let got = hasher.finalize();

        let block = Sha256::digest(&data);
        let expected = hex::encode(Sha256::digest(block));
        assert_eq!(got, expected);
        assert_ne!(got, hash_bytes(&data));
    }

    #[test]
    fn hash_file_matches_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        let data = pattern(BLOCK_SIZE + 10);
        std::fs::File::create(&path)
            .unwrap()
            .write_all(&data)
            .unwrap();

        assert_eq!(hash_file(&path).unwrap(), hash_bytes(&data));
    }

    #[test]
    fn hash_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let result = hash_file(&dir.path().join("nope"));
        assert!(matches!(result, Err(TransferError::Io(_))));
    }
}
