//! Fixed object payload construction
//!
//! PUT tests upload the same payload for every object. By default the bytes
//! are random so TLS-level compression cannot shrink what actually crosses
//! the wire; `--objopts c` asks for a compressible payload instead.

use rand::RngCore;

const SEED_CHUNK: usize = 32 * 1024;

/// Build a fixed payload of exactly `size` bytes
pub fn build_payload(size: u64, compressible: bool) -> Vec<u8> {
    let size = size as usize;
    let mut seed = vec![0u8; SEED_CHUNK];
    if compressible {
        seed.fill(b' ');
    } else {
        rand::thread_rng().fill_bytes(&mut seed);
    }

    // replicate the seed chunk until we cover the requested size
    let mut payload = seed;
    while payload.len() < size {
        payload.extend_from_within(..);
    }
    payload.truncate(size);
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_sizes() {
        for size in [0u64, 1, 1419, 4096, 100 * 1024] {
            assert_eq!(build_payload(size, false).len() as u64, size);
            assert_eq!(build_payload(size, true).len() as u64, size);
        }
    }

    #[test]
    fn test_compressible_payload_is_uniform() {
        let payload = build_payload(8192, true);
        assert!(payload.iter().all(|&b| b == b' '));
    }

    #[test]
    fn test_payload_larger_than_seed_chunk() {
        let payload = build_payload(100 * 1024, false);
        assert_eq!(payload.len(), 100 * 1024);
        // replicated chunks repeat the seed
        assert_eq!(payload[..SEED_CHUNK], payload[SEED_CHUNK..2 * SEED_CHUNK]);
    }
}
