//! Splitting a configuration blob into write-sized chunks

/// Split `blob` into consecutive chunks of at most `boundary` bytes
///
/// Every chunk is non-empty; only the last may be shorter than `boundary`.
/// An empty blob yields no chunks. `boundary` must be non-zero.
pub fn split_config(blob: &[u8], boundary: usize) -> Vec<&[u8]> {
    if boundary == 0 {
        return Vec::new();
    }
    blob.chunks(boundary).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_exact_multiple_has_no_trailing_chunk() {
        let blob = vec![7u8; 2400];
        let chunks = split_config(&blob, 800);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() == 800));
    }

    #[test]
    fn test_edge_lengths() {
        assert!(split_config(&[], 800).is_empty());

        let one = vec![1u8; 800];
        assert_eq!(split_config(&one, 800), vec![&one[..]]);

        let plus_one = vec![2u8; 801];
        let chunks = split_config(&plus_one, 800);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1], &[2u8][..]);
    }

    #[test]
    fn test_zero_boundary_yields_nothing() {
        assert!(split_config(&[1, 2, 3], 0).is_empty());
    }

    proptest! {
        #[test]
        fn prop_concatenation_reproduces_blob(
            blob in proptest::collection::vec(any::<u8>(), 0..4096),
            boundary in 1usize..1300,
        ) {
            let chunks = split_config(&blob, boundary);
            prop_assert_eq!(chunks.concat(), blob.clone());
            prop_assert_eq!(chunks.len(), blob.len().div_ceil(boundary));
            for (i, chunk) in chunks.iter().enumerate() {
                prop_assert!(!chunk.is_empty());
                if i + 1 < chunks.len() {
                    prop_assert_eq!(chunk.len(), boundary);
                }
            }
        }
    }
}
