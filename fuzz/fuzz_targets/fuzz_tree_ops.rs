#![no_main]
use cidrtree::{Preallocate, RadixError, RadixKey, RadixTree, SystemAllocator};
use libfuzzer_sys::fuzz_target;
use std::collections::HashMap;

const WARM_LEVELS: u32 = 3;

// Each 6-byte chunk is one operation: opcode, prefix length, 32-bit key.
// Results are checked against a plain map of (prefix, length) -> value.
fuzz_target!(|data: &[u8]| {
    let Ok(mut tree) = RadixTree::<u32>::create(SystemAllocator, Preallocate::Levels(WARM_LEVELS)) else {
        return;
    };
    let mut model: HashMap<(u32, u32), usize> = HashMap::new();

    for (i, chunk) in data.chunks_exact(6).enumerate() {
        let len = u32::from(chunk[1]) % 33;
        let key = u32::from_be_bytes([chunk[2], chunk[3], chunk[4], chunk[5]]);
        let mask = u32::prefix_mask(len);
        let slot = (key & mask, len);

        match chunk[0] % 3 {
            0 => {
                let result = tree.insert(key, mask, i);
                if model.contains_key(&slot) {
                    assert_eq!(result, Err(RadixError::Busy));
                } else {
                    assert_eq!(result, Ok(()));
                    model.insert(slot, i);
                }
            }
            1 => {
                let result = tree.delete(key, mask);
                if model.remove(&slot).is_some() {
                    assert_eq!(result, Ok(()));
                } else if result.is_ok() {
                    // Only a valueless warm-up leaf goes without a stored value
                    assert!((1..=WARM_LEVELS).contains(&len));
                } else {
                    assert_eq!(result, Err(RadixError::NotFound));
                }
            }
            _ => {
                let expected = model
                    .iter()
                    .filter(|((prefix, len), _)| key & u32::prefix_mask(*len) == *prefix)
                    .max_by_key(|((_, len), _)| *len)
                    .map(|(_, value)| *value);
                assert_eq!(tree.find(key), expected);
            }
        }
    }
});
