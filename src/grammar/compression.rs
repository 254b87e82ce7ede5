//! Packing the strings a rule needs into one pool at the end of its bytecode.
//!
//! Takes a map of string slot indices to strings, and returns the pool and a mapping of
//! those slot indices to positions in the pool.
//! Note you must then add the length of the bytecode to get the *real* pointers.

use std::collections::HashMap;

use itertools::Itertools;

pub fn reverse_sort(string_slots: HashMap<usize, Vec<u8>>) -> (Vec<u8>, Vec<(usize, usize)>) {
    let mut strings = string_slots.into_iter().collect_vec();
    // Longest first; a string that already sits somewhere in the pool is reused.
    // Ties are broken by slot so the same rule always compiles to the same bytes.
    strings.sort_unstable_by(|a, b| b.1.len().cmp(&a.1.len()).then(a.0.cmp(&b.0)));
    let mut buffer = Vec::new();
    let out = strings
        .into_iter()
        .map(|(slot, string)| {
            let bufptr = if string.is_empty() {
                0
            } else if let Some(already_idx) = buffer
                .windows(string.len())
                .position(|slice| slice == string.as_slice())
            {
                already_idx
            } else {
                let ptr = buffer.len();
                buffer.extend(string.iter().copied());
                ptr
            };
            (slot, bufptr)
        })
        .collect();
    (buffer, out)
}

#[test]
fn shared_strings_are_stored_once() {
    let slots = vec![
        (0, b"0123456789".to_vec()),
        (10, b"345".to_vec()),
        (20, b"abc".to_vec()),
        (30, Vec::new()),
    ]
    .into_iter()
    .collect();
    let (buffer, mut out) = reverse_sort(slots);
    out.sort_unstable();
    assert_eq!(buffer, b"0123456789abc");
    assert_eq!(out, vec![(0, 0), (10, 3), (20, 10), (30, 0)]);
}
