use std::num::Wrapping;

pub(crate) fn align(ix: usize, alignment: usize) -> usize {
    debug_assert!(
        alignment.is_power_of_two(),
        "{} is not power of 2, cannot be used as alignment",
        alignment
    );
    let mask = Wrapping(alignment) - Wrapping(1);
    let old_size = Wrapping(ix);
    let new_size = old_size + ((-old_size) & mask);
    debug_assert!(
        new_size >= old_size,
        "align function broke: {} < {}",
        new_size,
        old_size
    );
    new_size.0
}

pub(crate) fn align_vec(vec: &mut Vec<u8>, alignment: usize) {
    vec.resize(align(vec.len(), alignment), 0);
}
