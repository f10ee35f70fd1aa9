use std::cmp::max;
use std::mem::take;

use crate::align::align_vec;
use crate::error::{Error, Result};

pub(crate) const MAX_ARRAY_LEN: usize = 64 * 1024 * 1024;

pub(crate) struct PendingMessage {
    pub builder: MessageBuilder,
    pub signature: Vec<u8>,
}

impl Default for PendingMessage {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingMessage {
    pub fn new() -> Self {
        Self {
            builder: MessageBuilder::new(),
            signature: Vec::new(),
        }
    }
}

// The builder does not know at which offset its data will finally land, since
// a value is encoded on its own before being appended to its parent. So data
// is kept in slices that each carry the alignment they need, and padding is
// only materialized in `complete`.

pub(crate) struct MessageBuilder {
    sealed: Vec<MessageComponent>,
    top: AlignmentSlice,
}

#[derive(Debug, Clone, PartialEq)]
struct AlignmentSlice {
    alignment: usize,
    data: Vec<u8>,
}

impl AlignmentSlice {
    fn new(alignment: usize) -> Self {
        Self {
            alignment,
            data: Vec::new(),
        }
    }
}

// Length markers always nest, because an array's contents are appended
// between its own begin and end.
#[derive(Debug, Clone, PartialEq)]
enum MessageComponent {
    AlignmentSlice(AlignmentSlice),
    LengthBegin,
    LengthEnd,
}

impl MessageBuilder {
    pub(crate) fn new() -> Self {
        Self {
            sealed: Vec::new(),
            top: AlignmentSlice::new(1),
        }
    }

    fn seal(&mut self, next: MessageComponent, alignment: usize) {
        let top = std::mem::replace(&mut self.top, AlignmentSlice::new(alignment));
        self.sealed.push(MessageComponent::AlignmentSlice(top));
        self.sealed.push(next);
    }

    /// Starts a length-prefixed array whose first element needs
    /// `item_alignment`. The padding before the first element is not
    /// counted, and is present even if the array stays empty.
    pub(crate) fn start_length(&mut self, item_alignment: usize) {
        self.align(4);
        self.seal(MessageComponent::LengthBegin, max(4, item_alignment));
    }

    pub(crate) fn finish_length(&mut self) {
        self.seal(MessageComponent::LengthEnd, 1);
    }

    // Note: alignment must be power of 2
    pub(crate) fn align(&mut self, alignment: usize) {
        if self.top.data.is_empty() {
            // Nothing written yet, so the guarantee can still be raised.
            self.top.alignment = max(self.top.alignment, alignment);
        } else if self.top.alignment >= alignment {
            align_vec(&mut self.top.data, alignment);
        } else {
            // Earlier data cannot be aligned more strictly after the fact,
            // so the stricter guarantee starts a new slice.
            let top = std::mem::replace(&mut self.top, AlignmentSlice::new(alignment));
            self.sealed.push(MessageComponent::AlignmentSlice(top));
        }
    }

    // This does not touch any signature
    pub(crate) fn append_data(&mut self, other: &MessageBuilder) {
        for component in other.sealed.iter() {
            self.append_component(component);
        }
        self.align(other.top.alignment);
        self.write(&other.top.data);
    }

    fn append_component(&mut self, component: &MessageComponent) {
        match component {
            MessageComponent::AlignmentSlice(slice) => {
                self.align(slice.alignment);
                self.write(&slice.data);
            }
            MessageComponent::LengthBegin => self.seal(MessageComponent::LengthBegin, 1),
            MessageComponent::LengthEnd => self.seal(MessageComponent::LengthEnd, 1),
        }
    }

    pub(crate) fn prepare_write(&mut self, size: usize) -> &mut [u8] {
        let old_len = self.top.data.len();
        let new_len = old_len + size;
        self.top.data.resize(new_len, 0);
        &mut self.top.data[old_len..new_len]
    }

    pub(crate) fn write(&mut self, bytes: &[u8]) {
        self.top.data.extend_from_slice(bytes);
    }

    pub(crate) fn complete(mut self) -> Result<Vec<u8>> {
        let top = take(&mut self.top.data);
        self.sealed
            .push(MessageComponent::AlignmentSlice(AlignmentSlice {
                alignment: self.top.alignment,
                data: top,
            }));

        let mut output_data = Vec::new();

        // Arrays we are currently inside: where to backfill the length, and
        // where the element data begins (after the padding for the first
        // element, once known).
        let mut lengths: Vec<(usize, Option<usize>)> = Vec::new();

        for datum in self.sealed {
            match datum {
                MessageComponent::AlignmentSlice(mut a_slice) => {
                    // Now we know how many bytes this alignment will
                    // actually take.
                    align_vec(&mut output_data, a_slice.alignment);

                    if let Some((_, begin @ None)) = lengths.last_mut() {
                        *begin = Some(output_data.len());
                    }

                    output_data.append(&mut a_slice.data);
                }
                MessageComponent::LengthBegin => {
                    lengths.push((output_data.len(), None));
                    output_data.extend_from_slice(&[0u8; 4]);
                }
                MessageComponent::LengthEnd => {
                    if let Some((fill_ix, begin_ix)) = lengths.pop() {
                        let begin_ix = begin_ix.unwrap_or(fill_ix + 4);
                        let length = output_data.len() - begin_ix;
                        if length > MAX_ARRAY_LEN {
                            return Err(Error::ArrayTooLong(length));
                        }
                        output_data[fill_ix..fill_ix + 4]
                            .copy_from_slice(&(length as u32).to_le_bytes());
                    }
                }
            }
        }

        Ok(output_data)
    }
}

#[cfg(test)]
mod tests {
    use super::MessageBuilder;
    use crate::error::Result;

    #[test]
    fn relocates_alignment() -> Result<()> {
        let mut inner = MessageBuilder::new();
        inner.align(8);
        inner.write(&[1, 2, 3, 4, 5, 6, 7, 8]);

        let mut outer = MessageBuilder::new();
        outer.write(&[0xff]);
        outer.append_data(&inner);

        assert_eq!(
            outer.complete()?,
            vec![0xff, 0, 0, 0, 0, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8]
        );
        Ok(())
    }

    #[test]
    fn empty_array_keeps_element_padding() -> Result<()> {
        let mut builder = MessageBuilder::new();
        builder.start_length(8);
        builder.finish_length();
        assert_eq!(builder.complete()?, vec![0, 0, 0, 0, 0, 0, 0, 0]);
        Ok(())
    }

    #[test]
    fn nested_lengths() -> Result<()> {
        // aai: [[1], []]
        let mut builder = MessageBuilder::new();
        builder.start_length(4);
        builder.start_length(4);
        builder.align(4);
        builder.write(&1u32.to_le_bytes());
        builder.finish_length();
        builder.start_length(4);
        builder.finish_length();
        builder.finish_length();
        assert_eq!(
            builder.complete()?,
            vec![12, 0, 0, 0, 4, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0]
        );
        Ok(())
    }
}
