use crate::body::Body;
use crate::error::{Error, Result};
use crate::primitives::DbusPrimitive;
use crate::signature::{alignment_of, Signature};

use super::message_builder::{MessageBuilder, PendingMessage};

use std::mem::take;

pub(super) struct ReadySerializer {
    mesg: PendingMessage,
}

pub(super) struct DoneSerializer {
    mesg: PendingMessage,
}

impl DoneSerializer {
    fn extract(self) -> PendingMessage {
        self.mesg
    }

    pub(super) fn into_parts(self) -> (MessageBuilder, Vec<u8>) {
        (self.mesg.builder, self.mesg.signature)
    }

    pub(super) fn complete(self) -> Result<Body> {
        let signature = Signature::from_bytes(self.mesg.signature)?;
        Ok(Body::new(signature, self.mesg.builder.complete()?))
    }
}

impl ReadySerializer {
    pub(super) fn new() -> Self {
        Self {
            mesg: PendingMessage::new(),
        }
    }

    pub(super) fn serialize_primitive<T: DbusPrimitive>(
        self,
        primitive: &T,
    ) -> Result<DoneSerializer> {
        let mut mesg = self.mesg;

        mesg.builder.align(T::alignment());
        primitive.serialize(mesg.builder.prepare_write(primitive.size()))?;
        mesg.signature.push(T::signature());

        Ok(DoneSerializer { mesg })
    }

    pub(super) fn start_struct(self) -> ReadyStructSerializer {
        ReadyStructSerializer::new(self.mesg)
    }

    pub(super) fn start_kv_pair(self) -> ReadyStructSerializer {
        ReadyStructSerializer::new_kv_pair(self.mesg)
    }

    pub(super) fn start_array(self, item_sig: Vec<u8>) -> Result<ReadyArraySerializer> {
        ReadyArraySerializer::new(self.mesg, item_sig)
    }

    pub(super) fn start_variant(self) -> (VariantSerializer, ReadySerializer) {
        (
            VariantSerializer { mesg: self.mesg },
            ReadySerializer::new(),
        )
    }
}

impl Default for ReadySerializer {
    fn default() -> Self {
        Self::new()
    }
}

pub(super) struct VariantSerializer {
    mesg: PendingMessage,
}

impl VariantSerializer {
    pub(super) fn finish_variant(self, value: DoneSerializer) -> DoneSerializer {
        let mut mesg = self.mesg;
        let value_mesg = value.extract();

        // signature, as a 'g': length byte, the codes, terminating null
        mesg.builder.write(&[value_mesg.signature.len() as u8]);
        mesg.builder.write(&value_mesg.signature);
        mesg.builder.write(&[0u8]);

        // value (inherits alignment)
        mesg.builder.append_data(&value_mesg.builder);

        mesg.signature.push(b'v');

        DoneSerializer { mesg }
    }
}

pub(super) struct ReadyStructSerializer {
    mesg: PendingMessage,
}

impl ReadyStructSerializer {
    fn new(mut mesg: PendingMessage) -> Self {
        mesg.builder.align(8);
        mesg.signature.push(b'(');
        ReadyStructSerializer { mesg }
    }

    fn new_kv_pair(mut mesg: PendingMessage) -> Self {
        mesg.builder.align(8);
        mesg.signature.push(b'{');
        ReadyStructSerializer { mesg }
    }

    pub(super) fn start_item(self) -> (PendingStructSerializer, ReadySerializer) {
        (PendingStructSerializer, ReadySerializer { mesg: self.mesg })
    }

    pub(super) fn finish_struct(self) -> DoneSerializer {
        let mut mesg = self.mesg;
        mesg.signature.push(b')');
        DoneSerializer { mesg }
    }

    pub(super) fn finish_kv_pair(self) -> DoneSerializer {
        let mut mesg = self.mesg;
        mesg.signature.push(b'}');
        DoneSerializer { mesg }
    }
}

pub(super) struct PendingStructSerializer;

impl PendingStructSerializer {
    pub(super) fn finish_item(self, item: DoneSerializer) -> ReadyStructSerializer {
        ReadyStructSerializer {
            mesg: item.extract(),
        }
    }
}

pub(super) struct ReadyArraySerializer {
    prev: PendingMessage,

    // contents has all serialized data from inside the array
    // the signature is to be kept empty
    contents: PendingMessage,
    item_sig: Vec<u8>,
}

impl ReadyArraySerializer {
    fn new(mesg: PendingMessage, item_sig: Vec<u8>) -> Result<Self> {
        let first = *item_sig
            .first()
            .ok_or_else(|| Error::mismatch(b"a", "array without element type"))?;
        let mut contents = PendingMessage::new();
        contents.builder.align(alignment_of(first)?);
        Ok(Self {
            prev: mesg,
            contents,
            item_sig,
        })
    }

    pub(super) fn start_item(self) -> (PendingArraySerializer, ReadySerializer) {
        let pending = PendingArraySerializer {
            prev: self.prev,
            item_sig: self.item_sig,
        };
        let ready = ReadySerializer {
            mesg: self.contents,
        };
        (pending, ready)
    }

    pub(super) fn finish_array(self) -> Result<DoneSerializer> {
        let Self {
            prev: mut mesg,
            contents,
            mut item_sig,
        } = self;

        let item_alignment = alignment_of(item_sig[0])?;
        mesg.signature.push(b'a');
        mesg.signature.append(&mut item_sig);

        mesg.builder.start_length(item_alignment);
        mesg.builder.append_data(&contents.builder);
        mesg.builder.finish_length();

        Ok(DoneSerializer { mesg })
    }
}

pub(super) struct PendingArraySerializer {
    prev: PendingMessage,
    item_sig: Vec<u8>,
}

impl PendingArraySerializer {
    pub(super) fn finish_item(self, item: DoneSerializer) -> Result<ReadyArraySerializer> {
        let mut children_mesg = item.extract();
        let sig = take(&mut children_mesg.signature);
        if self.item_sig != sig {
            return Err(Error::mismatch(
                &self.item_sig,
                String::from_utf8_lossy(&sig).into_owned(),
            ));
        }
        Ok(ReadyArraySerializer {
            prev: self.prev,
            contents: children_mesg,
            item_sig: self.item_sig,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::ReadySerializer;
    use crate::error::Result;

    #[test]
    fn serialize_int() -> Result<()> {
        let i = 37i32;
        let serializer = ReadySerializer::new();
        let serializer = serializer.serialize_primitive(&i)?;
        let body = serializer.complete()?;

        assert_eq!(body.data(), &[37, 0, 0, 0], "i32 serialized incorrectly");
        assert_eq!(body.signature(), "i");
        Ok(())
    }

    #[test]
    fn serialize_variant_int() -> Result<()> {
        let i = 37i32;
        let serializer = ReadySerializer::new();
        let (serializer, sub_serializer) = serializer.start_variant();
        let sub_serializer = sub_serializer.serialize_primitive(&i)?;
        let serializer = serializer.finish_variant(sub_serializer);
        let body = serializer.complete()?;

        assert_eq!(
            body.data(),
            &[1, 105, 0, 0, 37, 0, 0, 0],
            "variant of i32 serialized incorrectly"
        );
        assert_eq!(body.signature(), "v");
        Ok(())
    }

    #[test]
    fn serialize_variant_farray() -> Result<()> {
        let top_level_serializer = ReadySerializer::new();
        let (top_level_serializer, serializer) = top_level_serializer.start_variant();
        let mut serializer = serializer.start_array(b"d".to_vec())?;

        for f in &[1.0f64, 2.0, 3.0, 4.0] {
            let (pending, sub_serializer) = serializer.start_item();
            let sub_serializer = sub_serializer.serialize_primitive(f)?;
            serializer = pending.finish_item(sub_serializer)?;
        }

        let serializer = serializer.finish_array()?;
        let top_level_serializer = top_level_serializer.finish_variant(serializer);
        let body = top_level_serializer.complete()?;

        assert_eq!(
            body.data(),
            &[
                2, 97, 100, 0, 32, 0, 0, 0, 0, 0, 0, 0, 0, 0, 240, 63, 0, 0, 0, 0, 0, 0, 0, 64, 0,
                0, 0, 0, 0, 0, 8, 64, 0, 0, 0, 0, 0, 0, 16, 64,
            ][..],
            "array in variant serialized incorrectly"
        );
        assert_eq!(body.signature(), "v");
        Ok(())
    }

    #[test]
    fn serialize_intary() -> Result<()> {
        let mut serializer = ReadySerializer::new().start_array(b"i".to_vec())?;

        for i in 1..=4i32 {
            let (pending, sub_serializer) = serializer.start_item();
            let sub_serializer = sub_serializer.serialize_primitive(&i)?;
            serializer = pending.finish_item(sub_serializer)?;
        }

        let body = serializer.finish_array()?.complete()?;

        assert_eq!(
            body.data(),
            &[16u8, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0, 4, 0, 0, 0][..],
            "array serialized incorrectly"
        );
        assert_eq!(body.signature(), "ai");
        Ok(())
    }

    #[test]
    fn array_rejects_foreign_items() -> Result<()> {
        let serializer = ReadySerializer::new().start_array(b"i".to_vec())?;
        let (pending, sub_serializer) = serializer.start_item();
        let sub_serializer = sub_serializer.serialize_primitive(&"nope")?;
        assert!(pending.finish_item(sub_serializer).is_err());
        Ok(())
    }

    #[test]
    fn serialize_struct() -> Result<()> {
        let serializer = ReadySerializer::new();
        let serializer = serializer.start_struct();

        let (serializer, sub_serializer) = serializer.start_item();
        let sub_serializer = sub_serializer.serialize_primitive(&"Hi")?;
        let serializer = serializer.finish_item(sub_serializer);

        let (serializer, sub_serializer) = serializer.start_item();
        let sub_serializer = sub_serializer.serialize_primitive(&0.2f64)?;
        let serializer = serializer.finish_item(sub_serializer);

        let (serializer, sub_serializer) = serializer.start_item();

        let sub_serializer = sub_serializer.start_struct();

        let (sub_serializer, sub_sub_serializer) = sub_serializer.start_item();
        let sub_sub_serializer = sub_sub_serializer.serialize_primitive(&"Hello")?;
        let sub_serializer = sub_serializer.finish_item(sub_sub_serializer);

        let (sub_serializer, sub_sub_serializer) = sub_serializer.start_item();
        let sub_sub_serializer = sub_sub_serializer.serialize_primitive(&8.3f64)?;
        let sub_serializer = sub_serializer.finish_item(sub_sub_serializer);

        let sub_serializer = sub_serializer.finish_struct();
        let serializer = serializer.finish_item(sub_serializer);

        let serializer = serializer.finish_struct();
        let body = serializer.complete()?;

        assert_eq!(
            body.data(),
            &[
                2u8, 0u8, 0u8, 0u8, 72u8, 105u8, 0u8, 0u8, 154u8, 153u8, 153u8, 153u8, 153u8,
                153u8, 201u8, 63u8, 5u8, 0u8, 0u8, 0u8, 72u8, 101u8, 108u8, 108u8, 111u8, 0u8, 0u8,
                0u8, 0u8, 0u8, 0u8, 0u8, 154u8, 153u8, 153u8, 153u8, 153u8, 153u8, 32u8, 64u8,
            ][..],
            "struct serialized incorrectly"
        );
        assert_eq!(body.signature(), "(sd(sd))");
        Ok(())
    }
}
