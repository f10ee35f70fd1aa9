use crate::signature::Signature;

/// Byte order of a message, as flagged in the first byte of its frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    pub(crate) fn from_flag(flag: u8) -> Option<Self> {
        match flag {
            b'l' => Some(Endian::Little),
            b'B' => Some(Endian::Big),
            _ => None,
        }
    }

    pub(crate) fn flag(self) -> u8 {
        match self {
            Endian::Little => b'l',
            Endian::Big => b'B',
        }
    }
}

/// An encoded message body: the signature and the bytes it describes.
#[derive(Clone, Debug, PartialEq)]
pub struct Body {
    signature: Signature,
    data: Vec<u8>,
    endian: Endian,
}

impl Body {
    pub fn new(signature: Signature, data: Vec<u8>) -> Self {
        Self::with_endian(signature, data, Endian::Little)
    }

    pub fn with_endian(signature: Signature, data: Vec<u8>, endian: Endian) -> Self {
        Self {
            signature,
            data,
            endian,
        }
    }

    pub fn empty() -> Self {
        Self::new(Signature::default(), Vec::new())
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn is_empty(&self) -> bool {
        self.signature.is_empty()
    }
}
