//! Demo wire protocol — the headers and trailer the pipeline layers push.
//!
//! All types are #[repr(C, packed)] with zerocopy derives so encoding is a
//! byte copy and decoding a bounds-checked read. Multi-byte fields are
//! network byte order.

use bytes::{Buf, Bytes, BytesMut};
use static_assertions::assert_eq_size;
use zerocopy::byteorder::network_endian::{U16, U32};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

use strata_core::{ChunkType, DecodeError, FieldSet, SerializerRegistry};

pub type MacAddress = [u8; 6];

pub const BROADCAST: MacAddress = [0xff; 6];

/// Local experimental EtherType.
pub const ETHER_TYPE_ECHO: u16 = 0x88b5;

pub const ECHO_REPLY: u8 = 0;
pub const ECHO_REQUEST: u8 = 8;

/// Locally administered address for sender or receiver `id`.
pub fn station_mac(id: u32) -> MacAddress {
    let id = id.to_be_bytes();
    [0x02, 0x00, id[0], id[1], id[2], id[3]]
}

// ── Link Header ──────────────────────────────────────────────────────────────

/// Wire size: 14 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct LinkHeader {
    pub destination: MacAddress,
    pub source: MacAddress,
    pub ether_type: U16,
}

assert_eq_size!(LinkHeader, [u8; 14]);

impl LinkHeader {
    pub fn new(destination: MacAddress, source: MacAddress) -> Self {
        Self {
            destination,
            source,
            ether_type: U16::new(ETHER_TYPE_ECHO),
        }
    }

    /// Whether a station with address `mac` should accept this frame.
    pub fn accepts(&self, mac: &MacAddress) -> bool {
        let destination = self.destination;
        destination == BROADCAST || destination == *mac
    }

    fn validate(&self) -> Result<(), DecodeError> {
        let ether_type = self.ether_type.get();
        if ether_type != ETHER_TYPE_ECHO {
            return Err(DecodeError::InvalidField {
                field: "ether_type",
                value: u64::from(ether_type),
            });
        }
        Ok(())
    }
}

// ── Echo Header ──────────────────────────────────────────────────────────────

/// Wire size: 8 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct EchoHeader {
    /// ECHO_REQUEST or ECHO_REPLY.
    pub kind: u8,
    /// Always zero.
    pub code: u8,
    pub identifier: U16,
    pub sequence: U32,
}

assert_eq_size!(EchoHeader, [u8; 8]);

impl EchoHeader {
    pub fn request(identifier: u16, sequence: u32) -> Self {
        Self {
            kind: ECHO_REQUEST,
            code: 0,
            identifier: U16::new(identifier),
            sequence: U32::new(sequence),
        }
    }

    fn validate(&self) -> Result<(), DecodeError> {
        if self.kind != ECHO_REQUEST && self.kind != ECHO_REPLY {
            return Err(DecodeError::InvalidField {
                field: "kind",
                value: u64::from(self.kind),
            });
        }
        if self.code != 0 {
            return Err(DecodeError::InvalidField {
                field: "code",
                value: u64::from(self.code),
            });
        }
        Ok(())
    }
}

// ── Frame Check ──────────────────────────────────────────────────────────────

/// Trailer carrying the first four bytes of the BLAKE3 hash of everything
/// before it. Wire size: 4 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct FrameCheck {
    pub digest: [u8; 4],
}

assert_eq_size!(FrameCheck, [u8; 4]);

impl FrameCheck {
    pub fn over(body: &[u8]) -> Self {
        let hash = blake3::hash(body);
        let mut digest = [0u8; 4];
        digest.copy_from_slice(&hash.as_bytes()[..4]);
        Self { digest }
    }

    pub fn verifies(&self, body: &[u8]) -> bool {
        Self::over(body).digest == self.digest
    }

    fn validate(&self) -> Result<(), DecodeError> {
        Ok(())
    }
}

// ── Field Set Glue ───────────────────────────────────────────────────────────

macro_rules! wire_field_set {
    ($ty:ty, $name:literal) => {
        impl FieldSet for $ty {
            const TYPE: ChunkType = ChunkType::new($name);
            const FIXED_LENGTH: Option<u64> = Some(std::mem::size_of::<$ty>() as u64);

            fn byte_length(&self) -> u64 {
                std::mem::size_of::<$ty>() as u64
            }

            fn encode(&self, out: &mut BytesMut) {
                out.extend_from_slice(self.as_bytes());
            }

            fn decode(input: &mut Bytes) -> Result<Self, DecodeError> {
                let size = std::mem::size_of::<$ty>();
                DecodeError::check_len(input.len(), size)?;
                let value = <$ty>::read_from_prefix(&input[..]).ok_or_else(|| {
                    DecodeError::Malformed(format!("{} does not fit its layout", $name))
                })?;
                value.validate()?;
                input.advance(size);
                Ok(value)
            }
        }
    };
}

wire_field_set!(LinkHeader, "link");
wire_field_set!(EchoHeader, "echo");
wire_field_set!(FrameCheck, "frame_check");

/// Registry with the built-ins plus every type in this module.
pub fn registry() -> strata_core::Result<SerializerRegistry> {
    let mut registry = SerializerRegistry::new();
    registry.register_fields::<LinkHeader>()?;
    registry.register_fields::<EchoHeader>()?;
    registry.register_fields::<FrameCheck>()?;
    Ok(registry)
}
