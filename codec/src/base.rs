// Copyright (c) 2020 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use byteorder::{BigEndian, WriteBytesExt};
use std::cmp;
use std::convert::TryFrom;
use std::fmt;

use crate::{ByteArray, DecodeError, EncodeError};

/// Convert packet fields into a byte stream in network order.
pub trait EncodePacket {
    /// Encode object into `buf`.
    ///
    /// Returns number of bytes written to `buf`.
    ///
    /// # Errors
    ///
    /// Returns error if object contains invalid data.
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError>;
}

/// Parse packet fields from a byte stream in network order.
pub trait DecodePacket: Sized {
    /// Decode object from `ba`.
    ///
    /// # Errors
    ///
    /// Returns error if byte stream does not contain a valid object.
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError>;
}

/// Quality of service level of Publish packets.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QoS {
    /// At most once delivery.
    #[default]
    AtMostOnce = 0,

    /// At least once delivery.
    ///
    /// Sender stores the packet until a `PublishAck` packet is received.
    AtLeastOnce = 1,

    /// Exactly once delivery.
    ///
    /// Acknowledged in the `PublishReceived`/`PublishRelease`/`PublishComplete`
    /// exchange.
    ExactOnce = 2,
}

impl QoS {
    /// Get byte length used in packet.
    #[must_use]
    #[inline]
    pub const fn bytes() -> usize {
        1
    }
}

impl TryFrom<u8> for QoS {
    type Error = DecodeError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::AtMostOnce),
            1 => Ok(Self::AtLeastOnce),
            2 => Ok(Self::ExactOnce),

            _ => Err(DecodeError::InvalidQoS),
        }
    }
}

/// Packet identifier correlates an outbound packet with its acknowledgement.
///
/// SUBSCRIBE, UNSUBSCRIBE, and PUBLISH (in cases where QoS > 0) Control Packets
/// MUST contain a non-zero 16-bit Packet Identifier [MQTT-2.3.1-1].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PacketId(u16);

impl PacketId {
    /// Create a new packet id object.
    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    /// Get inner u16 value.
    #[must_use]
    pub const fn value(&self) -> u16 {
        self.0
    }

    /// Get byte length used in packet.
    #[must_use]
    #[inline]
    pub const fn bytes() -> usize {
        2
    }
}

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl cmp::PartialEq<u16> for PacketId {
    fn eq(&self, value: &u16) -> bool {
        self.0 == *value
    }
}

impl DecodePacket for PacketId {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let value = ba.read_u16()?;
        Ok(Self(value))
    }
}

impl EncodePacket for PacketId {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        buf.write_u16::<BigEndian>(self.0)?;
        Ok(Self::bytes())
    }
}
