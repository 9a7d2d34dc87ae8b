// Copyright (c) 2021 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::convert::TryFrom;
use std::fmt;

use crate::{
    ByteArray, DecodeError, DecodePacket, EncodeError, EncodePacket, QoS, VarInt, VarIntError,
};

/// Common interface of control packets.
pub trait Packet: fmt::Debug {
    /// Get packet type.
    fn packet_type(&self) -> PacketType;

    /// Get byte length in packet.
    ///
    /// # Errors
    ///
    /// Returns error if packet size is invalid.
    fn bytes(&self) -> Result<usize, VarIntError>;
}

/// Control packet types available in MQTT 3.1.1.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PacketType {
    /// Request to connect to broker
    #[default]
    Connect,

    /// Broker reply to connect request
    ConnectAck,

    /// Publish message
    Publish { dup: bool, qos: QoS, retain: bool },

    /// Publish acknowledgement
    PublishAck,

    /// Publish received
    PublishReceived,

    /// Publish release
    PublishRelease,

    /// Publish complete
    PublishComplete,

    /// Client subscribe request
    Subscribe,

    /// Subscribe acknowledgement
    SubscribeAck,

    /// Client ping request
    PingRequest,

    /// Server ping response
    PingResponse,

    /// Client is disconnecting
    Disconnect,
}

impl PacketType {
    /// Get byte length used in packet.
    #[must_use]
    #[inline]
    pub const fn bytes() -> usize {
        1
    }
}

impl From<PacketType> for u8 {
    fn from(packet_type: PacketType) -> Self {
        let type_bits = match packet_type {
            PacketType::Connect => 1,
            PacketType::ConnectAck => 2,
            PacketType::Publish { .. } => 3,
            PacketType::PublishAck => 4,
            PacketType::PublishReceived => 5,
            PacketType::PublishRelease => 6,
            PacketType::PublishComplete => 7,
            PacketType::Subscribe => 8,
            PacketType::SubscribeAck => 9,
            PacketType::PingRequest => 12,
            PacketType::PingResponse => 13,
            PacketType::Disconnect => 14,
        };

        let flags_bits = match packet_type {
            PacketType::Publish { dup, qos, retain } => {
                let dup = if dup { 0b0000_1000 } else { 0b0000_0000 };
                let qos = match qos {
                    QoS::AtMostOnce => 0b0000_0000,
                    QoS::AtLeastOnce => 0b0000_0010,
                    QoS::ExactOnce => 0b0000_0100,
                };
                let retain = u8::from(retain);
                dup | qos | retain
            }
            // Bits 3,2,1 and 0 of the fixed header in the PUBREL and SUBSCRIBE
            // Control Packets are reserved and MUST be set to 0,0,1 and 0
            // respectively [MQTT-3.6.1-1], [MQTT-3.8.1-1].
            PacketType::PublishRelease | PacketType::Subscribe => 0b0000_0010,
            _ => 0b0000_0000,
        };
        (type_bits << 4) | flags_bits
    }
}

impl TryFrom<u8> for PacketType {
    type Error = DecodeError;

    /// Parse packet type from the first byte of a fixed header.
    ///
    /// Where a flag bit is marked as "Reserved", it MUST be set to the value
    /// listed for that packet type [MQTT-2.2.2-1]. If invalid flags are
    /// received, the receiver MUST close the Network Connection [MQTT-2.2.2-2].
    fn try_from(v: u8) -> Result<Self, Self::Error> {
        let type_bits = (v & 0b1111_0000) >> 4;
        let flags = v & 0b0000_1111;

        if type_bits == 3 {
            let dup = (flags & 0b0000_1000) == 0b0000_1000;
            let retain = (flags & 0b0000_0001) == 0b0000_0001;
            let qos = match flags & 0b0000_0110 {
                0b0000_0000 => QoS::AtMostOnce,
                0b0000_0010 => QoS::AtLeastOnce,
                0b0000_0100 => QoS::ExactOnce,

                _ => return Err(DecodeError::InvalidPacketFlags),
            };
            return Ok(Self::Publish { dup, qos, retain });
        }

        let (packet_type, expected_flags) = match type_bits {
            1 => (Self::Connect, 0b0000_0000),
            2 => (Self::ConnectAck, 0b0000_0000),
            4 => (Self::PublishAck, 0b0000_0000),
            5 => (Self::PublishReceived, 0b0000_0000),
            6 => (Self::PublishRelease, 0b0000_0010),
            7 => (Self::PublishComplete, 0b0000_0000),
            8 => (Self::Subscribe, 0b0000_0010),
            9 => (Self::SubscribeAck, 0b0000_0000),
            12 => (Self::PingRequest, 0b0000_0000),
            13 => (Self::PingResponse, 0b0000_0000),
            14 => (Self::Disconnect, 0b0000_0000),
            t => {
                log::error!("header: Invalid packet type bits: {t:#b}");
                return Err(DecodeError::InvalidPacketType);
            }
        };
        if flags != expected_flags {
            log::error!("header: Got packet flags {flags:#b} in {packet_type:?}");
            return Err(DecodeError::InvalidPacketFlags);
        }
        Ok(packet_type)
    }
}

/// Fixed header part of a mqtt control packet. It consists of at least two bytes.
///
/// ```txt
///  7 6 5 4 3 2 1 0
/// +-------+-------+
/// | Type  | Flags |
/// +-------+-------+
/// | Remaining Len |
/// +-------+-------+
/// ```
#[allow(clippy::module_name_repetitions)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FixedHeader {
    packet_type: PacketType,

    /// `Remaining Length` uses the variable length encoding method. The 7th
    /// bit in a byte is used to indicate that more bytes follow, and at most
    /// 4 bytes are used, giving a maximum value of `0xFF 0xFF 0xFF 0x7F`.
    remaining_length: VarInt,
}

impl FixedHeader {
    /// Create a new fixed header with `packet_type` and `remaining_length`.
    ///
    /// # Errors
    ///
    /// Returns error if `remaining_length` is invalid.
    pub fn new(packet_type: PacketType, remaining_length: usize) -> Result<Self, VarIntError> {
        let remaining_length = VarInt::from(remaining_length)?;
        Ok(Self {
            packet_type,
            remaining_length,
        })
    }

    #[must_use]
    pub const fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    #[must_use]
    pub const fn remaining_length(&self) -> usize {
        self.remaining_length.value()
    }

    /// Get byte length in packet.
    #[must_use]
    pub const fn bytes(&self) -> usize {
        PacketType::bytes() + self.remaining_length.bytes()
    }
}

impl DecodePacket for FixedHeader {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let flags = ba.read_byte()?;

        let packet_type = PacketType::try_from(flags)?;
        let remaining_length = VarInt::decode(ba)?;

        Ok(Self {
            packet_type,
            remaining_length,
        })
    }
}

impl EncodePacket for FixedHeader {
    fn encode(&self, v: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let packet_type: u8 = self.packet_type.into();
        v.push(packet_type);

        self.remaining_length.encode(v)?;
        Ok(PacketType::bytes() + self.remaining_length.bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        let mut buf = Vec::new();
        let fixed_header = FixedHeader::new(PacketType::PingRequest, 0).unwrap();
        let ret = fixed_header.encode(&mut buf);
        assert_eq!(ret.unwrap(), 2);
        assert_eq!(&buf, &[0xc0, 0x00]);
    }

    #[test]
    fn test_decode() {
        let buf = vec![
            0x30, 0x13, 0x00, 0x05, 0x68, 0x65, 0x6c, 0x6c, 0x6f, 0x48, 0x65, 0x6c, 0x6c, 0x6f,
            0x2c, 0x20, 0x77, 0x6f, 0x72,
        ];
        let mut ba = ByteArray::new(&buf);
        let fixed_header = FixedHeader::decode(&mut ba).unwrap();
        assert_eq!(
            fixed_header.packet_type(),
            PacketType::Publish {
                dup: false,
                qos: QoS::AtMostOnce,
                retain: false
            }
        );
        assert_eq!(fixed_header.remaining_length(), 19);
    }

    #[test]
    fn test_decode_rejects_invalid_flags() {
        // Subscribe with reserved flags cleared is malformed.
        let buf = [0x80, 0x00];
        let mut ba = ByteArray::new(&buf);
        assert_eq!(
            FixedHeader::decode(&mut ba),
            Err(DecodeError::InvalidPacketFlags)
        );
    }

    #[test]
    fn test_two_byte_remaining_length() {
        // A 200 byte payload plus topic pushes remaining length over 127,
        // so the encoded header takes two length bytes.
        let fixed_header = FixedHeader::new(
            PacketType::Publish {
                dup: false,
                qos: QoS::AtMostOnce,
                retain: false,
            },
            204,
        )
        .unwrap();
        let mut buf = Vec::new();
        fixed_header.encode(&mut buf).unwrap();
        assert_eq!(&buf, &[0x30, 0xcc, 0x01]);
    }
}
