// Copyright (c) 2020 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use crate::utils::validate_client_id;
use crate::{
    BinaryData, ConnectFlags, EncodeError, EncodePacket, FixedHeader, Packet, PacketType,
    ProtocolLevel, PubTopic, QoS, StringData, U16Data, VarIntError,
};

/// Will message stored on the Server side and published when the client
/// connection closes without a Disconnect packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Will {
    topic: PubTopic,
    message: BinaryData,
    qos: QoS,
    retain: bool,
}

impl Will {
    /// Create a new will object.
    ///
    /// # Errors
    ///
    /// Returns error if `topic` or `message` is invalid.
    pub fn new(topic: &str, message: &[u8], qos: QoS, retain: bool) -> Result<Self, EncodeError> {
        let topic = PubTopic::new(topic)?;
        let message = BinaryData::from_slice(message)?;
        Ok(Self {
            topic,
            message,
            qos,
            retain,
        })
    }

    fn bytes(&self) -> usize {
        self.topic.bytes() + self.message.bytes()
    }
}

/// `ConnectPacket` is the first packet sent to the Server after a network
/// connection is established.
///
/// Basic struct of `ConnectPacket` is as below:
/// ```txt
///  7                          0
/// +----------------------------+
/// | Fixed header               |
/// |                            |
/// +----------------------------+
/// | Protocol name              |
/// |                            |
/// +----------------------------+
/// | Protocol level             |
/// +----------------------------+
/// | Connect flags              |
/// +----------------------------+
/// | Keep alive                 |
/// |                            |
/// +----------------------------+
/// | Client id                  |
/// |                            |
/// +----------------------------+
/// | Will topic, Will message   |
/// | Username, Password         |
/// +----------------------------+
/// ```
///
/// The will/username/password payload fields are present only when the
/// matching connect flag is set.
#[allow(clippy::module_name_repetitions)]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConnectPacket {
    protocol_level: ProtocolLevel,

    /// Time interval between two packets in seconds.
    ///
    /// The Client must send a PingRequest packet before exceeding this
    /// interval. If this value is not zero and the interval passes with no
    /// packet, the Server will disconnect the network.
    keep_alive: U16Data,

    clean_session: bool,

    /// `client_id` identifies the session on the Server side.
    ///
    /// If the Client supplies a zero-byte ClientId, the Client MUST also set
    /// CleanSession to 1 [MQTT-3.1.3-7].
    client_id: StringData,

    will: Option<Will>,

    username: Option<StringData>,

    password: Option<BinaryData>,
}

impl ConnectPacket {
    /// Create a new connect packet with `client_id`.
    ///
    /// # Errors
    ///
    /// Returns error if `client_id` is invalid.
    pub fn new(client_id: &str) -> Result<Self, EncodeError> {
        validate_client_id(client_id)?;
        let client_id = StringData::from(client_id)?;
        Ok(Self {
            client_id,
            ..Self::default()
        })
    }

    /// Get current client id.
    #[must_use]
    pub fn client_id(&self) -> &str {
        self.client_id.as_ref()
    }

    /// Get current protocol level.
    #[must_use]
    #[inline]
    pub const fn protocol_level(&self) -> ProtocolLevel {
        self.protocol_level
    }

    /// Update keep alive value in seconds.
    pub fn set_keep_alive(&mut self, keep_alive: u16) -> &mut Self {
        self.keep_alive = U16Data::new(keep_alive);
        self
    }

    /// Get current keep alive value.
    #[must_use]
    #[inline]
    pub const fn keep_alive(&self) -> u16 {
        self.keep_alive.value()
    }

    /// Update clean-session flag.
    pub fn set_clean_session(&mut self, clean_session: bool) -> &mut Self {
        self.clean_session = clean_session;
        self
    }

    /// Get current clean-session flag.
    #[must_use]
    #[inline]
    pub const fn clean_session(&self) -> bool {
        self.clean_session
    }

    /// Update will message.
    pub fn set_will(&mut self, will: Option<Will>) -> &mut Self {
        self.will = will;
        self
    }

    /// Update username value.
    ///
    /// # Errors
    ///
    /// Returns error if `username` contains invalid chars or is too long.
    pub fn set_username(&mut self, username: &str) -> Result<&mut Self, EncodeError> {
        self.username = Some(StringData::from(username)?);
        Ok(self)
    }

    /// Update password value.
    ///
    /// # Errors
    ///
    /// Returns error if `password` is too long.
    pub fn set_password(&mut self, password: &[u8]) -> Result<&mut Self, EncodeError> {
        self.password = Some(BinaryData::from_slice(password)?);
        Ok(self)
    }

    fn connect_flags(&self) -> ConnectFlags {
        let mut flags = ConnectFlags::default();
        flags
            .set_has_username(self.username.is_some())
            .set_has_password(self.password.is_some())
            .set_clean_session(self.clean_session);
        if let Some(will) = &self.will {
            flags
                .set_will(true)
                .set_will_qos(will.qos)
                .set_will_retain(will.retain);
        }
        flags
    }

    fn protocol_name(&self) -> Result<StringData, EncodeError> {
        StringData::from(self.protocol_level.protocol_name()).map_err(EncodeError::from)
    }

    fn get_fixed_header(&self) -> Result<FixedHeader, VarIntError> {
        let protocol_name_bytes = 2 + self.protocol_level.protocol_name().len();
        let mut remaining_length = protocol_name_bytes
            + ProtocolLevel::bytes()
            + ConnectFlags::bytes()
            + U16Data::bytes()
            + self.client_id.bytes();

        if let Some(will) = &self.will {
            remaining_length += will.bytes();
        }
        if let Some(username) = &self.username {
            remaining_length += username.bytes();
        }
        if let Some(password) = &self.password {
            remaining_length += password.bytes();
        }
        FixedHeader::new(PacketType::Connect, remaining_length)
    }
}

impl EncodePacket for ConnectPacket {
    fn encode(&self, v: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let old_len = v.len();

        let fixed_header = self.get_fixed_header()?;
        fixed_header.encode(v)?;

        // Write variable header
        self.protocol_name()?.encode(v)?;
        self.protocol_level.encode(v)?;
        self.connect_flags().encode(v)?;
        self.keep_alive.encode(v)?;

        // Write payload
        self.client_id.encode(v)?;
        if let Some(will) = &self.will {
            will.topic.encode(v)?;
            will.message.encode(v)?;
        }
        if let Some(username) = &self.username {
            username.encode(v)?;
        }
        if let Some(password) = &self.password {
            password.encode(v)?;
        }

        Ok(v.len() - old_len)
    }
}

impl Packet for ConnectPacket {
    fn packet_type(&self) -> PacketType {
        PacketType::Connect
    }

    fn bytes(&self) -> Result<usize, VarIntError> {
        let fixed_header = self.get_fixed_header()?;
        Ok(fixed_header.bytes() + fixed_header.remaining_length())
    }
}
