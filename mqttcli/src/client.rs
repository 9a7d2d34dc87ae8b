// Copyright (c) 2022 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use codec::{
    ByteArray, ConnectAckPacket, ConnectPacket, ConnectReturnCode, DecodePacket, DisconnectPacket,
    EncodePacket, FixedHeader, Packet, PacketType, PingRequestPacket, PublishAckPacket,
    PublishCompletePacket, PublishPacket, PublishReceivedPacket, PublishReleasePacket, QoS,
    SubscribeAckPacket, SubscribePacket, Will,
};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::time::Duration;

use crate::connect_options::ConnectOptions;
use crate::error::{Error, ErrorKind};
use crate::message::PublishMessage;
use crate::reader::FrameReader;
use crate::session::{ClientStatus, Session};
use crate::transport::Transport;

/// Blocking MQTT 3.1.1 client.
///
/// Every operation is synchronous call/response: the client sends a packet,
/// blocks reading the expected acknowledgement, validates it and returns.
/// Only one operation may be in flight at a time; the client is not
/// reentrant and keep-alive pings must be interleaved by the caller, e.g.
/// from the receive loop when a read deadline expires.
pub struct Client<T: Transport> {
    options: ConnectOptions,
    session: Session,
    reader: FrameReader,
    transport: T,
}

impl<T: Transport> Client<T> {
    /// Create a new client object over an established transport.
    ///
    /// No packet is sent to the server before calling [`Self::connect`].
    pub fn new(options: ConnectOptions, transport: T) -> Self {
        let session = Session::new(options.sequence());
        let reader = FrameReader::new(options.max_file_msg_size());
        Self {
            options,
            session,
            reader,
            transport,
        }
    }

    /// Get connection options.
    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }

    /// Get current connection status.
    pub fn status(&self) -> ClientStatus {
        self.session.status()
    }

    /// Connect to server.
    ///
    /// # Errors
    ///
    /// Returns an error carrying the server's refusal code if the connection
    /// is rejected, or a transport error kind if the handshake breaks down.
    /// A `SessionPresent` error is a warning: the connection is established
    /// and the caller may keep using it.
    pub fn connect(&mut self) -> Result<(), Error> {
        if self.session.status() != ClientStatus::Disconnected {
            return Err(Error::from_string(
                ErrorKind::InvalidState,
                format!("Connect in status {:?}", self.session.status()),
            ));
        }
        // If the client supplies a zero-byte client id, clean session must
        // be set [MQTT-3.1.3-7].
        if self.options.client_id().is_empty() && !self.options.clean_session() {
            return Err(Error::new(
                ErrorKind::EncodeError,
                "Empty client id requires clean session",
            ));
        }

        let mut packet = ConnectPacket::new(self.options.client_id())?;
        packet
            .set_keep_alive(self.options.keep_alive())
            .set_clean_session(self.options.clean_session());
        if let Some(auth) = self.options.auth() {
            packet.set_username(&auth.username)?;
            if let Some(password) = &auth.password {
                packet.set_password(password)?;
            }
        }
        if let Some(will) = self.options.will() {
            packet.set_will(Some(Will::new(
                &will.topic,
                &will.message,
                will.qos,
                will.retain,
            )?));
        }

        self.transport.set_read_timeout(self.options.read_timeout())?;
        self.session.set_status(ClientStatus::Connecting);
        self.send_packet(&packet)?;

        let frame = self.read_frame(true)?;
        let mut ba = ByteArray::new(&frame);
        let fixed_header = self.decode_or_fail(FixedHeader::decode(&mut ba))?;
        if fixed_header.packet_type() != PacketType::ConnectAck {
            self.session.set_status(ClientStatus::Failed);
            return Err(Error::from_string(
                ErrorKind::UnexpectedPacket,
                format!(
                    "Expected ConnectAck packet, got: {:?}",
                    fixed_header.packet_type()
                ),
            ));
        }
        ba.reset_offset();
        let ack = self.decode_or_fail(ConnectAckPacket::decode(&mut ba))?;

        match ack.return_code() {
            ConnectReturnCode::Accepted => {
                self.session.set_status(ClientStatus::Connected);
                if ack.session_present() {
                    return Err(Error::new(
                        ErrorKind::SessionPresent,
                        "Server holds session state for this client id",
                    ));
                }
                Ok(())
            }
            ConnectReturnCode::UnacceptedProtocol => self.refuse(
                ErrorKind::UnacceptableProtocolVersion,
                "Unacceptable protocol version",
            ),
            ConnectReturnCode::IdentifierRejected => {
                self.refuse(ErrorKind::IdentifierRejected, "Client identifier rejected")
            }
            ConnectReturnCode::ServerUnavailable => {
                self.refuse(ErrorKind::ServerUnavailable, "Server unavailable")
            }
            ConnectReturnCode::MalformedUsernamePassword => {
                self.refuse(ErrorKind::BadCredentials, "Bad user name or password")
            }
            ConnectReturnCode::Unauthorized => {
                self.refuse(ErrorKind::NotAuthorized, "Not authorized")
            }
            ConnectReturnCode::Reserved => {
                self.refuse(ErrorKind::UnknownConnAck, "Unknown connect return code")
            }
        }
    }

    /// Publish a text message to `topic`.
    ///
    /// With QoS 1 the call blocks until the PublishAck packet arrives, with
    /// QoS 2 until the full PublishReceived/PublishRelease/PublishComplete
    /// exchange finishes.
    ///
    /// # Errors
    ///
    /// Returns `PayloadTooLarge` if `payload` exceeds the text message
    /// ceiling, or the matching handshake error kind on a bad acknowledgement.
    pub fn publish(
        &mut self,
        topic: &str,
        qos: QoS,
        retain: bool,
        payload: &[u8],
    ) -> Result<(), Error> {
        if payload.len() > self.options.max_txt_msg_size() {
            return Err(Error::from_string(
                ErrorKind::PayloadTooLarge,
                format!(
                    "Message length {} exceeds limit {}",
                    payload.len(),
                    self.options.max_txt_msg_size()
                ),
            ));
        }
        self.publish_payload(topic, qos, retain, payload)
    }

    /// Publish one caller-framed chunk of a larger transfer.
    ///
    /// Wire semantics are identical to [`Self::publish`]; this entry point
    /// exists so callers can stream large buffers without loading them whole.
    ///
    /// # Errors
    ///
    /// Returns `PayloadTooLarge` if `chunk` exceeds the chunk ceiling.
    pub fn publish_chunk(
        &mut self,
        topic: &str,
        qos: QoS,
        retain: bool,
        chunk: &[u8],
    ) -> Result<(), Error> {
        if chunk.len() > self.options.max_chunk_size() {
            return Err(Error::from_string(
                ErrorKind::PayloadTooLarge,
                format!(
                    "Chunk length {} exceeds limit {}",
                    chunk.len(),
                    self.options.max_chunk_size()
                ),
            ));
        }
        self.publish_payload(topic, qos, retain, chunk)
    }

    /// Publish the content of the file at `path` as one message.
    ///
    /// # Errors
    ///
    /// Returns `FileOpenError` if the file cannot be opened or read, and
    /// `PayloadTooLarge` if its length exceeds the file message ceiling.
    pub fn publish_file(
        &mut self,
        topic: &str,
        qos: QoS,
        retain: bool,
        path: &Path,
    ) -> Result<(), Error> {
        let mut file = File::open(path).map_err(|err| {
            Error::from_string(
                ErrorKind::FileOpenError,
                format!("Failed to open {}, err: {err}", path.display()),
            )
        })?;
        let file_len = file.seek(SeekFrom::End(0)).map_err(|err| {
            Error::from_string(
                ErrorKind::FileOpenError,
                format!("Failed to seek {}, err: {err}", path.display()),
            )
        })?;
        #[allow(clippy::cast_possible_truncation)]
        let file_len = file_len as usize;
        if file_len > self.options.max_file_msg_size() {
            return Err(Error::from_string(
                ErrorKind::PayloadTooLarge,
                format!(
                    "File length {file_len} exceeds limit {}",
                    self.options.max_file_msg_size()
                ),
            ));
        }
        file.rewind().map_err(|err| {
            Error::from_string(
                ErrorKind::FileOpenError,
                format!("Failed to rewind {}, err: {err}", path.display()),
            )
        })?;
        let mut payload = vec![0_u8; file_len];
        file.read_exact(&mut payload).map_err(|err| {
            Error::from_string(
                ErrorKind::FileOpenError,
                format!("Failed to read {}, err: {err}", path.display()),
            )
        })?;

        self.publish_payload(topic, qos, retain, &payload)
    }

    /// Subscribe to `topic` filter.
    ///
    /// The requested QoS is always 0: subscriptions deliver at most once
    /// regardless of the publisher's QoS. The granted QoS byte in the
    /// acknowledgement is accepted as is.
    ///
    /// # Errors
    ///
    /// Returns `SubAckUnexpected` or `SubAckPacketIdMismatch` on a bad
    /// acknowledgement.
    pub fn subscribe(&mut self, topic: &str) -> Result<(), Error> {
        self.session.ensure_connected()?;
        let packet_id = self.session.alloc_packet_id();
        let packet = SubscribePacket::new(topic, QoS::AtMostOnce, packet_id)?;
        self.send_packet(&packet)?;

        let frame = self.read_frame(true)?;
        let mut ba = ByteArray::new(&frame);
        let fixed_header = self.decode_or_fail(FixedHeader::decode(&mut ba))?;
        if fixed_header.packet_type() != PacketType::SubscribeAck {
            return Err(Error::from_string(
                ErrorKind::SubAckUnexpected,
                format!(
                    "Expected SubscribeAck packet, got: {:?}",
                    fixed_header.packet_type()
                ),
            ));
        }
        ba.reset_offset();
        let ack = self.decode_or_fail(SubscribeAckPacket::decode(&mut ba))?;
        if ack.packet_id() != self.session.last_packet_id() {
            return Err(Error::from_string(
                ErrorKind::SubAckPacketIdMismatch,
                format!(
                    "Expected packet id {}, got: {}",
                    self.session.last_packet_id(),
                    ack.packet_id()
                ),
            ));
        }
        log::debug!("Subscribed to `{topic}`, granted: {:?}", ack.acknowledgements());
        Ok(())
    }

    /// Send a PingRequest heartbeat to the server.
    ///
    /// The PingResponse arrives on the normal receive path and is discarded
    /// there; no reply is awaited here.
    ///
    /// # Errors
    ///
    /// Returns error if the session is not connected or the send fails.
    pub fn ping(&mut self) -> Result<(), Error> {
        self.session.ensure_connected()?;
        let packet = PingRequestPacket::new();
        self.send_packet(&packet)
    }

    /// Send a Disconnect packet to the server.
    ///
    /// No acknowledgement is defined for it; the caller closes the transport
    /// with [`Self::close`] afterwards.
    ///
    /// # Errors
    ///
    /// Returns error if the session is not connected or the send fails.
    pub fn disconnect(&mut self) -> Result<(), Error> {
        self.session.ensure_connected()?;
        self.session.set_status(ClientStatus::Disconnecting);
        let packet = DisconnectPacket::new();
        self.send_packet(&packet)?;
        self.session.set_status(ClientStatus::Disconnected);
        Ok(())
    }

    /// Shut down the transport.
    pub fn close(&mut self) {
        self.transport.close();
    }

    /// Update the receive timeout of the transport.
    ///
    /// # Errors
    ///
    /// Returns error if the timeout cannot be applied.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), Error> {
        self.transport.set_read_timeout(timeout)
    }

    /// Wait for the next inbound packet and deliver it.
    ///
    /// Publish packets are handed to the caller; every other packet type
    /// (PingResponse, stray acknowledgements) is discarded and yields
    /// `Ok(None)`. Inbound QoS 1/2 messages are not acknowledged.
    ///
    /// # Errors
    ///
    /// Returns `ReadTimeout` when the receive timeout expires; the session
    /// stays usable so the caller can send a heartbeat and keep reading.
    pub fn read_message(&mut self) -> Result<Option<PublishMessage>, Error> {
        self.session.ensure_connected()?;
        let frame = self.read_frame(false)?;
        let mut ba = ByteArray::new(&frame);
        let fixed_header = self.decode_or_fail(FixedHeader::decode(&mut ba))?;
        match fixed_header.packet_type() {
            PacketType::Publish { .. } => {
                ba.reset_offset();
                let packet = self.decode_or_fail(PublishPacket::decode(&mut ba))?;
                Ok(Some(PublishMessage {
                    topic: packet.topic().to_string(),
                    qos: packet.qos(),
                    payload: packet.message().to_vec(),
                }))
            }
            t => {
                log::debug!("Discarding {t:?} packet");
                Ok(None)
            }
        }
    }

    fn publish_payload(
        &mut self,
        topic: &str,
        qos: QoS,
        retain: bool,
        payload: &[u8],
    ) -> Result<(), Error> {
        self.session.ensure_connected()?;
        let mut packet = PublishPacket::new(topic, qos, payload)?;
        packet.set_retain(retain);
        if qos != QoS::AtMostOnce {
            packet.set_packet_id(self.session.alloc_packet_id());
        }
        self.send_packet(&packet)?;

        match qos {
            QoS::AtMostOnce => Ok(()),
            QoS::AtLeastOnce => self.wait_publish_ack(),
            QoS::ExactOnce => {
                self.wait_publish_received()?;
                let release = PublishReleasePacket::new(self.session.last_packet_id());
                self.send_packet(&release)?;
                self.wait_publish_complete()
            }
        }
    }

    fn wait_publish_ack(&mut self) -> Result<(), Error> {
        let frame = self.read_frame(true)?;
        let mut ba = ByteArray::new(&frame);
        let fixed_header = self.decode_or_fail(FixedHeader::decode(&mut ba))?;
        if fixed_header.packet_type() != PacketType::PublishAck {
            return Err(Error::from_string(
                ErrorKind::QoS1AckUnexpected,
                format!(
                    "Expected PublishAck packet, got: {:?}",
                    fixed_header.packet_type()
                ),
            ));
        }
        ba.reset_offset();
        let ack = self.decode_or_fail(PublishAckPacket::decode(&mut ba))?;
        if ack.packet_id() != self.session.last_packet_id() {
            return Err(Error::from_string(
                ErrorKind::QoS1PacketIdMismatch,
                format!(
                    "Expected packet id {}, got: {}",
                    self.session.last_packet_id(),
                    ack.packet_id()
                ),
            ));
        }
        Ok(())
    }

    fn wait_publish_received(&mut self) -> Result<(), Error> {
        let frame = self.read_frame(true)?;
        let mut ba = ByteArray::new(&frame);
        let fixed_header = self.decode_or_fail(FixedHeader::decode(&mut ba))?;
        if fixed_header.packet_type() != PacketType::PublishReceived {
            return Err(Error::from_string(
                ErrorKind::QoS2RecUnexpected,
                format!(
                    "Expected PublishReceived packet, got: {:?}",
                    fixed_header.packet_type()
                ),
            ));
        }
        ba.reset_offset();
        let ack = self.decode_or_fail(PublishReceivedPacket::decode(&mut ba))?;
        if ack.packet_id() != self.session.last_packet_id() {
            return Err(Error::from_string(
                ErrorKind::QoS2RecPacketIdMismatch,
                format!(
                    "Expected packet id {}, got: {}",
                    self.session.last_packet_id(),
                    ack.packet_id()
                ),
            ));
        }
        Ok(())
    }

    fn wait_publish_complete(&mut self) -> Result<(), Error> {
        let frame = self.read_frame(true)?;
        let mut ba = ByteArray::new(&frame);
        let fixed_header = self.decode_or_fail(FixedHeader::decode(&mut ba))?;
        if fixed_header.packet_type() != PacketType::PublishComplete {
            return Err(Error::from_string(
                ErrorKind::QoS2CompUnexpected,
                format!(
                    "Expected PublishComplete packet, got: {:?}",
                    fixed_header.packet_type()
                ),
            ));
        }
        ba.reset_offset();
        let ack = self.decode_or_fail(PublishCompletePacket::decode(&mut ba))?;
        if ack.packet_id() != self.session.last_packet_id() {
            return Err(Error::from_string(
                ErrorKind::QoS2CompPacketIdMismatch,
                format!(
                    "Expected packet id {}, got: {}",
                    self.session.last_packet_id(),
                    ack.packet_id()
                ),
            ));
        }
        Ok(())
    }

    fn send_packet<P: Packet + EncodePacket>(&mut self, packet: &P) -> Result<(), Error> {
        let mut buf = Vec::new();
        packet.encode(&mut buf)?;
        let n_sent = match self.transport.send(&buf) {
            Ok(n_sent) => n_sent,
            Err(err) => {
                self.session.set_status(ClientStatus::Failed);
                return Err(err);
            }
        };
        if n_sent < buf.len() {
            self.session.set_status(ClientStatus::Failed);
            return Err(Error::from_string(
                ErrorKind::SendShort,
                format!(
                    "Sent {n_sent} of {} bytes for {:?} packet",
                    buf.len(),
                    packet.packet_type()
                ),
            ));
        }
        log::debug!("Sent {:?} packet, {} bytes", packet.packet_type(), buf.len());
        Ok(())
    }

    /// Read one frame, classifying the session on failure.
    ///
    /// A read timeout is fatal while an acknowledgement is outstanding, but
    /// merely a deadline tick in the subscriber receive loop.
    fn read_frame(&mut self, fail_on_timeout: bool) -> Result<Vec<u8>, Error> {
        match self.reader.read_frame(&mut self.transport) {
            Ok(frame) => Ok(frame),
            Err(err) => {
                if err.kind() != ErrorKind::ReadTimeout || fail_on_timeout {
                    self.session.set_status(ClientStatus::Failed);
                }
                Err(err)
            }
        }
    }

    /// Record a server refusal and surface its error kind.
    fn refuse(&mut self, kind: ErrorKind, message: &str) -> Result<(), Error> {
        self.session.set_status(ClientStatus::Failed);
        Err(Error::new(kind, message))
    }

    fn decode_or_fail<V, E>(&mut self, result: Result<V, E>) -> Result<V, Error>
    where
        Error: From<E>,
    {
        result.map_err(|err| {
            self.session.set_status(ClientStatus::Failed);
            Error::from(err)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connect_options::WillOptions;
    use crate::transport::mock::MockTransport;

    const CONNACK_ACCEPTED: &[u8] = &[0x20, 0x02, 0x00, 0x00];

    fn test_options() -> ConnectOptions {
        let mut options = ConnectOptions::default();
        options
            .set_client_id("mqtt")
            .set_keep_alive(300)
            .set_clean_session(false);
        options
    }

    fn connected_client(incoming: &[u8]) -> Client<MockTransport> {
        let mut stream = CONNACK_ACCEPTED.to_vec();
        stream.extend_from_slice(incoming);
        let transport = MockTransport::new(&stream);
        let mut client = Client::new(test_options(), transport);
        client.connect().unwrap();
        client.transport.sent.clear();
        client
    }

    #[test]
    fn test_connect_sends_connect_packet() {
        let transport = MockTransport::new(CONNACK_ACCEPTED);
        let mut client = Client::new(test_options(), transport);
        client.connect().unwrap();
        assert_eq!(client.status(), ClientStatus::Connected);
        assert_eq!(
            &client.transport.sent,
            &[
                0x10, 0x10, 0x00, 0x04, 0x4d, 0x51, 0x54, 0x54, 0x04, 0x00, 0x01, 0x2c, 0x00,
                0x04, 0x6d, 0x71, 0x74, 0x74
            ]
        );
    }

    #[test]
    fn test_connect_with_will_sets_flags() {
        let mut options = test_options();
        options.set_will(Some(WillOptions {
            topic: "status/mqtt".to_string(),
            message: b"offline".to_vec(),
            qos: QoS::AtMostOnce,
            retain: true,
        }));
        let transport = MockTransport::new(CONNACK_ACCEPTED);
        let mut client = Client::new(options, transport);
        client.connect().unwrap();
        // will-retain | will flag
        assert_eq!(client.transport.sent[9], 0b0010_0100);
    }

    #[test]
    fn test_connect_bad_credentials() {
        let transport = MockTransport::new(&[0x20, 0x02, 0x00, 0x04]);
        let mut client = Client::new(test_options(), transport);
        let err = client.connect().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadCredentials);
        assert_eq!(client.status(), ClientStatus::Failed);
    }

    #[test]
    fn test_connect_session_present_is_warning() {
        let transport = MockTransport::new(&[0x20, 0x02, 0x01, 0x00]);
        let mut client = Client::new(test_options(), transport);
        let err = client.connect().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SessionPresent);
        assert!(err.is_warning());
        assert_eq!(client.status(), ClientStatus::Connected);
    }

    #[test]
    fn test_connect_unknown_return_code() {
        let transport = MockTransport::new(&[0x20, 0x02, 0x00, 0x17]);
        let mut client = Client::new(test_options(), transport);
        let err = client.connect().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownConnAck);
    }

    #[test]
    fn test_connect_unexpected_packet() {
        let transport = MockTransport::new(&[0x90, 0x03, 0x00, 0x01, 0x00]);
        let mut client = Client::new(test_options(), transport);
        let err = client.connect().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedPacket);
    }

    #[test]
    fn test_connect_empty_client_id_requires_clean_session() {
        let mut options = test_options();
        options.set_client_id("");
        let transport = MockTransport::new(CONNACK_ACCEPTED);
        let mut client = Client::new(options, transport);
        assert!(client.connect().is_err());
    }

    #[test]
    fn test_publish_qos0() {
        let mut client = connected_client(&[]);
        client.publish("a/b", QoS::AtMostOnce, false, b"hi").unwrap();
        assert_eq!(
            &client.transport.sent,
            &[0x30, 0x07, 0x00, 0x03, 0x61, 0x2f, 0x62, 0x68, 0x69]
        );
    }

    #[test]
    fn test_publish_qos1() {
        let mut client = connected_client(&[0x40, 0x02, 0x00, 0x01]);
        client.publish("t", QoS::AtLeastOnce, false, b"x").unwrap();
        assert_eq!(
            &client.transport.sent,
            &[0x32, 0x06, 0x00, 0x01, 0x74, 0x00, 0x01, 0x78]
        );
    }

    #[test]
    fn test_publish_qos1_packet_id_mismatch() {
        let mut client = connected_client(&[0x40, 0x02, 0x00, 0x02]);
        let err = client
            .publish("t", QoS::AtLeastOnce, false, b"x")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QoS1PacketIdMismatch);
    }

    #[test]
    fn test_publish_qos1_unexpected_ack() {
        let mut client = connected_client(&[0x50, 0x02, 0x00, 0x01]);
        let err = client
            .publish("t", QoS::AtLeastOnce, false, b"x")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QoS1AckUnexpected);
    }

    #[test]
    fn test_publish_qos2_round() {
        let mut client = connected_client(&[0x50, 0x02, 0x00, 0x01, 0x70, 0x02, 0x00, 0x01]);
        client.publish("t", QoS::ExactOnce, false, b"x").unwrap();
        // Publish with QoS 2 flag, then PublishRelease.
        assert_eq!(client.transport.sent[0], 0x34);
        assert_eq!(
            &client.transport.sent[8..],
            &[0x62, 0x02, 0x00, 0x01]
        );
    }

    #[test]
    fn test_publish_qos2_rec_mismatch() {
        let mut client = connected_client(&[0x50, 0x02, 0x00, 0x09]);
        let err = client
            .publish("t", QoS::ExactOnce, false, b"x")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QoS2RecPacketIdMismatch);
    }

    #[test]
    fn test_publish_qos2_comp_mismatch() {
        let mut client = connected_client(&[0x50, 0x02, 0x00, 0x01, 0x70, 0x02, 0x00, 0x09]);
        let err = client
            .publish("t", QoS::ExactOnce, false, b"x")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QoS2CompPacketIdMismatch);
    }

    #[test]
    fn test_publish_qos2_comp_unexpected() {
        let mut client = connected_client(&[0x50, 0x02, 0x00, 0x01, 0x40, 0x02, 0x00, 0x01]);
        let err = client
            .publish("t", QoS::ExactOnce, false, b"x")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QoS2CompUnexpected);
    }

    #[test]
    fn test_publish_packet_ids_increase() {
        let mut client =
            connected_client(&[0x40, 0x02, 0x00, 0x01, 0x40, 0x02, 0x00, 0x02]);
        client.publish("t", QoS::AtLeastOnce, false, b"x").unwrap();
        client.publish("t", QoS::AtLeastOnce, false, b"x").unwrap();
        assert_eq!(client.session.last_packet_id().value(), 2);
    }

    #[test]
    fn test_publish_requires_connected_session() {
        let transport = MockTransport::new(&[]);
        let mut client = Client::new(test_options(), transport);
        let err = client
            .publish("t", QoS::AtMostOnce, false, b"x")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_publish_text_too_large() {
        let mut options = test_options();
        options.set_max_txt_msg_size(4);
        let transport = MockTransport::new(CONNACK_ACCEPTED);
        let mut client = Client::new(options, transport);
        client.connect().unwrap();
        let err = client
            .publish("t", QoS::AtMostOnce, false, b"12345")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PayloadTooLarge);
    }

    #[test]
    fn test_publish_chunk_too_large() {
        let mut options = test_options();
        options.set_max_chunk_size(8);
        let transport = MockTransport::new(CONNACK_ACCEPTED);
        let mut client = Client::new(options, transport);
        client.connect().unwrap();
        let err = client
            .publish_chunk("t", QoS::AtMostOnce, false, &[0_u8; 9])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PayloadTooLarge);
    }

    #[test]
    fn test_publish_file_missing() {
        let mut client = connected_client(&[]);
        let err = client
            .publish_file(
                "t",
                QoS::AtMostOnce,
                false,
                Path::new("/nonexistent/payload.bin"),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileOpenError);
    }

    #[test]
    fn test_subscribe() {
        let mut client = connected_client(&[0x90, 0x03, 0x00, 0x01, 0x00]);
        client.subscribe("a").unwrap();
        assert_eq!(
            &client.transport.sent,
            &[0x82, 0x06, 0x00, 0x01, 0x00, 0x01, 0x61, 0x00]
        );
    }

    #[test]
    fn test_subscribe_packet_id_mismatch() {
        let mut client = connected_client(&[0x90, 0x03, 0x00, 0x07, 0x00]);
        let err = client.subscribe("a").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SubAckPacketIdMismatch);
    }

    #[test]
    fn test_subscribe_unexpected_ack() {
        let mut client = connected_client(&[0x40, 0x02, 0x00, 0x01]);
        let err = client.subscribe("a").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SubAckUnexpected);
    }

    #[test]
    fn test_ping_sends_ping_request() {
        let mut client = connected_client(&[]);
        client.ping().unwrap();
        assert_eq!(&client.transport.sent, &[0xc0, 0x00]);
    }

    #[test]
    fn test_disconnect_sends_disconnect() {
        let mut client = connected_client(&[]);
        client.disconnect().unwrap();
        assert_eq!(&client.transport.sent, &[0xe0, 0x00]);
        assert_eq!(client.status(), ClientStatus::Disconnected);
        client.close();
        assert!(client.transport.closed);
    }

    #[test]
    fn test_read_message_delivers_publish() {
        let mut client =
            connected_client(&[0x30, 0x07, 0x00, 0x03, 0x61, 0x2f, 0x62, 0x68, 0x69]);
        let msg = client.read_message().unwrap().unwrap();
        assert_eq!(msg.topic, "a/b");
        assert_eq!(msg.qos, QoS::AtMostOnce);
        assert_eq!(msg.payload, b"hi");
    }

    #[test]
    fn test_read_message_skips_packet_id() {
        let mut client =
            connected_client(&[0x32, 0x08, 0x00, 0x03, 0x61, 0x2f, 0x62, 0x00, 0x07, 0x68]);
        let msg = client.read_message().unwrap().unwrap();
        assert_eq!(msg.topic, "a/b");
        assert_eq!(msg.qos, QoS::AtLeastOnce);
        assert_eq!(msg.payload, b"h");
        // Inbound QoS 1 messages are not acknowledged.
        assert!(client.transport.sent.is_empty());
    }

    #[test]
    fn test_read_message_discards_ping_response() {
        let mut client = connected_client(&[0xd0, 0x00]);
        assert!(client.read_message().unwrap().is_none());
    }

    #[test]
    fn test_read_message_closed_stream() {
        let mut client = connected_client(&[]);
        let err = client.read_message().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportClosed);
        assert_eq!(client.status(), ClientStatus::Failed);
    }

    #[test]
    fn test_read_message_chunked_stream_matches_whole() {
        let frames = [
            0x30, 0x07, 0x00, 0x03, 0x61, 0x2f, 0x62, 0x68, 0x69, 0xd0, 0x00, 0x30, 0x06, 0x00,
            0x01, 0x74, 0x68, 0x65, 0x79,
        ];
        for chunk_size in [1, 2, 3, usize::MAX] {
            let mut stream = CONNACK_ACCEPTED.to_vec();
            stream.extend_from_slice(&frames);
            let transport = MockTransport::with_chunk_size(&stream, chunk_size);
            let mut client = Client::new(test_options(), transport);
            client.connect().unwrap();

            let first = client.read_message().unwrap().unwrap();
            assert_eq!(first.topic, "a/b");
            assert_eq!(first.payload, b"hi");
            assert!(client.read_message().unwrap().is_none());
            let second = client.read_message().unwrap().unwrap();
            assert_eq!(second.topic, "t");
            assert_eq!(second.payload, b"hey");
        }
    }
}
