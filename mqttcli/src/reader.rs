// Copyright (c) 2022 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use crate::connect_options::DEFAULT_MAX_FILE_MSG_SIZE;
use crate::error::{Error, ErrorKind};
use crate::transport::Transport;

/// Reads one complete control packet from a transport.
///
/// The transport hands back whatever the kernel has buffered, so a packet
/// may arrive split across any number of reads. The reader consumes exactly
/// one packet per call and never looks past the frame boundary, keeping the
/// byte stream aligned for the next call.
#[allow(clippy::module_name_repetitions)]
#[derive(Debug, Clone)]
pub struct FrameReader {
    /// Upper bound on the remaining length of an accepted packet.
    max_packet_size: usize,
}

impl Default for FrameReader {
    fn default() -> Self {
        Self {
            max_packet_size: DEFAULT_MAX_FILE_MSG_SIZE,
        }
    }
}

impl FrameReader {
    #[must_use]
    pub const fn new(max_packet_size: usize) -> Self {
        Self { max_packet_size }
    }

    /// Read one complete packet, fixed header included.
    ///
    /// # Errors
    ///
    /// Returns `TransportClosed` if the stream ends on a frame boundary,
    /// `MalformedVarInt` if the remaining length field is invalid or the
    /// stream ends inside it, `MessageTooLarge` if the announced length
    /// exceeds the configured maximum, and passes through `ReadTimeout` and
    /// `TransportError` from the transport.
    pub fn read_frame<T: Transport>(&self, transport: &mut T) -> Result<Vec<u8>, Error> {
        // Byte 1: packet type and flags.
        let mut byte = [0_u8; 1];
        let n_recv = transport.recv(&mut byte)?;
        if n_recv == 0 {
            return Err(Error::new(
                ErrorKind::TransportClosed,
                "Connection closed by remote",
            ));
        }

        let mut packet = Vec::with_capacity(64);
        packet.push(byte[0]);

        // Bytes 2..=5: remaining length, one byte at a time so no payload
        // byte is consumed by accident.
        let mut remaining_length: usize = 0;
        let mut multiplier: usize = 1;
        for count in 0.. {
            if count == 4 {
                return Err(Error::new(
                    ErrorKind::MalformedVarInt,
                    "Remaining length exceeds four bytes",
                ));
            }
            let n_recv = transport.recv(&mut byte)?;
            if n_recv == 0 {
                return Err(Error::new(
                    ErrorKind::MalformedVarInt,
                    "Stream ended inside remaining length",
                ));
            }
            packet.push(byte[0]);
            remaining_length += ((byte[0] & 0x7f) as usize) * multiplier;
            if byte[0] & 0x80 == 0 {
                break;
            }
            multiplier *= 0x80;
        }

        if remaining_length > self.max_packet_size {
            return Err(Error::from_string(
                ErrorKind::MessageTooLarge,
                format!(
                    "Packet length {remaining_length} exceeds limit {}",
                    self.max_packet_size
                ),
            ));
        }

        // Remaining bytes of the packet, possibly across several reads.
        let header_len = packet.len();
        packet.resize(header_len + remaining_length, 0);
        let mut n_read = 0;
        while n_read < remaining_length {
            let n_recv = transport.recv(&mut packet[header_len + n_read..])?;
            if n_recv == 0 {
                return Err(Error::new(
                    ErrorKind::TransportClosed,
                    "Connection closed inside packet body",
                ));
            }
            n_read += n_recv;
        }

        Ok(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;

    #[test]
    fn test_read_frame_whole() {
        let mut transport =
            MockTransport::new(&[0x30, 0x07, 0x00, 0x03, 0x61, 0x2f, 0x62, 0x68, 0x69]);
        let reader = FrameReader::default();
        let frame = reader.read_frame(&mut transport).unwrap();
        assert_eq!(
            &frame,
            &[0x30, 0x07, 0x00, 0x03, 0x61, 0x2f, 0x62, 0x68, 0x69]
        );
    }

    #[test]
    fn test_read_frame_single_byte_chunks() {
        // Arbitrary chunking must yield the same frames as one read.
        let stream = [0x30, 0x07, 0x00, 0x03, 0x61, 0x2f, 0x62, 0x68, 0x69, 0xd0, 0x00];
        let mut transport = MockTransport::with_chunk_size(&stream, 1);
        let reader = FrameReader::default();
        let first = reader.read_frame(&mut transport).unwrap();
        assert_eq!(&first, &stream[..9]);
        let second = reader.read_frame(&mut transport).unwrap();
        assert_eq!(&second, &[0xd0, 0x00]);
    }

    #[test]
    fn test_read_frame_stops_at_frame_boundary() {
        let stream = [0xd0, 0x00, 0x40, 0x02, 0x00, 0x01];
        let mut transport = MockTransport::new(&stream);
        let reader = FrameReader::default();
        let first = reader.read_frame(&mut transport).unwrap();
        assert_eq!(&first, &[0xd0, 0x00]);
        let second = reader.read_frame(&mut transport).unwrap();
        assert_eq!(&second, &[0x40, 0x02, 0x00, 0x01]);
    }

    #[test]
    fn test_read_frame_two_byte_remaining_length() {
        let mut body = vec![0x00, 0x01, 0x74];
        body.extend_from_slice(&[0x61; 201]);
        let mut stream = vec![0x30, 0xcc, 0x01];
        stream.extend_from_slice(&body);
        let mut transport = MockTransport::with_chunk_size(&stream, 50);
        let reader = FrameReader::default();
        let frame = reader.read_frame(&mut transport).unwrap();
        assert_eq!(frame.len(), 3 + 204);
    }

    #[test]
    fn test_read_frame_closed_stream() {
        let mut transport = MockTransport::new(&[]);
        let reader = FrameReader::default();
        let err = reader.read_frame(&mut transport).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportClosed);
    }

    #[test]
    fn test_read_frame_closed_inside_body() {
        let mut transport = MockTransport::new(&[0x30, 0x07, 0x00, 0x03]);
        let reader = FrameReader::default();
        let err = reader.read_frame(&mut transport).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportClosed);
    }

    #[test]
    fn test_read_frame_malformed_var_int() {
        let mut transport = MockTransport::new(&[0x30, 0x80, 0x80, 0x80, 0x80, 0x01]);
        let reader = FrameReader::default();
        let err = reader.read_frame(&mut transport).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedVarInt);
    }

    #[test]
    fn test_read_frame_truncated_var_int() {
        let mut transport = MockTransport::new(&[0x30, 0x80]);
        let reader = FrameReader::default();
        let err = reader.read_frame(&mut transport).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedVarInt);
    }

    #[test]
    fn test_read_frame_message_too_large() {
        let mut transport =
            MockTransport::new(&[0x30, 0x07, 0x00, 0x03, 0x61, 0x2f, 0x62, 0x68, 0x69]);
        let reader = FrameReader::new(4);
        let err = reader.read_frame(&mut transport).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MessageTooLarge);
    }
}
