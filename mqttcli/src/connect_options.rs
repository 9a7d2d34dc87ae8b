// Copyright (c) 2020 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Lesser General Public License that can be found
// in the LICENSE file.

use codec::utils::random_string;
use codec::QoS;
use std::time::Duration;

/// Default broker host.
pub const DEFAULT_BROKER_HOST: &str = "127.0.0.1";

/// Default broker port.
pub const DEFAULT_BROKER_PORT: u16 = 1883;

/// Default keep alive interval in seconds.
pub const DEFAULT_KEEP_ALIVE: u16 = 300;

/// Default period between PingRequest packets in seconds.
pub const DEFAULT_PING_PERIOD: u64 = 30;

/// Default ceiling for text message payloads, 1KB.
pub const DEFAULT_MAX_TXT_MSG_SIZE: usize = 1024;

/// Default ceiling for file message payloads, 4MB.
///
/// The protocol itself supports up to 256MB.
pub const DEFAULT_MAX_FILE_MSG_SIZE: usize = 4 * 1024 * 1024;

/// Default ceiling for one chunk when a file is transferred in parts, 100KB.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 100 * 1024;

/// First packet id assigned in a session.
pub const DEFAULT_SEQUENCE: u16 = 1;

/// Will message stored on the broker for the duration of a connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WillOptions {
    pub topic: String,
    pub message: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

/// Username/password pair presented in the Connect packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UsernameAuth {
    pub username: String,
    pub password: Option<Vec<u8>>,
}

/// Connection options of a client session.
#[derive(Clone, Debug)]
pub struct ConnectOptions {
    host: String,
    port: u16,
    client_id: String,
    auth: Option<UsernameAuth>,
    will: Option<WillOptions>,
    clean_session: bool,
    keep_alive: u16,
    sequence: u16,
    connect_wait: i32,
    read_timeout: Option<Duration>,
    max_txt_msg_size: usize,
    max_file_msg_size: usize,
    max_chunk_size: usize,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            host: DEFAULT_BROKER_HOST.to_string(),
            port: DEFAULT_BROKER_PORT,
            client_id: random_string(8),
            auth: None,
            will: None,
            clean_session: false,
            keep_alive: DEFAULT_KEEP_ALIVE,
            sequence: DEFAULT_SEQUENCE,
            connect_wait: 0,
            read_timeout: None,
            max_txt_msg_size: DEFAULT_MAX_TXT_MSG_SIZE,
            max_file_msg_size: DEFAULT_MAX_FILE_MSG_SIZE,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
        }
    }
}

impl ConnectOptions {
    #[must_use]
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            ..Self::default()
        }
    }

    pub fn set_host(&mut self, host: &str) -> &mut Self {
        self.host = host.to_string();
        self
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn set_port(&mut self, port: u16) -> &mut Self {
        self.port = port;
        self
    }

    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    pub fn set_client_id(&mut self, client_id: &str) -> &mut Self {
        self.client_id = client_id.to_string();
        self
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn set_auth(&mut self, auth: Option<UsernameAuth>) -> &mut Self {
        self.auth = auth;
        self
    }

    #[must_use]
    pub const fn auth(&self) -> Option<&UsernameAuth> {
        self.auth.as_ref()
    }

    pub fn set_will(&mut self, will: Option<WillOptions>) -> &mut Self {
        self.will = will;
        self
    }

    #[must_use]
    pub const fn will(&self) -> Option<&WillOptions> {
        self.will.as_ref()
    }

    pub fn set_clean_session(&mut self, clean_session: bool) -> &mut Self {
        self.clean_session = clean_session;
        self
    }

    #[must_use]
    pub const fn clean_session(&self) -> bool {
        self.clean_session
    }

    /// Update keep alive interval in seconds.
    pub fn set_keep_alive(&mut self, keep_alive: u16) -> &mut Self {
        self.keep_alive = keep_alive;
        self
    }

    #[must_use]
    pub const fn keep_alive(&self) -> u16 {
        self.keep_alive
    }

    /// Update the first packet id assigned in the session.
    pub fn set_sequence(&mut self, sequence: u16) -> &mut Self {
        self.sequence = sequence;
        self
    }

    #[must_use]
    pub const fn sequence(&self) -> u16 {
        self.sequence
    }

    /// Update time in seconds to keep retrying the broker connection.
    ///
    /// 0 gives up after one attempt, a negative value retries forever.
    pub fn set_connect_wait(&mut self, connect_wait: i32) -> &mut Self {
        self.connect_wait = connect_wait;
        self
    }

    #[must_use]
    pub const fn connect_wait(&self) -> i32 {
        self.connect_wait
    }

    /// Update receive timeout, `None` blocks forever.
    pub fn set_read_timeout(&mut self, read_timeout: Option<Duration>) -> &mut Self {
        self.read_timeout = read_timeout;
        self
    }

    #[must_use]
    pub const fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    pub fn set_max_txt_msg_size(&mut self, size: usize) -> &mut Self {
        self.max_txt_msg_size = size;
        self
    }

    #[must_use]
    pub const fn max_txt_msg_size(&self) -> usize {
        self.max_txt_msg_size
    }

    pub fn set_max_file_msg_size(&mut self, size: usize) -> &mut Self {
        self.max_file_msg_size = size;
        self
    }

    #[must_use]
    pub const fn max_file_msg_size(&self) -> usize {
        self.max_file_msg_size
    }

    pub fn set_max_chunk_size(&mut self, size: usize) -> &mut Self {
        self.max_chunk_size = size;
        self
    }

    #[must_use]
    pub const fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }
}
