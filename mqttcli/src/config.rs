// Copyright (c) 2021 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{Error, ErrorKind};

/// Values read from a `key=value` config file.
///
/// Every field is optional; the command line tools resolve the final value
/// as explicit flag, then config file entry, then built-in default. Lines
/// without a `=` separator and unrecognised keys are skipped.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Config {
    pub broker_ip: Option<String>,
    pub broker_port: Option<u16>,
    pub broker_user: Option<String>,
    pub broker_passwd: Option<String>,
    pub client_id: Option<String>,
    pub topic: Option<String>,
    pub qos: Option<u8>,
    pub retain: Option<bool>,
    pub alive: Option<u16>,
    pub will_flag: Option<bool>,
    pub will_qos: Option<u8>,
    pub will_retain: Option<bool>,
    pub clean_session: Option<bool>,
    pub will_topic: Option<String>,
    pub will_msg: Option<String>,
    pub sequence: Option<u16>,
    pub output_file: Option<String>,
    pub input_file: Option<String>,
    pub client_loop: Option<bool>,
    pub publish_first_online: Option<bool>,
    pub persist_conn_time: Option<i32>,
    pub file_trans: Option<bool>,
}

impl Config {
    /// Read config values from the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read or a numeric value
    /// does not parse.
    pub fn load(path: &Path) -> Result<Self, Error> {
        log::debug!("Using config file {}", path.display());
        let file = File::open(path).map_err(|err| {
            Error::from_string(
                ErrorKind::ConfigError,
                format!("Failed to open config file {}, err: {err}", path.display()),
            )
        })?;
        Self::parse(BufReader::new(file))
    }

    /// Parse config values from a line-oriented reader.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a line cannot be read or a numeric value
    /// does not parse.
    pub fn parse<R: BufRead>(reader: R) -> Result<Self, Error> {
        let mut config = Self::default();
        for line in reader.lines() {
            let line = line.map_err(|err| {
                Error::from_string(
                    ErrorKind::ConfigError,
                    format!("Failed to read config line, err: {err}"),
                )
            })?;
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            match key {
                "broker_ip" => config.broker_ip = Some(value.to_string()),
                "broker_port" => config.broker_port = Some(parse_number(key, value)?),
                "broker_user" => config.broker_user = Some(value.to_string()),
                "broker_passwd" => config.broker_passwd = Some(value.to_string()),
                "client_id" => config.client_id = Some(value.to_string()),
                "topic" => config.topic = Some(value.to_string()),
                "qos" => config.qos = Some(parse_number(key, value)?),
                "retain" => config.retain = Some(parse_flag(key, value)?),
                "alive" => config.alive = Some(parse_number(key, value)?),
                "will_flag" => config.will_flag = Some(parse_flag(key, value)?),
                "will_qos" => config.will_qos = Some(parse_number(key, value)?),
                "will_retain" => config.will_retain = Some(parse_flag(key, value)?),
                "clean_session" => config.clean_session = Some(parse_flag(key, value)?),
                "will_topic" => config.will_topic = Some(value.to_string()),
                "will_msg" => config.will_msg = Some(value.to_string()),
                "sequence" => config.sequence = Some(parse_number(key, value)?),
                "output_file" => config.output_file = Some(value.to_string()),
                "input_file" => config.input_file = Some(value.to_string()),
                "client_loop" => config.client_loop = Some(parse_flag(key, value)?),
                "publish_first_online" => {
                    config.publish_first_online = Some(parse_flag(key, value)?);
                }
                "persist_conn_time" => config.persist_conn_time = Some(parse_number(key, value)?),
                "file_trans" => config.file_trans = Some(parse_flag(key, value)?),
                _ => log::warn!("Unknown config key: {key}"),
            }
        }
        Ok(config)
    }
}

fn parse_number<N: std::str::FromStr>(key: &str, value: &str) -> Result<N, Error> {
    value.parse().map_err(|_err| {
        Error::from_string(
            ErrorKind::ConfigError,
            format!("Invalid value for config key {key}: {value}"),
        )
    })
}

fn parse_flag(key: &str, value: &str) -> Result<bool, Error> {
    let number: i32 = parse_number(key, value)?;
    Ok(number != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let content = b"broker_ip=192.168.125.11\n\
            broker_port=1883\n\
            client_id=client-id-5\n\
            topic=devices/ID/sensor1\n\
            qos=2\n\
            retain=1\n\
            alive=60\n\
            clean_session=0\n\
            sequence=17\n\
            persist_conn_time=-1\n\
            file_trans=1\n";
        let config = Config::parse(&content[..]).unwrap();
        assert_eq!(config.broker_ip.as_deref(), Some("192.168.125.11"));
        assert_eq!(config.broker_port, Some(1883));
        assert_eq!(config.client_id.as_deref(), Some("client-id-5"));
        assert_eq!(config.qos, Some(2));
        assert_eq!(config.retain, Some(true));
        assert_eq!(config.alive, Some(60));
        assert_eq!(config.clean_session, Some(false));
        assert_eq!(config.sequence, Some(17));
        assert_eq!(config.persist_conn_time, Some(-1));
        assert_eq!(config.file_trans, Some(true));
        assert_eq!(config.will_topic, None);
    }

    #[test]
    fn test_parse_skips_unknown_keys_and_blank_lines() {
        let content = b"\nnot a key value line\nsome_future_key=1\ntopic=a/b\n";
        let config = Config::parse(&content[..]).unwrap();
        assert_eq!(config.topic.as_deref(), Some("a/b"));
    }

    #[test]
    fn test_parse_rejects_bad_number() {
        let content = b"broker_port=abc\n";
        let err = Config::parse(&content[..]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }
}
