// Copyright (c) 2022 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use clap::Parser;
use codec::QoS;
use mqttcli::config::Config;
use mqttcli::connect_options::{
    ConnectOptions, UsernameAuth, WillOptions, DEFAULT_BROKER_HOST, DEFAULT_BROKER_PORT,
    DEFAULT_KEEP_ALIVE, DEFAULT_SEQUENCE,
};
use mqttcli::{Client, Error, TcpTransport};
use std::convert::TryFrom;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

const DEFAULT_CLIENT_ID: &str = "mqtt";
const DEFAULT_TOPIC: &str = "mqtt/test";
const DEFAULT_MESSAGE: &str = "Hello - MQTT Protocol!";
const DEFAULT_WILL_MESSAGE: &str = "pub:offline";

/// MQTT 3.1.1 publisher.
#[derive(Debug, Parser)]
#[command(name = "mqttcli-pub", about = "Publish messages to an MQTT broker")]
struct Args {
    /// Broker IP (default 127.0.0.1).
    #[arg(short = 'b')]
    broker: Option<String>,

    /// Broker port (default 1883).
    #[arg(short = 'p')]
    port: Option<u16>,

    /// Broker username.
    #[arg(short = 'u')]
    username: Option<String>,

    /// Broker password.
    #[arg(short = 'k')]
    password: Option<String>,

    /// Client id (default mqtt).
    #[arg(short = 'i')]
    client_id: Option<String>,

    /// Topic to publish (default mqtt/test).
    #[arg(short = 't')]
    topic: Option<String>,

    /// Message to transfer, or path to the input file with -f.
    #[arg(short = 'm')]
    message: Option<String>,

    /// Quality of service to publish, 0, 1 or 2 (default 0).
    #[arg(short = 'q')]
    qos: Option<u8>,

    /// Keep alive in seconds (default 300).
    #[arg(short = 'a')]
    keep_alive: Option<u16>,

    /// Will quality of service (default 0).
    #[arg(short = 'Q')]
    will_qos: Option<u8>,

    /// Will topic (default mqtt/test).
    #[arg(short = 'T')]
    will_topic: Option<String>,

    /// Will message (default pub:offline).
    #[arg(short = 'M')]
    will_message: Option<String>,

    /// Seconds to wait for the broker connection, -1 waits forever (default 0).
    #[arg(short = 'P', allow_hyphen_values = true)]
    connect_wait: Option<i32>,

    /// Config file path.
    #[arg(short = 'c')]
    config: Option<PathBuf>,

    /// Publish messages in a loop.
    #[arg(short = 'l')]
    client_loop: bool,

    /// Transfer a file instead of a text message.
    #[arg(short = 'f')]
    file_trans: bool,

    /// Ask the broker to retain the published message.
    #[arg(short = 'r')]
    retain: bool,

    /// Retain the will message.
    #[arg(short = 'R')]
    will_retain: bool,

    /// Register a will message for this connection.
    #[arg(short = 'W')]
    will: bool,

    /// Start with a clean session.
    #[arg(short = 'C')]
    clean_session: bool,

    /// Publish a retained first-online message right after connecting.
    #[arg(short = 'O')]
    publish_first_online: bool,
}

fn main() -> ExitCode {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let code = err.code() as u8;
            ExitCode::from(code)
        }
    }
}

fn run(args: &Args) -> Result<(), Error> {
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let host = args
        .broker
        .clone()
        .or_else(|| config.broker_ip.clone())
        .unwrap_or_else(|| DEFAULT_BROKER_HOST.to_string());
    let port = args.port.or(config.broker_port).unwrap_or(DEFAULT_BROKER_PORT);
    let client_id = args
        .client_id
        .clone()
        .or_else(|| config.client_id.clone())
        .unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string());
    let topic = args
        .topic
        .clone()
        .or_else(|| config.topic.clone())
        .unwrap_or_else(|| DEFAULT_TOPIC.to_string());
    let message = args
        .message
        .clone()
        .or_else(|| config.input_file.clone())
        .unwrap_or_else(|| DEFAULT_MESSAGE.to_string());
    let qos = QoS::try_from(args.qos.or(config.qos).unwrap_or(0))?;
    let keep_alive = args.keep_alive.or(config.alive).unwrap_or(DEFAULT_KEEP_ALIVE);
    let sequence = config.sequence.unwrap_or(DEFAULT_SEQUENCE);
    let connect_wait = args.connect_wait.or(config.persist_conn_time).unwrap_or(0);
    let retain = args.retain || config.retain.unwrap_or(false);
    let clean_session = args.clean_session || config.clean_session.unwrap_or(false);
    let client_loop = args.client_loop || config.client_loop.unwrap_or(false);
    let file_trans = args.file_trans || config.file_trans.unwrap_or(false);
    let publish_first_online =
        args.publish_first_online || config.publish_first_online.unwrap_or(false);

    let username = args.username.clone().or_else(|| config.broker_user.clone());
    let password = args.password.clone().or_else(|| config.broker_passwd.clone());
    if username.is_none() && password.is_some() {
        log::warn!("Password without username is ignored");
    }
    let auth = username.map(|username| UsernameAuth {
        username,
        password: password.map(String::into_bytes),
    });

    let will = if args.will || config.will_flag.unwrap_or(false) {
        let will_topic = args
            .will_topic
            .clone()
            .or_else(|| config.will_topic.clone())
            .unwrap_or_else(|| DEFAULT_TOPIC.to_string());
        let will_message = args
            .will_message
            .clone()
            .or_else(|| config.will_msg.clone())
            .unwrap_or_else(|| DEFAULT_WILL_MESSAGE.to_string());
        let will_qos = QoS::try_from(args.will_qos.or(config.will_qos).unwrap_or(0))?;
        let will_retain = args.will_retain || config.will_retain.unwrap_or(false);
        Some(WillOptions {
            topic: will_topic,
            message: will_message.into_bytes(),
            qos: will_qos,
            retain: will_retain,
        })
    } else {
        None
    };

    let mut options = ConnectOptions::new(&host, port);
    options
        .set_client_id(&client_id)
        .set_auth(auth)
        .set_will(will)
        .set_clean_session(clean_session)
        .set_keep_alive(keep_alive)
        .set_sequence(sequence)
        .set_connect_wait(connect_wait);

    let transport = TcpTransport::connect(options.host(), options.port(), options.connect_wait())?;
    let mut client = Client::new(options, transport);
    if let Err(err) = client.connect() {
        if err.is_warning() {
            log::warn!("{err}");
        } else {
            return Err(err);
        }
    }

    if publish_first_online {
        // No option fills the first-online payload, so an empty retained
        // message marks the publisher as online.
        client.publish(&topic, qos, true, b"")?;
        thread::sleep(Duration::from_secs(1));
    }

    loop {
        if file_trans {
            client.publish_file(&topic, qos, retain, Path::new(&message))?;
        } else {
            client.publish(&topic, qos, retain, message.as_bytes())?;
        }
        log::info!("Published to `{topic}`");
        if !client_loop {
            break;
        }
    }

    client.disconnect()?;
    client.close();
    Ok(())
}
