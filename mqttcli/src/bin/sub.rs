// Copyright (c) 2022 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use clap::Parser;
use mqttcli::config::Config;
use mqttcli::connect_options::{
    ConnectOptions, UsernameAuth, WillOptions, DEFAULT_BROKER_HOST, DEFAULT_BROKER_PORT,
    DEFAULT_KEEP_ALIVE, DEFAULT_PING_PERIOD, DEFAULT_SEQUENCE,
};
use mqttcli::{Client, Error, ErrorKind, TcpTransport};
use std::convert::TryFrom;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use codec::QoS;

const DEFAULT_CLIENT_ID: &str = "mqtt";
const DEFAULT_TOPIC: &str = "mqtt/test";
const DEFAULT_OUTPUT_FILE: &str = "output/recv_file";
const DEFAULT_WILL_MESSAGE: &str = "pub:offline";

/// MQTT 3.1.1 subscriber.
#[derive(Debug, Parser)]
#[command(name = "mqttcli-sub", about = "Subscribe to a topic on an MQTT broker")]
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

    /// Topic to subscribe (default mqtt/test).
    #[arg(short = 't')]
    topic: Option<String>,

    /// Output file for received file messages, with -f (default output/recv_file).
    #[arg(short = 'o')]
    output_file: Option<String>,

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

    /// Read messages in a loop.
    #[arg(short = 'l')]
    client_loop: bool,

    /// Receive file messages instead of text messages.
    #[arg(short = 'f')]
    file_trans: bool,

    /// Retain the will message.
    #[arg(short = 'R')]
    will_retain: bool,

    /// Register a will message for this connection.
    #[arg(short = 'W')]
    will: bool,

    /// Start with a clean session.
    #[arg(short = 'C')]
    clean_session: bool,

    /// First online message flag; the subscriber publishes nothing, the
    /// option is accepted so both tools take the same letters.
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
    let output_file = args
        .output_file
        .clone()
        .or_else(|| config.output_file.clone())
        .unwrap_or_else(|| DEFAULT_OUTPUT_FILE.to_string());
    let keep_alive = args.keep_alive.or(config.alive).unwrap_or(DEFAULT_KEEP_ALIVE);
    let sequence = config.sequence.unwrap_or(DEFAULT_SEQUENCE);
    let connect_wait = args.connect_wait.or(config.persist_conn_time).unwrap_or(0);
    let clean_session = args.clean_session || config.clean_session.unwrap_or(false);
    let client_loop = args.client_loop || config.client_loop.unwrap_or(false);
    let file_trans = args.file_trans || config.file_trans.unwrap_or(false);
    if args.publish_first_online || config.publish_first_online.unwrap_or(false) {
        log::warn!("First online message is a publisher option, ignored");
    }

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

    loop {
        match run_session(&options, &topic, file_trans, client_loop, &output_file) {
            Ok(()) => return Ok(()),
            // The connect retry loop already honoured connect_wait.
            Err(err) if err.kind() == ErrorKind::ConnectFailed => return Err(err),
            Err(err) => {
                if connect_wait == 0 {
                    return Err(err);
                }
                log::error!("{err}");
                log::info!("Re-connecting to broker...");
            }
        }
    }
}

fn run_session(
    options: &ConnectOptions,
    topic: &str,
    file_trans: bool,
    client_loop: bool,
    output_file: &str,
) -> Result<(), Error> {
    let transport = TcpTransport::connect(options.host(), options.port(), options.connect_wait())?;
    let mut client = Client::new(options.clone(), transport);
    if let Err(err) = client.connect() {
        if err.is_warning() {
            log::warn!("{err}");
        } else {
            return Err(err);
        }
    }
    client.subscribe(topic)?;

    // Wake from the blocking read on this deadline to send keep-alive pings.
    client.set_read_timeout(Some(Duration::from_secs(DEFAULT_PING_PERIOD)))?;

    loop {
        match client.read_message() {
            Ok(Some(msg)) => {
                log::info!("Topic: [{}] - Message len: [{}]", msg.topic, msg.payload.len());
                if file_trans {
                    fs::write(output_file, &msg.payload).map_err(|err| {
                        Error::from_string(
                            ErrorKind::FileOpenError,
                            format!("Failed to write {output_file}, err: {err}"),
                        )
                    })?;
                } else {
                    println!("{}", String::from_utf8_lossy(&msg.payload));
                }
                if !client_loop {
                    break;
                }
            }
            Ok(None) => {}
            Err(err) if err.kind() == ErrorKind::ReadTimeout => {
                log::info!("Sending ping...");
                client.ping()?;
            }
            Err(err) => return Err(err),
        }
    }

    client.disconnect()?;
    client.close();
    Ok(())
}
