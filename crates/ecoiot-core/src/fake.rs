// ── In-memory gateway for tests ──
//
// Simulates a gateway with a set of switchable devices. Each device has a
// scripted behavior for reads and for commands; every call is recorded.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ecoiot_api::{CommandName, DeviceApi, DeviceDescriptor, Error, Params, Reply};
use serde_json::{Map, Value, json};

/// How a device answers `read_device`.
#[derive(Debug, Clone)]
pub(crate) enum ReadBehavior {
    /// Current state as a reading.
    Reading,
    /// A reading, after a delay.
    Delay(Duration),
    /// The bare acknowledgement.
    Ack,
    Fail(Failure),
    /// Never answers.
    Hang,
}

/// How a device answers `quick_run` / `quick_stop`.
#[derive(Debug, Clone)]
pub(crate) enum CommandBehavior {
    /// Acknowledge and apply.
    Ack,
    /// Answer with a JSON body instead of the acknowledgement.
    Body,
    Fail(Failure),
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Failure {
    Timeout,
    Transport,
    Malformed,
    Protocol,
}

impl Failure {
    fn into_error(self) -> Error {
        match self {
            Self::Timeout => Error::Timeout { timeout_ms: 10_000 },
            Self::Transport => Error::Transport(transport_error()),
            Self::Malformed => Error::MalformedResponse {
                reason: "not JSON".into(),
                raw: "<html>busy</html>".into(),
            },
            Self::Protocol => Error::Protocol {
                message: "EOF while parsing an object".into(),
                body: "{\"command\":[{".into(),
            },
        }
    }
}

/// A genuine `reqwest` failure that is not a timeout.
fn transport_error() -> reqwest::Error {
    reqwest::Client::new()
        .post("http://")
        .build()
        .expect_err("a URL without a host never builds")
}

/// One recorded request.
#[derive(Debug, Clone)]
pub(crate) struct Call {
    pub device_id: String,
    pub command: CommandName,
    pub params: Params,
}

struct FakeDevice {
    on: bool,
    read: ReadBehavior,
    command: CommandBehavior,
}

#[derive(Default)]
struct FakeState {
    devices: HashMap<String, FakeDevice>,
    calls: Vec<Call>,
    reads: u64,
}

#[derive(Clone, Default)]
pub(crate) struct FakeGateway {
    state: Arc<Mutex<FakeState>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a healthy device that starts switched off.
    pub fn with_device(self, id: &str) -> Self {
        self.state.lock().unwrap().devices.insert(
            id.to_owned(),
            FakeDevice {
                on: false,
                read: ReadBehavior::Reading,
                command: CommandBehavior::Ack,
            },
        );
        self
    }

    pub fn set_read(&self, id: &str, behavior: ReadBehavior) {
        self.state.lock().unwrap().devices.get_mut(id).unwrap().read = behavior;
    }

    pub fn set_command(&self, id: &str, behavior: CommandBehavior) {
        self.state.lock().unwrap().devices.get_mut(id).unwrap().command = behavior;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_of(&self, command: CommandName) -> usize {
        self.calls().iter().filter(|c| c.command == command).count()
    }

    /// Completed `read_device` exchanges that produced a reading.
    pub fn reads(&self) -> u64 {
        self.state.lock().unwrap().reads
    }

    pub fn into_api(self) -> Arc<dyn DeviceApi> {
        Arc::new(self)
    }

    fn reading(&self, id: &str) -> Reply {
        let mut state = self.state.lock().unwrap();
        state.reads += 1;
        let seq = state.reads;
        let on = state.devices.get(id).is_some_and(|d| d.on);
        let body = json!({
            "id": id,
            "ac_status": u8::from(on),
            "seq": seq,
            "seq_copy": seq,
        });
        Reply::Body(into_map(body))
    }
}

fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[async_trait]
impl DeviceApi for FakeGateway {
    async fn request(
        &self,
        device: &DeviceDescriptor,
        command: CommandName,
        params: &Params,
        timeout: Duration,
    ) -> Result<Reply, Error> {
        // Same precondition as the real client: nothing is sent for a bad id.
        device.numeric_id()?;

        let (read, cmd) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call {
                device_id: device.id.clone(),
                command,
                params: params.clone(),
            });
            let Some(dev) = state.devices.get(&device.id) else {
                return Err(Failure::Timeout.into_error());
            };
            (dev.read.clone(), dev.command.clone())
        };

        // Bounded the way the real client bounds an exchange.
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        tokio::time::timeout(timeout, self.answer(device, command, read, cmd))
            .await
            .map_err(|_| Error::Timeout { timeout_ms })?
    }
}

impl FakeGateway {
    async fn answer(
        &self,
        device: &DeviceDescriptor,
        command: CommandName,
        read: ReadBehavior,
        cmd: CommandBehavior,
    ) -> Result<Reply, Error> {
        if command == CommandName::ReadDevice {
            return match read {
                ReadBehavior::Reading => Ok(self.reading(&device.id)),
                ReadBehavior::Delay(d) => {
                    tokio::time::sleep(d).await;
                    Ok(self.reading(&device.id))
                }
                ReadBehavior::Ack => Ok(Reply::Ack),
                ReadBehavior::Fail(f) => Err(f.into_error()),
                ReadBehavior::Hang => std::future::pending().await,
            };
        }

        match cmd {
            CommandBehavior::Ack => {
                let on = command == CommandName::QuickRun;
                if let Some(dev) = self.state.lock().unwrap().devices.get_mut(&device.id) {
                    dev.on = on;
                }
                Ok(Reply::Ack)
            }
            CommandBehavior::Body => Ok(Reply::Body(into_map(json!({"errcode": 1})))),
            CommandBehavior::Fail(f) => Err(f.into_error()),
        }
    }
}
