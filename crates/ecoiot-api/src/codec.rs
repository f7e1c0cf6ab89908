// Wire codec for the quick-command protocol.
//
// Requests are a single JSON document `{"command":[{cmd, id, model, ...}]}`.
// Replies are text padded with spaces, `%`, CR and LF, carrying either the
// bare acknowledgement `200 OK` or a JSON document of the same shape.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{AsRefStr, Display};
use tracing::trace;

use crate::error::Error;
use crate::model::DeviceDescriptor;

/// Characters the device pads replies with.
const NOISE: &[char] = &[' ', '%', '\r', '\n'];

/// The acknowledgement text sent in reply to control commands.
pub const ACK: &str = "200 OK";

/// Longest slice of a raw body kept in error messages.
const PREVIEW_LEN: usize = 200;

/// Protocol command names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CommandName {
    ReadDevice,
    QuickRun,
    QuickStop,
}

/// Extra command fields, transmitted alongside `cmd`, `id` and `model`.
pub type Params = Map<String, Value>;

/// Fixed parameter set for `quick_run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickRunParams {
    pub on_type: u32,
    pub off_type: u32,
    pub always_on: u32,
    pub on_time: u32,
    pub off_time: u32,
    pub val_type: u32,
    pub val: u32,
}

impl QuickRunParams {
    /// Switch on and stay on until told otherwise.
    pub const ALWAYS_ON: Self = Self {
        on_type: 0,
        off_type: 0,
        always_on: 1,
        on_time: 0,
        off_time: 0,
        val_type: 0,
        val: 0,
    };

    pub fn into_params(self) -> Params {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Params::new(),
        }
    }
}

/// One decoded reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// The bare `200 OK` acknowledgement.
    Ack,
    /// The `command[0]` object of a JSON reply, every field preserved.
    Body(Map<String, Value>),
}

impl Reply {
    pub fn is_ack(&self) -> bool {
        matches!(self, Self::Ack)
    }
}

#[derive(Serialize)]
struct RequestEnvelope<'a> {
    command: [RequestEntry<'a>; 1],
}

#[derive(Serialize)]
struct RequestEntry<'a> {
    cmd: CommandName,
    id: u64,
    model: crate::model::DeviceModel,
    #[serde(flatten)]
    extra: &'a Params,
}

/// Encode a command for `device` as the request body.
///
/// `params` may not override `cmd`, `id` or `model`; colliding keys are dropped.
pub fn encode(
    command: CommandName,
    device: &DeviceDescriptor,
    params: &Params,
) -> Result<String, Error> {
    let id = device.numeric_id()?;

    let filtered;
    let extra = if ["cmd", "id", "model"].iter().any(|k| params.contains_key(*k)) {
        filtered = params
            .iter()
            .filter(|(k, _)| !matches!(k.as_str(), "cmd" | "id" | "model"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<Params>();
        &filtered
    } else {
        params
    };

    let envelope = RequestEnvelope {
        command: [RequestEntry {
            cmd: command,
            id,
            model: device.model,
            extra,
        }],
    };

    serde_json::to_string(&envelope).map_err(|e| Error::Protocol {
        message: format!("failed to encode {command}: {e}"),
        body: String::new(),
    })
}

/// Strip the padding the device adds around every reply.
pub fn sanitize(raw: &str) -> &str {
    raw.trim_matches(NOISE)
}

/// Decode a raw reply body.
///
/// Text that starts like JSON but fails to parse is a [`Error::Protocol`];
/// anything else that is neither `200 OK` nor `{"command":[{...}]}` is a
/// [`Error::MalformedResponse`].
pub fn decode(raw: &str) -> Result<Reply, Error> {
    let text = sanitize(raw);
    trace!(body = text, "decoding reply");

    if text == ACK {
        return Ok(Reply::Ack);
    }

    if !text.starts_with(['{', '[']) {
        return Err(malformed("neither acknowledgement nor JSON", raw));
    }

    let value: Value = serde_json::from_str(text).map_err(|e| Error::Protocol {
        message: format!("invalid JSON: {e} (body preview: {:?})", preview(text)),
        body: raw.to_owned(),
    })?;

    let entries = match value {
        Value::Object(mut top) => match top.remove("command") {
            Some(Value::Array(entries)) => entries,
            _ => return Err(malformed("missing `command` array", raw)),
        },
        _ => return Err(malformed("top level is not an object", raw)),
    };

    match entries.into_iter().next() {
        Some(Value::Object(fields)) => Ok(Reply::Body(fields)),
        Some(_) => Err(malformed("`command[0]` is not an object", raw)),
        None => Err(malformed("empty `command` array", raw)),
    }
}

fn malformed(reason: &str, raw: &str) -> Error {
    Error::MalformedResponse {
        reason: reason.to_owned(),
        raw: raw.to_owned(),
    }
}

fn preview(text: &str) -> &str {
    match text.char_indices().nth(PREVIEW_LEN) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::model::DeviceModel;

    fn plug() -> DeviceDescriptor {
        DeviceDescriptor::new("10153", DeviceModel::Ac1100)
    }

    #[test]
    fn encodes_read_device() {
        let body = encode(CommandName::ReadDevice, &plug(), &Params::new()).unwrap();
        insta::assert_snapshot!(body, @r#"{"command":[{"cmd":"read_device","id":10153,"model":"AC1100"}]}"#);
    }

    #[test]
    fn encodes_quick_run_with_fixed_params() {
        let valve = DeviceDescriptor::new("7", DeviceModel::Wfc01);
        let body = encode(
            CommandName::QuickRun,
            &valve,
            &QuickRunParams::ALWAYS_ON.into_params(),
        )
        .unwrap();
        let value: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(
            value,
            json!({"command": [{
                "cmd": "quick_run",
                "id": 7,
                "model": "WFC01",
                "on_type": 0,
                "off_type": 0,
                "always_on": 1,
                "on_time": 0,
                "off_time": 0,
                "val_type": 0,
                "val": 0
            }]})
        );
    }

    #[test]
    fn encode_rejects_non_numeric_id() {
        let device = DeviceDescriptor::new("abc", DeviceModel::Ac1100);
        let err = encode(CommandName::QuickStop, &device, &Params::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidId { ref id } if id == "abc"));
    }

    #[test]
    fn encode_ignores_params_that_shadow_identity() {
        let mut params = Params::new();
        params.insert("id".into(), json!(999));
        params.insert("val".into(), json!(3));
        let body = encode(CommandName::QuickRun, &plug(), &params).unwrap();
        let value: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["command"][0]["id"], json!(10153));
        assert_eq!(value["command"][0]["val"], json!(3));
    }

    #[test]
    fn decodes_padded_acknowledgements() {
        for raw in ["200 OK", " 200 OK %\r\n", "%%200 OK", "\r\n200 OK\n", "  % \r200 OK% %"] {
            assert_eq!(decode(raw).unwrap(), Reply::Ack, "raw = {raw:?}");
        }
    }

    #[test]
    fn decode_inverts_encode_on_command_object() {
        let mut params = Params::new();
        params.insert("val".into(), json!(12));
        let body = encode(CommandName::QuickRun, &plug(), &params).unwrap();
        let padded = format!(" {body}%\r\n");

        let Reply::Body(fields) = decode(&padded).unwrap() else {
            panic!("expected a body");
        };
        assert_eq!(
            Value::Object(fields),
            json!({"cmd": "quick_run", "id": 10153, "model": "AC1100", "val": 12})
        );
    }

    #[test]
    fn decode_preserves_unknown_fields() {
        let raw = r#"{"command":[{"model":"WFC01","id":7,"water_status":1,"flow_velocity":"2.5","future_field":{"x":1}}]}%"#;
        let Reply::Body(fields) = decode(raw).unwrap() else {
            panic!("expected a body");
        };
        assert_eq!(fields["future_field"], json!({"x": 1}));
        assert_eq!(fields["water_status"], json!(1));
    }

    #[test]
    fn truncated_json_is_a_protocol_error() {
        let err = decode(r#"{"command":[{"id":1"#).unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }), "got {err:?}");
        assert!(err.is_protocol());
    }

    #[test]
    fn unexpected_shapes_are_malformed() {
        for raw in [
            "hello",
            "500 Internal",
            r#"{"status":"ok"}"#,
            r#"{"command":[]}"#,
            r#"{"command":[1,2]}"#,
            r#"[{"cmd":"read_device"}]"#,
        ] {
            let err = decode(raw).unwrap_err();
            assert!(
                matches!(err, Error::MalformedResponse { raw: ref r, .. } if r == raw),
                "raw = {raw:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn empty_body_is_malformed() {
        assert!(matches!(
            decode(" %\r\n").unwrap_err(),
            Error::MalformedResponse { .. }
        ));
    }
}
