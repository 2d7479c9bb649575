//! Command and event vocabulary.
//!
//! Application frames are objects of the form
//! `{"cmd": ..., "nonce": ..., "args": {...}, "evt": ...}`. Requests carry a
//! fresh nonce; the peer echoes it in the response. Unsolicited events arrive
//! with `"cmd": "DISPATCH"` and the event name in `evt`.

use std::fmt;

use crate::core::value::{Map, Value};
use crate::error::Result;
use crate::utils::nonce::generate_nonce;

/// Command names
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    Dispatch,
    Authorize,
    Subscribe,
    Unsubscribe,
    SetActivity,
    SendActivityJoinInvite,
    CloseActivityRequest,
    Other(String),
}

impl Command {
    pub fn as_str(&self) -> &str {
        match self {
            Command::Dispatch => "DISPATCH",
            Command::Authorize => "AUTHORIZE",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::SetActivity => "SET_ACTIVITY",
            Command::SendActivityJoinInvite => "SEND_ACTIVITY_JOIN_INVITE",
            Command::CloseActivityRequest => "CLOSE_ACTIVITY_REQUEST",
            Command::Other(name) => name,
        }
    }
}

impl From<&str> for Command {
    fn from(name: &str) -> Self {
        match name {
            "DISPATCH" => Command::Dispatch,
            "AUTHORIZE" => Command::Authorize,
            "SUBSCRIBE" => Command::Subscribe,
            "UNSUBSCRIBE" => Command::Unsubscribe,
            "SET_ACTIVITY" => Command::SetActivity,
            "SEND_ACTIVITY_JOIN_INVITE" => Command::SendActivityJoinInvite,
            "CLOSE_ACTIVITY_REQUEST" => Command::CloseActivityRequest,
            other => Command::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event names
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Event {
    Ready,
    Error,
    ActivityJoin,
    ActivityJoinRequest,
    ActivitySpectate,
    Other(String),
}

impl Event {
    pub fn as_str(&self) -> &str {
        match self {
            Event::Ready => "READY",
            Event::Error => "ERROR",
            Event::ActivityJoin => "ACTIVITY_JOIN",
            Event::ActivityJoinRequest => "ACTIVITY_JOIN_REQUEST",
            Event::ActivitySpectate => "ACTIVITY_SPECTATE",
            Event::Other(name) => name,
        }
    }
}

impl From<&str> for Event {
    fn from(name: &str) -> Self {
        match name {
            "READY" => Event::Ready,
            "ERROR" => Event::Error,
            "ACTIVITY_JOIN" => Event::ActivityJoin,
            "ACTIVITY_JOIN_REQUEST" => Event::ActivityJoinRequest,
            "ACTIVITY_SPECTATE" => Event::ActivitySpectate,
            other => Event::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An application frame body
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    pub cmd: Command,
    pub nonce: Option<String>,
    pub args: Option<Value>,
    pub evt: Option<Event>,
}

impl CommandRequest {
    /// Request for `cmd` with a fresh nonce and no arguments
    pub fn new(cmd: Command) -> Self {
        Self {
            cmd,
            nonce: Some(generate_nonce()),
            args: None,
            evt: None,
        }
    }

    pub fn with_args(mut self, args: impl Into<Value>) -> Self {
        self.args = Some(args.into());
        self
    }

    pub fn with_event(mut self, evt: Event) -> Self {
        self.evt = Some(evt);
        self
    }

    /// `SET_ACTIVITY` for process `pid`; `None` clears the presence.
    pub fn set_activity(pid: u32, activity: Option<Value>) -> Self {
        let mut args = Map::new();
        args.insert("pid".to_string(), Value::from(i64::from(pid)));
        if let Some(activity) = activity {
            args.insert("activity".to_string(), activity);
        }
        Self::new(Command::SetActivity).with_args(args)
    }

    /// `SUBSCRIBE` to an event
    pub fn subscribe(evt: Event) -> Self {
        Self::new(Command::Subscribe).with_args(Value::object()).with_event(evt)
    }

    /// `UNSUBSCRIBE` from an event
    pub fn unsubscribe(evt: Event) -> Self {
        Self::new(Command::Unsubscribe).with_args(Value::object()).with_event(evt)
    }

    /// Accept (`SEND_ACTIVITY_JOIN_INVITE`) or decline
    /// (`CLOSE_ACTIVITY_REQUEST`) a join request from `user_id`.
    pub fn join_reply(user_id: &str, accept: bool) -> Self {
        let cmd = if accept {
            Command::SendActivityJoinInvite
        } else {
            Command::CloseActivityRequest
        };
        let mut args = Map::new();
        args.insert("user_id".to_string(), Value::from(user_id));
        Self::new(cmd).with_args(args)
    }

    pub fn to_value(&self) -> Value {
        let mut body = Map::new();
        body.insert("cmd".to_string(), Value::from(self.cmd.as_str()));
        if let Some(nonce) = &self.nonce {
            body.insert("nonce".to_string(), Value::from(nonce.as_str()));
        }
        if let Some(args) = &self.args {
            body.insert("args".to_string(), args.clone());
        }
        if let Some(evt) = &self.evt {
            body.insert("evt".to_string(), Value::from(evt.as_str()));
        }
        Value::Object(body)
    }

    /// Decode an application frame body.
    ///
    /// `cmd` is required. `nonce` and `evt` are optional and may be `null`.
    pub fn from_value(body: &Value) -> Result<Self> {
        let cmd = Command::from(body.at("cmd")?.get_as::<String>()?.as_str());
        let nonce = optional_str(body, "nonce")?.map(str::to_string);
        let evt = optional_str(body, "evt")?.map(Event::from);
        let args = body.safe_at("args").cloned();
        Ok(Self { cmd, nonce, args, evt })
    }
}

fn optional_str<'a>(body: &'a Value, key: &str) -> Result<Option<&'a str>> {
    match body.safe_at(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => Ok(Some(value.get_as::<String>()?.as_str())),
    }
}

/// Whether an inbound body is dispatch-class (`"cmd": "DISPATCH"`).
pub fn is_dispatch(body: &Value) -> bool {
    body.safe_at("cmd").and_then(Value::as_str) == Some(Command::Dispatch.as_str())
}

/// Routing key of an inbound body: its event name, else its command name.
pub fn route_key(body: &Value) -> Option<&str> {
    body.safe_at("evt")
        .and_then(Value::as_str)
        .or_else(|| body.safe_at("cmd").and_then(Value::as_str))
}
