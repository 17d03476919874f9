//! Command: the typed form of every request the front end can make.
//!
//! Requests arrive as a method name plus a parameter document. Decoding
//! happens once, here; handlers only ever see a [`Command`]. Unknown method
//! names decode to `None` so the caller can answer `Unimplemented` and let
//! the front end fall through to its next dispatch target.
//!
//! | Group | Methods |
//! |-------|---------|
//! | Properties | `loadProperty`, `saveProperty`, `get*`/`set*` for the well-known keys |
//! | Account | `preLogin`, `login`, `register`, `clearToken` |
//! | Storage | `dataLocal`, `migrate`, `getExtendDirs`, `mkdirs` |
//! | Platform | `verifyAuthentication` |
//! | Nesting | `flatInvoke` |

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::account::RegisterForm;
use crate::properties::keys;

/// Outcome of one command, as seen by the front end.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Value(Value),
    Empty,
    /// No handler knows this method; try the next dispatch target.
    Unimplemented,
    Error(String),
}

impl Reply {
    pub fn value(value: impl Into<Value>) -> Self {
        Reply::Value(value.into())
    }

    /// The `{"success": bool}` shape used by mutating commands.
    pub fn success(ok: bool) -> Self {
        Reply::Value(serde_json::json!({ "success": ok }))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }
}

#[derive(Debug, Error)]
#[error("invalid parameters for '{method}': {source}")]
pub struct DecodeError {
    pub method: String,
    #[source]
    pub source: serde_json::Error,
}

/// Well-known properties with dedicated getter/setter commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKey {
    SwitchAddress,
    ImageSwitchAddress,
    UseApiClientLoadImage,
    Proxy,
    Username,
    Password,
}

impl PropertyKey {
    pub const ALL: [PropertyKey; 6] = [
        PropertyKey::SwitchAddress,
        PropertyKey::ImageSwitchAddress,
        PropertyKey::UseApiClientLoadImage,
        PropertyKey::Proxy,
        PropertyKey::Username,
        PropertyKey::Password,
    ];

    pub fn key(self) -> &'static str {
        match self {
            PropertyKey::SwitchAddress => keys::SWITCH_ADDRESS,
            PropertyKey::ImageSwitchAddress => keys::IMAGE_SWITCH_ADDRESS,
            PropertyKey::UseApiClientLoadImage => keys::USE_API_CLIENT_LOAD_IMAGE,
            PropertyKey::Proxy => keys::PROXY,
            PropertyKey::Username => keys::USERNAME,
            PropertyKey::Password => keys::PASSWORD,
        }
    }

    pub fn default_value(self) -> &'static str {
        match self {
            PropertyKey::UseApiClientLoadImage => "false",
            _ => "",
        }
    }

    fn getter(self) -> &'static str {
        match self {
            PropertyKey::SwitchAddress => "getSwitchAddress",
            PropertyKey::ImageSwitchAddress => "getImageSwitchAddress",
            PropertyKey::UseApiClientLoadImage => "getUseApiClientLoadImage",
            PropertyKey::Proxy => "getProxy",
            PropertyKey::Username => "getUsername",
            PropertyKey::Password => "getPassword",
        }
    }

    fn setter(self) -> &'static str {
        match self {
            PropertyKey::SwitchAddress => "setSwitchAddress",
            PropertyKey::ImageSwitchAddress => "setImageSwitchAddress",
            PropertyKey::UseApiClientLoadImage => "setUseApiClientLoadImage",
            PropertyKey::Proxy => "setProxy",
            PropertyKey::Username => "setUsername",
            PropertyKey::Password => "setPassword",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoadPropertyParams {
    pub name: String,
    #[serde(default, rename = "defaultValue")]
    pub default_value: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SavePropertyParams {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PathParams {
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FlatInvokeParams {
    pub method: String,
    #[serde(default)]
    pub params: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    LoadProperty(LoadPropertyParams),
    SaveProperty(SavePropertyParams),
    GetProperty(PropertyKey),
    /// Setters take the raw parameter string as the value.
    SetProperty(PropertyKey, String),
    PreLogin,
    Login,
    Register(RegisterForm),
    ClearToken,
    DataLocal,
    Migrate(PathParams),
    GetExtendDirs,
    Mkdirs(PathParams),
    VerifyAuthentication,
    FlatInvoke(FlatInvokeParams),
}

impl Command {
    /// Decode a request. `Ok(None)` means the method is not known here.
    pub fn parse(method: &str, params: &str) -> Result<Option<Command>, DecodeError> {
        let doc = || document(method, params);

        let command = match method {
            "loadProperty" => Command::LoadProperty(typed(method, doc()?)?),
            "saveProperty" => Command::SaveProperty(typed(method, doc()?)?),
            "preLogin" => Command::PreLogin,
            "login" => Command::Login,
            "register" => Command::Register(typed(method, doc()?)?),
            "clearToken" => Command::ClearToken,
            "dataLocal" => Command::DataLocal,
            "migrate" => Command::Migrate(typed(method, doc()?)?),
            "getExtendDirs" => Command::GetExtendDirs,
            "mkdirs" => Command::Mkdirs(typed(method, doc()?)?),
            "verifyAuthentication" => Command::VerifyAuthentication,
            "flatInvoke" => Command::FlatInvoke(typed(method, doc()?)?),
            other => {
                if let Some(key) = PropertyKey::ALL.iter().find(|k| k.getter() == other) {
                    Command::GetProperty(*key)
                } else if let Some(key) = PropertyKey::ALL.iter().find(|k| k.setter() == other) {
                    Command::SetProperty(*key, params.to_string())
                } else {
                    return Ok(None);
                }
            }
        };
        Ok(Some(command))
    }

    /// Method name this command answers to.
    pub fn method(&self) -> &'static str {
        match self {
            Command::LoadProperty(_) => "loadProperty",
            Command::SaveProperty(_) => "saveProperty",
            Command::GetProperty(key) => key.getter(),
            Command::SetProperty(key, _) => key.setter(),
            Command::PreLogin => "preLogin",
            Command::Login => "login",
            Command::Register(_) => "register",
            Command::ClearToken => "clearToken",
            Command::DataLocal => "dataLocal",
            Command::Migrate(_) => "migrate",
            Command::GetExtendDirs => "getExtendDirs",
            Command::Mkdirs(_) => "mkdirs",
            Command::VerifyAuthentication => "verifyAuthentication",
            Command::FlatInvoke(_) => "flatInvoke",
        }
    }
}

/// Parse the parameter document; blank means an empty object.
fn document(method: &str, params: &str) -> Result<Value, DecodeError> {
    if params.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(params).map_err(|source| DecodeError {
        method: method.to_string(),
        source,
    })
}

fn typed<T: DeserializeOwned>(method: &str, value: Value) -> Result<T, DecodeError> {
    serde_json::from_value(value).map_err(|source| DecodeError {
        method: method.to_string(),
        source,
    })
}
