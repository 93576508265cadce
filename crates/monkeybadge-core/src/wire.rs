//! JSON bodies exchanged between badges and the game server.

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::badge::IrId;

/// Header carrying a badge's token.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Header carrying the admin secret.
pub const ADMIN_KEY_HEADER: &str = "X-Admin-Key";

/// Endpoint paths, shared by the server router and the badge client.
pub mod endpoints {
    pub const REGISTER: &str = "/register";
    pub const CHECKIN: &str = "/checkin";
    pub const CHANGE_HANDLE: &str = "/changehandle";
    pub const INTRO_COMPLETE: &str = "/introcomplete";
    pub const DELETE_BADGE: &str = "/deletebadge";
    pub const FRIEND_REQUEST: &str = "/friendrequest";
    pub const HIDDEN_OBJECT: &str = "/hiddenobject";
    pub const MONKEY_SEE: &str = "/monkeysee";
    pub const GENERATE_HANDLE: &str = "/generate_handle";
    pub const START_THE_INTRO: &str = "/start_the_intro";
    pub const MONKEY_MODE: &str = "/monkeymode";
    pub const SCOREBOARD: &str = "/scoreboard";
    pub const HEALTH: &str = "/health";
}

/// POST /register. `token` is only sent when a badge re-registers after the
/// server lost its document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(rename = "myUUID")]
    pub my_uuid: Uuid,
    pub key: String,
    #[serde(default)]
    pub handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Body of every per-badge call that only names the acting badge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadgeRequest {
    #[serde(rename = "myUUID")]
    pub my_uuid: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeHandleRequest {
    #[serde(rename = "myUUID")]
    pub my_uuid: Uuid,
    pub handle: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendRequest {
    #[serde(rename = "myUUID")]
    pub my_uuid: Uuid,
    #[serde(rename = "remoteIRID", deserialize_with = "ir_id_lenient")]
    pub remote_ir_id: IrId,
}

/// POST /hiddenobject and /monkeysee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectClaimRequest {
    #[serde(rename = "myUUID")]
    pub my_uuid: Uuid,
    #[serde(rename = "objectid", deserialize_with = "ir_id_lenient")]
    pub object_id: IrId,
}

/// POST /monkeymode. `monkeyid` picks the beacon to impersonate when the flag
/// is switched on; it is ignored when switching off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonkeyModeRequest {
    #[serde(rename = "myUUID")]
    pub my_uuid: Uuid,
    #[serde(rename = "monkeyid", default)]
    pub monkey_id: Option<IrId>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IntroSwitchResponse {
    pub intro_started: bool,
}

/// Error body for 4xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Body of a 208 "already done" response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlreadyDoneBody {
    pub detail: String,
}

/// Accept IR ids sent either as numbers or as decimal strings; older badge
/// firmware stringifies them.
fn ir_id_lenient<'de, D>(deserializer: D) -> Result<IrId, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrString {
        Num(IrId),
        Str(String),
    }

    match NumOrString::deserialize(deserializer)? {
        NumOrString::Num(n) => Ok(n),
        NumOrString::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
