//! Wire types for the class-manager backend.
//!
//! Field names mirror the backend JSON byte-for-byte; anything that would
//! collide with Rust naming is mapped with `serde(rename)`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Generic response envelope wrapping every backend payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Envelope<T> {
    /// Status code; `1` means success on the auth endpoints.
    #[serde(default)]
    pub code: Option<i64>,
    /// Human-readable status message.
    #[serde(default)]
    pub msg: Option<String>,
    /// Payload, absent on failure.
    #[serde(default)]
    pub data: Option<T>,
}

/// QR login ticket issued by the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct QrTicket {
    /// Opaque ticket used to build the scannable URL.
    pub ticket: String,
    /// Random nonce that keys the login-status poll.
    pub random: String,
}

impl QrTicket {
    /// URL the operator scans (or opens) to approve the session.
    #[must_use]
    pub fn scan_url(&self) -> String {
        format!(
            "https://mp.weixin.qq.com/cgi-bin/showqrcode?ticket={}",
            self.ticket
        )
    }
}

/// One child bound to the authenticated account.
#[derive(Debug, Clone, Deserialize)]
pub struct Child {
    /// Member id used to scope record and class lookups.
    pub member_id: String,
}

/// `getUserChildInfoApp` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ChildContext {
    #[serde(rename = "childList", default)]
    pub child_list: Vec<Child>,
}

/// One entry from the paginated record list.
///
/// The `type` discriminant selects the normalization algorithm; the
/// kind-specific payload (`score`, `heads` + `student_infos`) is only
/// present for the kinds that carry it.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordSummary {
    /// Record kind discriminant (0 roster, 4 score sheet, 15 info sheet).
    #[serde(rename = "type")]
    pub kind: i64,
    /// Owning class id.
    pub cls: String,
    /// Record title as shown in the app.
    pub title: String,
    /// Creator display name.
    #[serde(default)]
    pub creator_wx_name: String,
    /// Creator openid; doubles as the imprint for score-detail calls.
    #[serde(default)]
    pub creator_wx_openid: String,
    /// Score-sheet id (kind 4 only).
    #[serde(default)]
    pub score: Option<String>,
    /// Attached column headers (kind 15 only).
    #[serde(default)]
    pub heads: Option<Vec<String>>,
    /// Attached per-student detail (kind 15 only).
    #[serde(default)]
    pub student_infos: Option<Vec<StudentInfoEntry>>,
}

/// Per-student detail row attached to a student-info sheet.
#[derive(Debug, Clone, Deserialize)]
pub struct StudentInfoEntry {
    /// Student's own name.
    pub name: String,
    /// Positionally aligned with the sheet's `heads`.
    #[serde(default)]
    pub infos: Vec<InfoCell>,
}

/// One filled-in cell of a student-info sheet.
#[derive(Debug, Clone, Deserialize)]
pub struct InfoCell {
    /// Most recent value the family submitted; absent means blank.
    #[serde(default)]
    pub last_value: Option<Value>,
}

/// Class id/name pair from `getClassByMemberId`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassInfo {
    #[serde(rename = "_id")]
    pub id: String,
    pub class_name: String,
}

/// `getClassById` payload down to the roster names.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassDetail {
    pub class: ClassBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassBody {
    #[serde(default)]
    pub rosters: Vec<RosterName>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RosterName {
    pub name: String,
}

/// One member of a class (teacher or student) from the member dump.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassMember {
    /// Member's own name.
    pub name: String,
    #[serde(default)]
    pub phone: Option<Value>,
    /// Displayed chat name.
    #[serde(default)]
    pub wx_name: Option<String>,
    /// Avatar reference.
    #[serde(default)]
    pub avatar: Option<String>,
    /// Teaching role (subject); absent or empty means the member is a
    /// student.
    #[serde(default)]
    pub identity: Option<String>,
    /// Family/guardian contacts declared by the member.
    #[serde(default)]
    pub parents: Vec<GuardianContact>,
}

impl ClassMember {
    /// Teaching role, with the empty-string sentinel collapsed to `None`.
    #[must_use]
    pub fn teaching_role(&self) -> Option<&str> {
        self.identity.as_deref().filter(|role| !role.is_empty())
    }
}

/// Guardian contact attached to a class member.
#[derive(Debug, Clone, Deserialize)]
pub struct GuardianContact {
    #[serde(default)]
    pub phone: Option<Value>,
    #[serde(default)]
    pub wx_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// `getStudentScoreById` payload down to the per-subject list.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoreDetailBody {
    #[serde(rename = "studentScore")]
    pub student_score: StudentScore,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StudentScore {
    #[serde(default)]
    pub score_detail: Vec<ScoreEntry>,
}

/// One subject/score pair for one student.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoreEntry {
    pub subject: String,
    /// Scores arrive as strings or bare numbers depending on the sheet.
    pub score: Value,
}

/// Request body shared by the two auth endpoints.
#[derive(Debug, Serialize)]
pub struct AuthPayload<'a> {
    pub channel: &'a str,
    pub platform: &'a str,
    pub app_info: AppInfo<'a>,
    pub device_info: DeviceInfo<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub random: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct AppInfo<'a> {
    pub app_vcode: &'a str,
    pub app_vname: &'a str,
}

#[derive(Debug, Serialize)]
pub struct DeviceInfo<'a> {
    pub network_type: &'a str,
}

impl<'a> AuthPayload<'a> {
    /// Payload for the two auth endpoints; `random` is only sent when
    /// polling login status.
    #[must_use]
    pub fn new(random: Option<&'a str>) -> Self {
        Self {
            channel: "app_web",
            platform: "app",
            app_info: AppInfo {
                app_vcode: "734",
                app_vname: "3.0.8",
            },
            device_info: DeviceInfo {
                network_type: "WiFi",
            },
            random,
        }
    }
}

/// Render a scalar JSON value the way it should appear in a cell.
#[must_use]
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
