//! JSON bodies and query strings of the REST API.
//!
//! Field names are camelCase on the wire, matching the browser front-end.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
}

/// Raw completion text to format. A missing or empty text formats as the placeholder.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct FormatReq {
    #[serde(default)]
    pub text: Option<String>,
}

/// A reply in both display forms.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FormattedRes {
    pub html: String,
    pub plain_text: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChatRoleDto {
    User,
    Assistant,
}

/// An earlier message of the conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChatTurn {
    pub role: ChatRoleDto,
    /// Plain text, normally `plainText` from an earlier `AskRes`. Tags in assistant turns are
    /// removed before they reach the completion service.
    pub content: String,
}

/// A question plus the conversation so far. The server keeps no session state.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct AskReq {
    pub question: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AskRes {
    pub html: String,
    pub plain_text: String,
    /// `Q: … / A: …` export of the whole conversation including this answer.
    pub transcript: String,
}

/// A base64-encoded image.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
    pub mime_type: String,
    pub data: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct AnalyseReq {
    /// `skin_remedy`, `medicine` or `report`.
    pub kind: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<ImagePayload>,
}

#[derive(Clone, Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HospitalsQuery {
    pub lat: f64,
    pub lon: f64,
    /// Search radius in metres.
    pub radius: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HospitalRes {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub distance_km: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HospitalsRes {
    pub hospitals: Vec<HospitalRes>,
}

#[derive(Clone, Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct RouteQuery {
    pub from_lat: f64,
    pub from_lon: f64,
    pub to_lat: f64,
    pub to_lon: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RouteRes {
    pub points: Vec<LatLon>,
}

#[derive(Clone, Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EmergencyQuery {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FirstAidTipRes {
    pub topic: String,
    pub advice: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EmergencyRes {
    pub call: String,
    pub sms: String,
    pub whatsapp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub tips: Vec<FirstAidTipRes>,
}

/// Health QR form. Every field is optional text except `name`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileReq {
    pub name: String,
    pub dob: String,
    pub gender: String,
    pub blood_group: String,
    pub disease: String,
    pub allergies: String,
    pub address: String,
    pub parent_name: String,
    pub parent_contact: String,
    pub emergency_contact: String,
    pub doctor_name: String,
    pub doctor_contact: String,
}

/// Text to encode into the QR code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct QrRes {
    pub payload: String,
}
