//! Emergency shortcuts: ambulance dial, SMS and WhatsApp links, a shareable map link and a
//! few first-aid tips.

use crate::constants::{AMBULANCE_NUMBER, AMBULANCE_WHATSAPP_NUMBER, EMERGENCY_MESSAGE};
use crate::hospitals::GeoPoint;
use crate::{CareError, CareResult};
use serde::Serialize;
use url::Url;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyLinks {
    pub call: String,
    pub sms: String,
    pub whatsapp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct FirstAidTip {
    pub topic: &'static str,
    pub advice: &'static str,
}

const FIRST_AID_TIPS: [FirstAidTip; 3] = [
    FirstAidTip {
        topic: "Heart Attack",
        advice: "Call help, keep the patient calm, give aspirin if available.",
    },
    FirstAidTip {
        topic: "Bleeding",
        advice: "Apply pressure with a clean cloth, keep injured part elevated.",
    },
    FirstAidTip {
        topic: "Burns",
        advice: "Cool with running water, don't apply ice or butter.",
    },
];

pub fn first_aid_tips() -> &'static [FirstAidTip] {
    &FIRST_AID_TIPS
}

/// Link that opens a map centred on `point`.
pub fn map_link(point: GeoPoint) -> String {
    format!("https://www.google.com/maps?q={},{}", point.lat, point.lon)
}

fn with_query(base: &str, key: &str, message: &str) -> CareResult<String> {
    let mut url = Url::parse(base)
        .map_err(|e| CareError::InvalidInput(format!("bad link {base:?}: {e}")))?;
    url.set_query(Some(&format!("{key}={message}")));
    Ok(url.into())
}

/// Build the ambulance links, plus a map link when the caller's location is known.
///
/// # Errors
///
/// Returns `CareError::InvalidInput` if a link cannot be built from the configured numbers.
pub fn emergency_links(location: Option<GeoPoint>) -> CareResult<EmergencyLinks> {
    Ok(EmergencyLinks {
        call: format!("tel:{AMBULANCE_NUMBER}"),
        sms: with_query(&format!("sms:{AMBULANCE_NUMBER}"), "body", EMERGENCY_MESSAGE)?,
        whatsapp: with_query(
            &format!("https://wa.me/{AMBULANCE_WHATSAPP_NUMBER}"),
            "text",
            EMERGENCY_MESSAGE,
        )?,
        location: location.map(map_link),
    })
}
