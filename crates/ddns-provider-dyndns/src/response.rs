//! DynDNS2 response classification
//!
//! The protocol answers `200 OK` for both success and most errors; the
//! verdict is the first word of the body:
//!
//! | body | meaning |
//! |---|---|
//! | `good 1.2.3.4` | record updated |
//! | `nochg 1.2.3.4` | record already current |
//! | `badauth`, `nohost`, `notfqdn`, ... | update refused |

use ddns_core::traits::{UpdateResponse, UpdateStatus};
use ddns_core::{Error, Result};
use std::net::IpAddr;

/// Return codes that mean the provider refused the update
const ERROR_CODES: &[&str] = &[
    "badauth",
    "!donator",
    "notfqdn",
    "nohost",
    "numhost",
    "abuse",
    "badagent",
    "badrequest",
    "badsys",
    "dnserr",
    "911",
    "conflict",
];

/// Classify a provider response
///
/// # Returns
///
/// - `Ok(UpdateResponse)` for 2xx responses that are not a known error code
/// - `Err(Error::UpdateRejected)` for non-2xx responses and DynDNS2 error codes
pub fn classify(status: u16, body: &str) -> Result<UpdateResponse> {
    let body = body.trim();

    if !(200..300).contains(&status) {
        return Err(Error::rejected(status, body));
    }

    // One hostname per request, so only the first line matters
    let line = body.lines().next().unwrap_or_default();
    let mut words = line.split_whitespace();
    let code = words.next().unwrap_or_default();
    let ip = words.next().and_then(|w| w.parse::<IpAddr>().ok());

    let outcome = match code {
        "good" => UpdateStatus::Good { ip },
        "nochg" => UpdateStatus::NoChange { ip },
        c if ERROR_CODES.contains(&c) => return Err(Error::rejected(status, body)),
        _ => {
            tracing::warn!("Unrecognized update response: {:?}", body);
            UpdateStatus::Unrecognized
        }
    };

    Ok(UpdateResponse {
        status,
        body: body.to_string(),
        outcome,
    })
}
