use anyhow::{anyhow, Result};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;

type HmacSha256 = Hmac<Sha256>;

/// Tolerated difference between Telegram's clock and ours
pub const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// The `user` object Telegram puts into Mini App init data.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

/// Validate Telegram Mini App init data
///
/// Telegram signs the data with HMAC-SHA256. The HMAC key is derived from the
/// bot token: `HMAC_SHA256("WebAppData", bot_token)`.
///
/// # Arguments
/// * `init_data` - Parameters from Telegram in query string format
/// * `bot_token` - Bot token
/// * `max_age_secs` - Oldest accepted `auth_date`, relative to `now_unix`
/// * `now_unix` - Current time in seconds since the epoch
///
/// # Returns
/// The signed `user` object, or `Err` describing why the data was rejected.
///
/// # Example
/// ```no_run
/// use bellebot::telegram::webapp_auth::validate_telegram_webapp_data;
///
/// let init_data = "query_id=...&user=...&auth_date=...&hash=...";
/// let user = validate_telegram_webapp_data(init_data, "123:ABC", 86_400, 1_700_000_000)?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn validate_telegram_webapp_data(
    init_data: &str,
    bot_token: &str,
    max_age_secs: i64,
    now_unix: i64,
) -> Result<TelegramUser> {
    let params = parse_params(init_data);

    let received_hash = params.get("hash").ok_or_else(|| anyhow!("Missing hash parameter"))?;
    let received_hash = hex::decode(received_hash).map_err(|_| anyhow!("Malformed hash parameter"))?;

    let mac = signature(&params, bot_token)?;
    mac.verify_slice(&received_hash)
        .map_err(|_| anyhow!("Invalid hash - data may be tampered"))?;

    let auth_date = params
        .get("auth_date")
        .and_then(|value| value.parse::<i64>().ok())
        .ok_or_else(|| anyhow!("Missing auth_date parameter"))?;
    if auth_date > now_unix + MAX_CLOCK_SKEW_SECS {
        return Err(anyhow!("Init data is dated in the future ({})", auth_date));
    }
    let age_seconds = now_unix - auth_date;
    if age_seconds > max_age_secs {
        return Err(anyhow!("Init data is too old ({} seconds)", age_seconds));
    }

    let user_json = params.get("user").ok_or_else(|| anyhow!("Missing user parameter"))?;
    let user: TelegramUser =
        serde_json::from_str(user_json).map_err(|e| anyhow!("Failed to parse user JSON: {}", e))?;

    Ok(user)
}

/// Build signed init data the way Telegram does. Used by tests and local tools.
pub fn sign_init_data(fields: &[(&str, &str)], bot_token: &str) -> Result<String> {
    let params: HashMap<String, String> = fields
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    let hash = hex::encode(signature(&params, bot_token)?.finalize().into_bytes());

    let mut query: Vec<String> = fields
        .iter()
        .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
        .collect();
    query.push(format!("hash={}", hash));
    Ok(query.join("&"))
}

fn parse_params(init_data: &str) -> HashMap<String, String> {
    init_data
        .split('&')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            match (parts.next(), parts.next()) {
                (Some(key), Some(value)) => {
                    let decoded_value = urlencoding::decode(value).ok()?;
                    Some((key.to_string(), decoded_value.into_owned()))
                }
                _ => None,
            }
        })
        .collect()
}

/// HMAC over the data check string: every parameter except `hash`, as
/// `key=value` lines sorted by key.
fn signature(params: &HashMap<String, String>, bot_token: &str) -> Result<HmacSha256> {
    let mut check_pairs: Vec<String> = params
        .iter()
        .filter(|(key, _)| key.as_str() != "hash")
        .map(|(key, value)| format!("{}={}", key, value))
        .collect();
    check_pairs.sort();
    let data_check_string = check_pairs.join("\n");

    let mut secret_key_mac =
        HmacSha256::new_from_slice(b"WebAppData").map_err(|e| anyhow!("Invalid HMAC key: {}", e))?;
    secret_key_mac.update(bot_token.as_bytes());
    let secret_key = secret_key_mac.finalize().into_bytes();

    let mut mac = HmacSha256::new_from_slice(&secret_key).map_err(|e| anyhow!("Invalid HMAC key: {}", e))?;
    mac.update(data_check_string.as_bytes());
    Ok(mac)
}
