use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::{ConnectInfo, FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName, header};
use chrono::{DateTime, Datelike, NaiveDate, Utc};

/// Who is calling: the requester id the ledger charges redemptions to, plus
/// the browser details stored with a registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub requester_id: String,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

/// Peers whose `X-Forwarded-For` header is believed. Empty by default, so
/// the socket address is the requester id.
#[derive(Debug, Clone, Default)]
pub struct TrustedProxies(Arc<Vec<IpAddr>>);

impl TrustedProxies {
    pub fn new(proxies: Vec<IpAddr>) -> Self {
        Self(Arc::new(proxies))
    }

    pub fn trusts(&self, ip: IpAddr) -> bool {
        self.0.contains(&ip)
    }
}

impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
    TrustedProxies: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let socket_ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let proxies = TrustedProxies::from_ref(state);

        Ok(Self {
            requester_id: requester_id(&parts.headers, socket_ip, &proxies),
            user_agent: header_text(&parts.headers, header::USER_AGENT),
            referrer: header_text(&parts.headers, header::REFERER),
        })
    }
}

/// The socket address, else `unknown`. When the socket peer is a trusted
/// proxy, the nearest `X-Forwarded-For` hop that is not itself trusted.
pub fn requester_id(headers: &HeaderMap, socket_ip: Option<IpAddr>, proxies: &TrustedProxies) -> String {
    let Some(socket_ip) = socket_ip else {
        return "unknown".to_string();
    };
    if !proxies.trusts(socket_ip) {
        return socket_ip.to_string();
    }

    let hops: Vec<&str> = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.split(',').map(str::trim).filter(|hop| !hop.is_empty()).collect())
        .unwrap_or_default();

    hops.iter()
        .rev()
        .find(|hop| !hop.parse::<IpAddr>().is_ok_and(|ip| proxies.trusts(ip)))
        .or(hops.first())
        .map(|hop| hop.to_string())
        .unwrap_or_else(|| socket_ip.to_string())
}

fn header_text(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .filter(|s| !s.is_empty())
}

pub fn country_label(country: &str) -> &str {
    match country {
        "syria" => "سوريا",
        "lebanon" => "لبنان",
        "jordan" => "الأردن",
        "iraq" => "العراق",
        "egypt" => "مصر",
        "saudi" => "السعودية",
        "uae" => "الإمارات",
        "qatar" => "قطر",
        "kuwait" => "الكويت",
        "bahrain" => "البحرين",
        "oman" => "عمان",
        "palestine" => "فلسطين",
        "morocco" => "المغرب",
        "tunisia" => "تونس",
        "algeria" => "الجزائر",
        "libya" => "ليبيا",
        "sudan" => "السودان",
        "yemen" => "اليمن",
        "other" => "أخرى",
        other => other,
    }
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

const ARABIC_MONTHS: [&str; 12] = [
    "يناير", "فبراير", "مارس", "أبريل", "مايو", "يونيو",
    "يوليو", "أغسطس", "سبتمبر", "أكتوبر", "نوفمبر", "ديسمبر",
];

/// `2026-01-15` -> `15 يناير 2026`. Anything unparsable is returned as-is.
pub fn arabic_date(iso_date: &str) -> String {
    match NaiveDate::parse_from_str(iso_date, "%Y-%m-%d") {
        Ok(date) => format!(
            "{} {} {}",
            date.day(),
            ARABIC_MONTHS[date.month0() as usize],
            date.year()
        ),
        Err(_) => iso_date.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn forwarded(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn forwarded_for_ignored_from_untrusted_peer() {
        let headers = forwarded("203.0.113.50");
        let socket = Some("198.51.100.7".parse().unwrap());
        let none = TrustedProxies::default();

        assert_eq!(requester_id(&headers, socket, &none), "198.51.100.7");
        assert_eq!(requester_id(&HeaderMap::new(), socket, &none), "198.51.100.7");
        assert_eq!(requester_id(&headers, None, &none), "unknown");
    }

    #[test]
    fn trusted_proxy_hands_over_nearest_untrusted_hop() {
        let proxies = TrustedProxies::new(vec!["127.0.0.1".parse().unwrap(), "10.0.0.1".parse().unwrap()]);
        let socket = Some("127.0.0.1".parse().unwrap());

        let headers = forwarded("1.2.3.4, 203.0.113.50, 10.0.0.1");
        assert_eq!(requester_id(&headers, socket, &proxies), "203.0.113.50");

        let only_proxies = forwarded("10.0.0.1");
        assert_eq!(requester_id(&only_proxies, socket, &proxies), "10.0.0.1");
        assert_eq!(requester_id(&HeaderMap::new(), socket, &proxies), "127.0.0.1");
    }

    #[test]
    fn dates_in_arabic() {
        assert_eq!(arabic_date("2026-01-15"), "15 يناير 2026");
        assert_eq!(arabic_date("2025-12-15"), "15 ديسمبر 2025");
        assert_eq!(arabic_date("soon"), "soon");
    }

    #[test]
    fn unknown_country_passes_through() {
        assert_eq!(country_label("uae"), "الإمارات");
        assert_eq!(country_label("atlantis"), "atlantis");
    }
}
