//! Rate Limiter fuer Anmeldeversuche
//!
//! Token-Bucket pro Client-IP fuer `/register` und `/login`. Die IP ist die
//! Peer-Adresse der TCP-Verbindung; `x-forwarded-for` zaehlt nur, wenn die
//! Verbindung von einem konfigurierten Proxy kommt.

use std::{
    collections::HashMap,
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use parking_lot::Mutex;

use crate::error::ApiFehler;

/// Buckets ohne Aktivitaet werden nach dieser Zeit verworfen
const INAKTIV_SCHWELLE: Duration = Duration::from_secs(5 * 60);

/// Konfiguration fuer den Rate Limiter
#[derive(Debug, Clone)]
pub struct RateLimitKonfig {
    /// Maximale Anmeldeversuche pro Minute pro IP
    pub anfragen_pro_minute_ip: u32,
    /// Reverse-Proxys, deren `x-forwarded-for` uebernommen wird
    pub vertrauenswuerdige_proxys: Vec<IpAddr>,
}

impl Default for RateLimitKonfig {
    fn default() -> Self {
        Self {
            anfragen_pro_minute_ip: 10,
            vertrauenswuerdige_proxys: Vec::new(),
        }
    }
}

/// Ein Token-Bucket fuer eine einzelne IP
#[derive(Debug)]
struct TokenBucket {
    /// Aktuelle Token-Anzahl (als f64 fuer Bruchteil-Auffuellung)
    token: f64,
    max_token: f64,
    /// Auffuellrate in Token pro Sekunde
    fuellrate: f64,
    letzte_auffuellung: Instant,
}

impl TokenBucket {
    fn neu(max_anfragen_pro_minute: u32) -> Self {
        let max = f64::from(max_anfragen_pro_minute.max(1));
        Self {
            token: max,
            max_token: max,
            fuellrate: max / 60.0,
            letzte_auffuellung: Instant::now(),
        }
    }

    /// Versucht ein Token zu verbrauchen. Gibt `true` zurueck wenn erlaubt.
    fn verbrauchen(&mut self) -> bool {
        self.auffuellen();
        if self.token >= 1.0 {
            self.token -= 1.0;
            true
        } else {
            false
        }
    }

    /// Sekunden bis zum naechsten verfuegbaren Token
    fn retry_after_secs(&mut self) -> u64 {
        self.auffuellen();
        let fehlend = 1.0 - self.token;
        if fehlend <= 0.0 {
            return 0;
        }
        (fehlend / self.fuellrate).ceil() as u64
    }

    fn auffuellen(&mut self) {
        let jetzt = Instant::now();
        let vergangen = jetzt.duration_since(self.letzte_auffuellung).as_secs_f64();
        self.token = (self.token + vergangen * self.fuellrate).min(self.max_token);
        self.letzte_auffuellung = jetzt;
    }
}

/// Rate Limiter mit Token-Bucket-Algorithmus pro IP
pub struct RateLimiter {
    konfig: RateLimitKonfig,
    ip_buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl RateLimiter {
    pub fn neu(konfig: RateLimitKonfig) -> Arc<Self> {
        Arc::new(Self {
            konfig,
            ip_buckets: Mutex::new(HashMap::new()),
        })
    }

    /// Prueft und verbraucht ein Token fuer eine IP-Adresse.
    ///
    /// Gibt `Ok(())` zurueck wenn erlaubt, `Err(retry_after_secs)` sonst.
    pub fn pruefe_ip(&self, ip: &str) -> Result<(), u64> {
        let mut buckets = self.ip_buckets.lock();
        let bucket = buckets
            .entry(ip.to_string())
            .or_insert_with(|| TokenBucket::neu(self.konfig.anfragen_pro_minute_ip));
        if bucket.verbrauchen() {
            Ok(())
        } else {
            Err(bucket.retry_after_secs())
        }
    }

    /// Entfernt inaktive Buckets und gibt deren Anzahl zurueck
    pub fn bereinigen(&self) -> usize {
        let jetzt = Instant::now();
        let mut buckets = self.ip_buckets.lock();
        let vorher = buckets.len();
        buckets.retain(|_, b| jetzt.duration_since(b.letzte_auffuellung) < INAKTIV_SCHWELLE);
        vorher - buckets.len()
    }
}

impl RateLimiter {
    /// Ermittelt die IP, nach der gedrosselt wird
    ///
    /// Ohne Peer-Adresse (z.B. Router ohne Connect-Info) landen alle
    /// Anfragen im Bucket `unknown`.
    pub fn client_ip(&self, peer: Option<IpAddr>, headers: &HeaderMap) -> String {
        let Some(peer) = peer else {
            return "unknown".to_string();
        };
        if !self.ist_vertrauenswuerdig(peer) {
            return peer.to_string();
        }
        weitergeleitete_ip(headers, |ip| self.ist_vertrauenswuerdig(ip))
            .unwrap_or(peer)
            .to_string()
    }

    fn ist_vertrauenswuerdig(&self, ip: IpAddr) -> bool {
        self.konfig.vertrauenswuerdige_proxys.contains(&ip)
    }
}

/// Rechtester Eintrag in `x-forwarded-for`, der kein eigener Proxy ist.
/// Weiter links stehende Eintraege kann der Client frei setzen.
fn weitergeleitete_ip(
    headers: &HeaderMap,
    ist_proxy: impl Fn(IpAddr) -> bool,
) -> Option<IpAddr> {
    let mut eintraege = Vec::new();
    for wert in headers.get_all("x-forwarded-for") {
        let text = wert.to_str().ok()?;
        eintraege.extend(text.split(',').map(str::trim));
    }
    for eintrag in eintraege.into_iter().rev() {
        let ip: IpAddr = eintrag.parse().ok()?;
        if !ist_proxy(ip) {
            return Some(ip);
        }
    }
    None
}

/// Axum-Middleware: Rate Limiting per IP
pub async fn anmeldung_drosseln(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request,
    next: Next,
) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let ip = limiter.client_ip(peer, req.headers());
    match limiter.pruefe_ip(&ip) {
        Ok(()) => next.run(req).await,
        Err(retry_after_secs) => {
            tracing::debug!(%ip, retry_after_secs, "Anmeldeversuch gedrosselt");
            ApiFehler::RateLimit { retry_after_secs }.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn token_bucket_erlaubt_anfragen_bis_limit() {
        let mut bucket = TokenBucket::neu(5);
        for _ in 0..5 {
            assert!(bucket.verbrauchen(), "Anfrage sollte erlaubt sein");
        }
        assert!(!bucket.verbrauchen(), "6. Anfrage sollte abgelehnt werden");
    }

    #[test]
    fn verschiedene_ips_unabhaengig() {
        let limiter = RateLimiter::neu(RateLimitKonfig {
            anfragen_pro_minute_ip: 1,
            ..Default::default()
        });

        assert!(limiter.pruefe_ip("192.168.1.1").is_ok());
        assert!(limiter.pruefe_ip("192.168.1.2").is_ok());
        let ergebnis = limiter.pruefe_ip("192.168.1.1");
        assert!(ergebnis.is_err());
        assert!(ergebnis.unwrap_err() > 0);
    }

    #[test]
    fn auffuellung_nach_zeit() {
        // 60 Anfragen/Minute = 1/Sekunde
        let mut bucket = TokenBucket::neu(60);
        for _ in 0..60 {
            bucket.verbrauchen();
        }
        bucket.letzte_auffuellung = Instant::now() - Duration::from_secs(2);
        assert!(bucket.verbrauchen(), "Nach 2 Sekunden sollte 1 Token verfuegbar sein");
    }

    #[test]
    fn bereinigen_entfernt_inaktive() {
        let limiter = RateLimiter::neu(RateLimitKonfig::default());
        limiter.pruefe_ip("10.0.0.1").unwrap();
        limiter.pruefe_ip("10.0.0.2").unwrap();
        if let Some(b) = limiter.ip_buckets.lock().get_mut("10.0.0.1") {
            b.letzte_auffuellung = Instant::now() - Duration::from_secs(10 * 60);
        }
        assert_eq!(limiter.bereinigen(), 1);
    }

    fn ip(s: &str) -> Option<IpAddr> {
        Some(s.parse().unwrap())
    }

    fn xff(wert: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(wert));
        headers
    }

    #[test]
    fn ohne_proxy_zaehlt_nur_die_peer_adresse() {
        let limiter = RateLimiter::neu(RateLimitKonfig::default());
        assert_eq!(
            limiter.client_ip(ip("203.0.113.7"), &xff("1.2.3.4")),
            "203.0.113.7"
        );
        assert_eq!(limiter.client_ip(None, &xff("1.2.3.4")), "unknown");
    }

    #[test]
    fn x_forwarded_for_nur_vom_vertrauenswuerdigen_proxy() {
        let limiter = RateLimiter::neu(RateLimitKonfig {
            vertrauenswuerdige_proxys: vec!["10.0.0.1".parse().unwrap()],
            ..Default::default()
        });
        let proxy = ip("10.0.0.1");

        // Der Client hat "1.2.3.4" selbst vorangestellt; der Proxy haengt die echte IP an
        assert_eq!(
            limiter.client_ip(proxy, &xff("1.2.3.4, 198.51.100.9")),
            "198.51.100.9"
        );
        // Ohne Header gilt der Proxy selbst
        assert_eq!(limiter.client_ip(proxy, &HeaderMap::new()), "10.0.0.1");
        // Unlesbarer Eintrag faellt auf den Proxy zurueck
        assert_eq!(limiter.client_ip(proxy, &xff("kaputt")), "10.0.0.1");
        // Andere Peers duerfen den Header nicht setzen
        assert_eq!(
            limiter.client_ip(ip("203.0.113.7"), &xff("198.51.100.9")),
            "203.0.113.7"
        );
    }

    #[test]
    fn proxy_ketten_werden_uebersprungen() {
        let limiter = RateLimiter::neu(RateLimitKonfig {
            vertrauenswuerdige_proxys: vec![
                "10.0.0.1".parse().unwrap(),
                "10.0.0.2".parse().unwrap(),
            ],
            ..Default::default()
        });
        assert_eq!(
            limiter.client_ip(ip("10.0.0.1"), &xff("198.51.100.9, 10.0.0.2")),
            "198.51.100.9"
        );
    }
}
