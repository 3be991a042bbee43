//! Stateless HelloVerifyRequest cookies.
//!
//! ```text
//! cookie = HMAC-SHA256(secret, ip ‖ port ‖ ifindex ‖ ch[..=session_id] ‖ ch[after cookie..])
//! ```
//!
//! The cookie binds the client's address and every ClientHello field except the
//! cookie itself. Nothing is stored per client: a second ClientHello carrying the
//! cookie proves the client can receive at its claimed address.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tinyvec::ArrayVec;
use zeroize::Zeroizing;

use crate::message::{cookie_fields, Cookie};
use crate::peer::Session;
use crate::rng::SeededRng;

type HmacSha256 = Hmac<Sha256>;

/// Length of the cookies we hand out.
pub const COOKIE_LEN: usize = 32;

const SECRET_LEN: usize = 32;

type Secret = Zeroizing<[u8; SECRET_LEN]>;

/// The current and previous cookie secret.
pub(crate) struct CookieJar {
    current: Secret,
    previous: Option<Secret>,
    rotated_at: Instant,
    lifetime: Duration,
}

impl CookieJar {
    pub fn new(now: Instant, lifetime: Duration, rng: &mut SeededRng) -> Self {
        CookieJar {
            current: fresh_secret(rng),
            previous: None,
            rotated_at: now,
            lifetime,
        }
    }

    /// Replace the current secret once it is older than the lifetime.
    ///
    /// Cookies made with the replaced secret stay valid for one more lifetime.
    pub fn rotate_if_due(&mut self, now: Instant, rng: &mut SeededRng) {
        if now.saturating_duration_since(self.rotated_at) < self.lifetime {
            return;
        }
        let old = std::mem::replace(&mut self.current, fresh_secret(rng));
        self.previous = Some(old);
        self.rotated_at = now;
        debug!("Rotated cookie secret");
    }

    /// The cookie a ClientHello body from `session` must carry.
    ///
    /// `None` if the body is too short to locate the cookie field.
    pub fn create(&self, session: &Session, client_hello: &[u8]) -> Option<Cookie> {
        let (head, _, tail) = cookie_fields(client_hello)?;
        let tag = mac(&self.current, session, head, tail)?.finalize().into_bytes();
        Cookie::try_new(&tag).ok()
    }

    /// Whether the ClientHello body carries a cookie made by the current or previous secret.
    pub fn verify(&self, session: &Session, client_hello: &[u8]) -> bool {
        let Some((head, cookie, tail)) = cookie_fields(client_hello) else {
            return false;
        };
        if cookie.len() != COOKIE_LEN {
            return false;
        }

        std::iter::once(&self.current)
            .chain(self.previous.as_ref())
            .filter_map(|secret| mac(secret, session, head, tail))
            .any(|m| m.verify_slice(cookie).is_ok())
    }
}

fn fresh_secret(rng: &mut SeededRng) -> Secret {
    let mut secret = Zeroizing::new([0u8; SECRET_LEN]);
    rng.fill(&mut secret[..]);
    secret
}

fn mac(secret: &Secret, session: &Session, head: &[u8], tail: &[u8]) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(&secret[..]).ok()?;
    mac.update(&session_bytes(session));
    mac.update(head);
    mac.update(tail);
    Some(mac)
}

/// `ip ‖ port ‖ ifindex`, at most 16 + 2 + 4 bytes.
fn session_bytes(session: &Session) -> ArrayVec<[u8; 22]> {
    let mut out = ArrayVec::new();
    match session.addr {
        SocketAddr::V4(a) => out.extend_from_slice(&a.ip().octets()),
        SocketAddr::V6(a) => out.extend_from_slice(&a.ip().octets()),
    }
    out.extend_from_slice(&session.addr.port().to_be_bytes());
    out.extend_from_slice(&session.ifindex.to_be_bytes());
    out
}
