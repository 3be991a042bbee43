use std::time::Duration;

use crate::crypto::{rust_crypto, CryptoProvider};
use crate::message::CipherSuite;
use crate::Error;

/// Smallest MTU that still fits a ServerHello flight with a raw public key.
const MIN_MTU: usize = 256;

/// DTLS configuration
#[derive(Clone)]
pub struct Config {
    mtu: usize,
    max_peers: usize,
    flight_start_rto: Duration,
    flight_retries: usize,
    cookie_lifetime: Duration,
    cipher_suites: Vec<CipherSuite>,
    require_client_certificate: bool,
    session_tickets: bool,
    ticket_lifetime: Duration,
    renegotiation: bool,
    psk_identity_hint: Option<Vec<u8>>,
    rng_seed: Option<u64>,
    crypto_provider: CryptoProvider,
}

impl Config {
    /// Create a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            mtu: 1150,
            max_peers: 16,
            flight_start_rto: Duration::from_secs(1),
            flight_retries: 4,
            cookie_lifetime: Duration::from_secs(3600),
            cipher_suites: CipherSuite::all().to_vec(),
            require_client_certificate: true,
            session_tickets: true,
            ticket_lifetime: Duration::from_secs(86400),
            renegotiation: true,
            psk_identity_hint: None,
            rng_seed: None,
            crypto_provider: None,
        }
    }

    /// Max transmission unit.
    ///
    /// The largest size UDP packets we will produce.
    #[inline(always)]
    pub fn mtu(&self) -> usize {
        self.mtu
    }

    /// Max number of concurrent peers, and of cached client tickets.
    #[inline(always)]
    pub fn max_peers(&self) -> usize {
        self.max_peers
    }

    /// Time of first retry.
    ///
    /// Every flight restarts with this value.
    /// Doubled for every retry with a ±25% jitter.
    #[inline(always)]
    pub fn flight_start_rto(&self) -> Duration {
        self.flight_start_rto
    }

    /// Max number of retries per flight.
    #[inline(always)]
    pub fn flight_retries(&self) -> usize {
        self.flight_retries
    }

    /// How long a cookie secret is current before it is rotated.
    ///
    /// Cookies made with the previous secret are still accepted.
    #[inline(always)]
    pub fn cookie_lifetime(&self) -> Duration {
        self.cookie_lifetime
    }

    /// Cipher suites in preference order.
    #[inline(always)]
    pub fn cipher_suites(&self) -> &[CipherSuite] {
        &self.cipher_suites
    }

    /// For a server, require a client certificate in ECDHE-ECDSA handshakes.
    ///
    /// This will cause the server to send a CertificateRequest message.
    #[inline(always)]
    pub fn require_client_certificate(&self) -> bool {
        self.require_client_certificate
    }

    /// Whether session tickets are issued (server) and presented (client).
    #[inline(always)]
    pub fn session_tickets(&self) -> bool {
        self.session_tickets
    }

    /// Ticket lifetime, also sent as the lifetime hint.
    #[inline(always)]
    pub fn ticket_lifetime(&self) -> Duration {
        self.ticket_lifetime
    }

    /// Whether a server accepts renegotiation from connected clients.
    #[inline(always)]
    pub fn renegotiation(&self) -> bool {
        self.renegotiation
    }

    /// PSK identity hint a server sends in ServerKeyExchange.
    #[inline(always)]
    pub fn psk_identity_hint(&self) -> Option<&[u8]> {
        self.psk_identity_hint.as_deref()
    }

    /// Seed for deterministic randomness. Tests only.
    #[inline(always)]
    pub fn rng_seed(&self) -> Option<u64> {
        self.rng_seed
    }

    /// Cryptographic provider.
    ///
    /// Provides cipher, key exchange, signing and verification.
    #[inline(always)]
    pub fn crypto_provider(&self) -> &CryptoProvider {
        &self.crypto_provider
    }
}

/// Builder for DTLS configuration.
pub struct ConfigBuilder {
    mtu: usize,
    max_peers: usize,
    flight_start_rto: Duration,
    flight_retries: usize,
    cookie_lifetime: Duration,
    cipher_suites: Vec<CipherSuite>,
    require_client_certificate: bool,
    session_tickets: bool,
    ticket_lifetime: Duration,
    renegotiation: bool,
    psk_identity_hint: Option<Vec<u8>>,
    rng_seed: Option<u64>,
    crypto_provider: Option<CryptoProvider>,
}

impl ConfigBuilder {
    /// Set the max transmission unit (MTU).
    ///
    /// Defaults to 1150.
    pub fn mtu(mut self, mtu: usize) -> Self {
        self.mtu = mtu;
        self
    }

    /// Set the max number of concurrent peers.
    ///
    /// Defaults to 16.
    pub fn max_peers(mut self, max_peers: usize) -> Self {
        self.max_peers = max_peers;
        self
    }

    /// Set the time of first retry.
    ///
    /// Defaults to 1 second.
    pub fn flight_start_rto(mut self, rto: Duration) -> Self {
        self.flight_start_rto = rto;
        self
    }

    /// Set the max number of retries per flight.
    ///
    /// Defaults to 4.
    pub fn flight_retries(mut self, retries: usize) -> Self {
        self.flight_retries = retries;
        self
    }

    /// Set the cookie secret rotation interval.
    ///
    /// Defaults to 1 hour.
    pub fn cookie_lifetime(mut self, lifetime: Duration) -> Self {
        self.cookie_lifetime = lifetime;
        self
    }

    /// Set the offered/accepted cipher suites in preference order.
    ///
    /// Defaults to ECDHE-ECDSA then PSK.
    pub fn cipher_suites(mut self, suites: &[CipherSuite]) -> Self {
        self.cipher_suites = suites.to_vec();
        self
    }

    /// Set whether to require a client certificate (for servers).
    ///
    /// Defaults to true.
    pub fn require_client_certificate(mut self, require: bool) -> Self {
        self.require_client_certificate = require;
        self
    }

    /// Set whether session tickets are used.
    ///
    /// Defaults to true.
    pub fn session_tickets(mut self, enabled: bool) -> Self {
        self.session_tickets = enabled;
        self
    }

    /// Set the ticket lifetime.
    ///
    /// Defaults to one day.
    pub fn ticket_lifetime(mut self, lifetime: Duration) -> Self {
        self.ticket_lifetime = lifetime;
        self
    }

    /// Set whether a server accepts renegotiation.
    ///
    /// Defaults to true.
    pub fn renegotiation(mut self, enabled: bool) -> Self {
        self.renegotiation = enabled;
        self
    }

    /// Set the PSK identity hint.
    ///
    /// Defaults to none, in which case no ServerKeyExchange is sent for PSK.
    pub fn psk_identity_hint(mut self, hint: &[u8]) -> Self {
        self.psk_identity_hint = Some(hint.to_vec());
        self
    }

    /// Seed the random number generator for reproducible runs.
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Set a custom crypto provider.
    ///
    /// If not set, the RustCrypto provider is used.
    pub fn with_crypto_provider(mut self, provider: CryptoProvider) -> Self {
        self.crypto_provider = Some(provider);
        self
    }

    /// Build the configuration.
    ///
    /// Returns `Error::ConfigError` if a value is out of range or the crypto
    /// provider cannot run the configured cipher suites.
    pub fn build(self) -> Result<Config, Error> {
        let crypto_provider = self
            .crypto_provider
            .unwrap_or_else(rust_crypto::default_provider);

        if self.mtu < MIN_MTU || self.mtu > u16::MAX as usize {
            return Err(Error::ConfigError(format!("MTU out of range: {}", self.mtu)));
        }
        if self.max_peers == 0 {
            return Err(Error::ConfigError("max_peers must be at least 1".into()));
        }
        if self.cipher_suites.is_empty() {
            return Err(Error::ConfigError("No cipher suites configured".into()));
        }
        if let Some(s) = self.cipher_suites.iter().find(|s| !s.is_known()) {
            return Err(Error::ConfigError(format!("Unsupported cipher suite: {:?}", s)));
        }
        if self.cookie_lifetime.is_zero() {
            return Err(Error::ConfigError("cookie_lifetime must be non-zero".into()));
        }
        if let Some(hint) = &self.psk_identity_hint {
            if hint.len() > u16::MAX as usize {
                return Err(Error::ConfigError("PSK identity hint too long".into()));
            }
        }

        // Always validate the crypto provider
        crypto_provider
            .validate(&self.cipher_suites)
            .map_err(Error::ConfigError)?;

        Ok(Config {
            mtu: self.mtu,
            max_peers: self.max_peers,
            flight_start_rto: self.flight_start_rto,
            flight_retries: self.flight_retries,
            cookie_lifetime: self.cookie_lifetime,
            cipher_suites: self.cipher_suites,
            require_client_certificate: self.require_client_certificate,
            session_tickets: self.session_tickets,
            ticket_lifetime: self.ticket_lifetime,
            renegotiation: self.renegotiation,
            psk_identity_hint: self.psk_identity_hint,
            rng_seed: self.rng_seed,
            crypto_provider,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::builder()
            .build()
            .expect("Default config should always validate")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = Config::default();
        assert_eq!(c.mtu(), 1150);
        assert_eq!(c.max_peers(), 16);
        assert_eq!(c.flight_retries(), 4);
        assert_eq!(c.ticket_lifetime(), Duration::from_secs(86400));
        assert_eq!(
            c.cipher_suites(),
            &[
                CipherSuite::ECDHE_ECDSA_AES128_CCM_8,
                CipherSuite::PSK_AES128_CCM_8
            ]
        );
        assert!(c.psk_identity_hint().is_none());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Config::builder().mtu(100).build().is_err());
        assert!(Config::builder().max_peers(0).build().is_err());
        assert!(Config::builder().cipher_suites(&[]).build().is_err());
        assert!(Config::builder()
            .cipher_suites(&[CipherSuite::Unknown(0x1301)])
            .build()
            .is_err());
    }
}
