//! Key exchange group implementations using RustCrypto.

use p256::ecdh::EphemeralSecret;
use p256::PublicKey;
use rand::rngs::OsRng;

use crate::buffer::Buf;
use crate::crypto::provider::{ActiveKeyExchange, SupportedKxGroup};
use crate::message::NAMED_CURVE_SECP256R1;

/// Ephemeral P-256 ECDH exchange.
struct EcdhP256 {
    secret: EphemeralSecret,
    public_key: Buf,
}

impl std::fmt::Debug for EcdhP256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EcdhP256")
            .field("public_key_len", &self.public_key.len())
            .finish_non_exhaustive()
    }
}

impl EcdhP256 {
    fn new() -> Self {
        let secret = EphemeralSecret::random(&mut OsRng);
        let public_key = Buf::from_slice(&PublicKey::from(&secret).to_sec1_bytes());
        EcdhP256 { secret, public_key }
    }
}

impl ActiveKeyExchange for EcdhP256 {
    fn pub_key(&self) -> &[u8] {
        &self.public_key
    }

    fn complete(self: Box<Self>, peer_pub: &[u8], out: &mut Buf) -> Result<(), String> {
        let peer_key = PublicKey::from_sec1_bytes(peer_pub)
            .map_err(|_| "Invalid P-256 public key".to_string())?;
        let shared_secret = self.secret.diffie_hellman(&peer_key);
        out.clear();
        out.extend_from_slice(shared_secret.raw_secret_bytes().as_slice());
        Ok(())
    }
}

/// P-256 (secp256r1) key exchange group.
#[derive(Debug)]
struct P256;

impl SupportedKxGroup for P256 {
    fn named_curve(&self) -> u16 {
        NAMED_CURVE_SECP256R1
    }

    fn start_exchange(&self) -> Result<Box<dyn ActiveKeyExchange>, String> {
        Ok(Box::new(EcdhP256::new()))
    }
}

static KX_GROUP_P256: P256 = P256;

/// All supported key exchange groups.
pub(super) static ALL_KX_GROUPS: &[&dyn SupportedKxGroup] = &[&KX_GROUP_P256];
