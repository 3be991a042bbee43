//! TLS 1.2 key schedule over P_SHA256.
//!
//! ```text
//! master_secret = PRF(premaster, "master secret", client_random + server_random)[0..48]
//! key_block     = PRF(master_secret, "key expansion", server_random + client_random)
//! verify_data   = PRF(master_secret, finished_label, Hash(handshake_messages))[0..12]
//! ```

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tinyvec::ArrayVec;
use zeroize::{Zeroize, Zeroizing};

use super::aead::{Iv, FIXED_IV_LEN};
use crate::message::VERIFY_DATA_LEN;

type HmacSha256 = Hmac<Sha256>;

pub const MASTER_SECRET_LEN: usize = 48;

/// AES-128 key length.
pub const KEY_LEN: usize = 16;

/// Key block length for the CCM-8 suites: no MAC keys, two keys, two fixed IVs.
pub const KEY_BLOCK_LEN: usize = 2 * KEY_LEN + 2 * FIXED_IV_LEN;

/// PRF for TLS 1.2 as specified in RFC 5246 Section 5.
///
/// `PRF(secret, label, seed) = P_SHA256(secret, label + seed)`, writing `out.len()` bytes.
/// The seed is given WITHOUT the label.
pub fn prf_tls12(secret: &[u8], label: &str, seed: &[u8], out: &mut [u8]) -> Result<(), String> {
    if !label.is_ascii() {
        return Err(format!("PRF label must be ascii: {:?}", label));
    }

    let mut full_seed: ArrayVec<[u8; 128]> = ArrayVec::default();
    let needed = label.len() + seed.len();
    if needed > full_seed.capacity() {
        return Err(format!("PRF seed too long: {}", needed));
    }
    full_seed.extend_from_slice(label.as_bytes());
    full_seed.extend_from_slice(seed);

    p_hash(secret, &full_seed, out)
}

fn p_hash(secret: &[u8], full_seed: &[u8], out: &mut [u8]) -> Result<(), String> {
    let key = HmacSha256::new_from_slice(secret).map_err(|e| e.to_string())?;

    // A(1) = HMAC_hash(secret, A(0)) where A(0) = seed
    let mut a = {
        let mut mac = key.clone();
        mac.update(full_seed);
        mac.finalize().into_bytes()
    };

    let mut written = 0;
    while written < out.len() {
        // HMAC_hash(secret, A(i) + seed)
        let mut mac = key.clone();
        mac.update(&a);
        mac.update(full_seed);
        let block = mac.finalize().into_bytes();

        let to_copy = (out.len() - written).min(block.len());
        out[written..written + to_copy].copy_from_slice(&block[..to_copy]);
        written += to_copy;

        // A(i+1) = HMAC_hash(secret, A(i))
        let mut mac = key.clone();
        mac.update(&a);
        a = mac.finalize().into_bytes();
    }

    Ok(())
}

/// The 48-byte master secret. Wiped on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct MasterSecret(Zeroizing<[u8; MASTER_SECRET_LEN]>);

impl MasterSecret {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
        let arr: [u8; MASTER_SECRET_LEN] = bytes
            .try_into()
            .map_err(|_| format!("Invalid master secret length: {}", bytes.len()))?;
        Ok(MasterSecret(Zeroizing::new(arr)))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0[..]
    }
}

impl fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterSecret").finish_non_exhaustive()
    }
}

/// Write keys and fixed IVs for both directions. Wiped on drop.
pub struct KeyBlock {
    pub client_write_key: [u8; KEY_LEN],
    pub server_write_key: [u8; KEY_LEN],
    pub client_write_iv: Iv,
    pub server_write_iv: Iv,
}

impl KeyBlock {
    /// Split a raw key block: client key, server key, client IV, server IV.
    fn split(raw: &[u8; KEY_BLOCK_LEN]) -> Result<Self, String> {
        let (client_key, rest) = raw.split_at(KEY_LEN);
        let (server_key, rest) = rest.split_at(KEY_LEN);
        let (client_iv, server_iv) = rest.split_at(FIXED_IV_LEN);

        let mut client_write_key = [0u8; KEY_LEN];
        client_write_key.copy_from_slice(client_key);
        let mut server_write_key = [0u8; KEY_LEN];
        server_write_key.copy_from_slice(server_key);

        Ok(KeyBlock {
            client_write_key,
            server_write_key,
            client_write_iv: Iv::new(client_iv)?,
            server_write_iv: Iv::new(server_iv)?,
        })
    }
}

impl Drop for KeyBlock {
    fn drop(&mut self) {
        self.client_write_key.zeroize();
        self.server_write_key.zeroize();
        self.client_write_iv.0.zeroize();
        self.server_write_iv.0.zeroize();
    }
}

impl fmt::Debug for KeyBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyBlock").finish_non_exhaustive()
    }
}

/// `master_secret = PRF(premaster, "master secret", client_random + server_random)`
pub fn master_secret(
    premaster: &[u8],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
) -> Result<MasterSecret, String> {
    let mut seed = [0u8; 64];
    seed[..32].copy_from_slice(client_random);
    seed[32..].copy_from_slice(server_random);

    let mut out = Zeroizing::new([0u8; MASTER_SECRET_LEN]);
    prf_tls12(premaster, "master secret", &seed, &mut out[..])?;
    Ok(MasterSecret(out))
}

/// Key expansion as specified in RFC 5246 Section 6.3. Note the seed order:
/// server random first.
pub fn key_expansion(
    master: &MasterSecret,
    client_random: &[u8; 32],
    server_random: &[u8; 32],
) -> Result<KeyBlock, String> {
    let mut seed = [0u8; 64];
    seed[..32].copy_from_slice(server_random);
    seed[32..].copy_from_slice(client_random);

    let mut raw = Zeroizing::new([0u8; KEY_BLOCK_LEN]);
    prf_tls12(master.as_bytes(), "key expansion", &seed, &mut raw[..])?;
    KeyBlock::split(&raw)
}

/// Derive master secret and key block from a premaster secret.
///
/// The caller's premaster buffer should be dropped (zeroized) right after.
pub fn calculate_key_block(
    premaster: &[u8],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
) -> Result<(MasterSecret, KeyBlock), String> {
    let master = master_secret(premaster, client_random, server_random)?;
    let key_block = key_expansion(&master, client_random, server_random)?;
    Ok((master, key_block))
}

/// Which side's Finished is being computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishedLabel {
    Client,
    Server,
}

impl FinishedLabel {
    fn as_str(&self) -> &'static str {
        match self {
            FinishedLabel::Client => "client finished",
            FinishedLabel::Server => "server finished",
        }
    }
}

/// `verify_data = PRF(master_secret, label, handshake_hash)[0..12]`
pub fn verify_data(
    master: &MasterSecret,
    label: FinishedLabel,
    handshake_hash: &[u8],
) -> Result<[u8; VERIFY_DATA_LEN], String> {
    let mut out = [0u8; VERIFY_DATA_LEN];
    prf_tls12(master.as_bytes(), label.as_str(), handshake_hash, &mut out)?;
    Ok(out)
}

/// RFC 4279 premaster for plain PSK: `uint16(n) ‖ zeros(n) ‖ uint16(n) ‖ psk`.
pub fn psk_premaster(psk: &[u8]) -> Result<Zeroizing<Vec<u8>>, String> {
    let n: u16 = psk
        .len()
        .try_into()
        .map_err(|_| format!("PSK too long: {}", psk.len()))?;

    let mut out = Zeroizing::new(Vec::with_capacity(4 + 2 * psk.len()));
    out.extend_from_slice(&n.to_be_bytes());
    out.resize(2 + psk.len(), 0);
    out.extend_from_slice(&n.to_be_bytes());
    out.extend_from_slice(psk);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn prf_sha256_known_answer() {
        let secret = hex("9bbe436ba940f017b17652849a71db35");
        let seed = hex("a0ba9f936cda311827a6f796ffd5198c");
        let expected = hex(
            "e3f229ba727be17b8d122620557cd453c2aab21d07c3d495329b52d4e61edb5a\
             6b301791e90d35c9c9a46b4e14baf9af0fa022f7077def17abfd3797c0564bab\
             4fbc91666e9def9b97fce34f796789baa48082d122ee42c5a72e5a5110fff701\
             87347b66",
        );

        let mut out = [0u8; 100];
        prf_tls12(&secret, "test label", &seed, &mut out).unwrap();
        assert_eq!(&out[..], &expected[..]);
    }

    #[test]
    fn psk_premaster_layout() {
        let pm = psk_premaster(&[0xAA, 0xBB, 0xCC]).unwrap();
        assert_eq!(
            &pm[..],
            &[0x00, 0x03, 0, 0, 0, 0x00, 0x03, 0xAA, 0xBB, 0xCC]
        );
    }

    #[test]
    fn key_block_depends_on_random_order() {
        let cr = [1u8; 32];
        let sr = [2u8; 32];
        let (m1, kb1) = calculate_key_block(b"premaster", &cr, &sr).unwrap();
        let (m2, kb2) = calculate_key_block(b"premaster", &sr, &cr).unwrap();

        assert_ne!(m1, m2);
        assert_ne!(kb1.client_write_key, kb2.client_write_key);
        assert_ne!(kb1.client_write_key, kb1.server_write_key);
        assert_ne!(kb1.client_write_iv, kb1.server_write_iv);
    }

    #[test]
    fn finished_labels_differ() {
        let m = MasterSecret::from_bytes(&[7; 48]).unwrap();
        let hash = [9u8; 32];
        let c = verify_data(&m, FinishedLabel::Client, &hash).unwrap();
        let s = verify_data(&m, FinishedLabel::Server, &hash).unwrap();
        assert_ne!(c, s);
    }

    #[test]
    fn master_secret_debug_is_opaque() {
        let m = MasterSecret::from_bytes(&[7; 48]).unwrap();
        assert!(!format!("{:?}", m).contains('7'));
    }
}
