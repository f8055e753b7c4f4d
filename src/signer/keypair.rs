use crate::error::{BlockchainError, Result};
use crate::utils::{ecdsa_p256_sha256_sign_digest, ecdsa_p256_sha256_sign_verify, new_key_pair};
use data_encoding::HEXLOWER;
use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_FIXED_SIGNING};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

// Fixed-size P-256 signatures are r || s, 32 bytes each
const SCALAR_LEN: usize = 32;

/// Uncompressed SEC1 public key of the signer
#[derive(Clone, Default, PartialEq, Eq, Hash, bincode::Encode, bincode::Decode)]
pub struct PublicKey(Vec<u8>);

impl PublicKey {
    pub fn from_bytes(bytes: Vec<u8>) -> PublicKey {
        PublicKey(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Checks `signature` over `message` against this key.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<()> {
        if self.is_empty() || signature.is_empty() {
            return Err(BlockchainError::InvalidSignature(
                "missing signer or signature".to_string(),
            ));
        }
        if ecdsa_p256_sha256_sign_verify(&self.0, &signature.to_fixed(), message) {
            Ok(())
        } else {
            Err(BlockchainError::InvalidSignature(format!(
                "signature does not match key {self}"
            )))
        }
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", HEXLOWER.encode(&self.0))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({self})")
    }
}

/// ECDSA signature split into its two scalars
#[derive(Debug, Clone, Default, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Signature {
    r: Vec<u8>,
    s: Vec<u8>,
}

impl Signature {
    pub fn from_fixed(bytes: &[u8]) -> Result<Signature> {
        if bytes.len() != SCALAR_LEN * 2 {
            return Err(BlockchainError::Crypto(format!(
                "Expected a {} byte signature, got {}",
                SCALAR_LEN * 2,
                bytes.len()
            )));
        }
        Ok(Signature {
            r: bytes[..SCALAR_LEN].to_vec(),
            s: bytes[SCALAR_LEN..].to_vec(),
        })
    }

    pub fn to_fixed(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.r.len() + self.s.len());
        out.extend_from_slice(&self.r);
        out.extend_from_slice(&self.s);
        out
    }

    pub fn r(&self) -> &[u8] {
        &self.r
    }

    pub fn s(&self) -> &[u8] {
        &self.s
    }

    pub fn is_empty(&self) -> bool {
        self.r.is_empty() && self.s.is_empty()
    }
}

/// Signing key of a node. The PKCS#8 document is wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey {
    pkcs8: Vec<u8>,
    #[zeroize(skip)]
    public_key: PublicKey,
}

impl PrivateKey {
    pub fn generate() -> Result<PrivateKey> {
        let pkcs8 = new_key_pair()?;
        PrivateKey::from_pkcs8(pkcs8)
    }

    pub fn from_pkcs8(pkcs8: Vec<u8>) -> Result<PrivateKey> {
        let rng = SystemRandom::new();
        let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &pkcs8, &rng)
            .map_err(|e| {
                BlockchainError::Crypto(format!("Failed to create key pair from PKCS8: {e}"))
            })?;
        let public_key = PublicKey(key_pair.public_key().as_ref().to_vec());
        Ok(PrivateKey { pkcs8, public_key })
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn sign(&self, message: &[u8]) -> Result<Signature> {
        let fixed = ecdsa_p256_sha256_sign_digest(&self.pkcs8, message)?;
        Signature::from_fixed(&fixed)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}
