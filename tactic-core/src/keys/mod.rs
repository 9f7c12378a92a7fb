pub mod encryption;
pub mod keystore;

pub use keystore::{Identity, Keystore};

use crate::error::{CoreError, Result};
use crate::types::{Address, Hash32};
use bip39::{Language, Mnemonic};
use bitcoin::key::Keypair;
use bitcoin::secp256k1::{schnorr, Message, Secp256k1, SecretKey};
use std::str::FromStr;

/// BIP86 single-key path; signing keys are used for schnorr only.
const SIGNER_DERIVATION_PATH: &str = "m/86'/0'/0'/0/0";

/// Holds one party's signing key.
#[derive(Clone)]
pub struct Signer {
    keypair: Keypair,
    address: Address,
}

impl Signer {
    pub fn from_keypair(keypair: Keypair) -> Self {
        let (xonly, _parity) = keypair.x_only_public_key();
        Self {
            keypair,
            address: Address::from_public_key(xonly),
        }
    }

    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Result<Self> {
        let secp = Secp256k1::new();
        let secret_key = SecretKey::from_slice(bytes)
            .map_err(|e| CoreError::crypto(format!("Invalid secret key: {}", e)))?;
        Ok(Self::from_keypair(Keypair::from_secret_key(
            &secp,
            &secret_key,
        )))
    }

    pub fn from_mnemonic(mnemonic: &str, network: bitcoin::Network) -> Result<Self> {
        mnemonic_to_keypair(mnemonic, network).map(Self::from_keypair)
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Deterministic BIP340 signature over a 32-byte digest.
    pub fn sign_digest(&self, digest: &Hash32) -> Vec<u8> {
        let secp = Secp256k1::signing_only();
        let message = Message::from_digest(*digest);
        secp.sign_schnorr_no_aux_rand(&message, &self.keypair)
            .serialize()
            .to_vec()
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("address", &self.address)
            .finish()
    }
}

pub fn verify_digest(address: &Address, digest: &Hash32, signature: &[u8]) -> bool {
    let Ok(signature) = schnorr::Signature::from_slice(signature) else {
        return false;
    };
    let secp = Secp256k1::verification_only();
    let message = Message::from_digest(*digest);
    secp.verify_schnorr(&signature, &message, address.public_key())
        .is_ok()
}

pub fn generate_mnemonic() -> Result<String> {
    let mut rng = bip39::rand::thread_rng();
    let mnemonic = Mnemonic::generate_in_with(&mut rng, Language::English, 24)
        .map_err(|e| CoreError::internal(format!("Failed to generate mnemonic: {}", e)))?;
    Ok(mnemonic.to_string())
}

pub fn mnemonic_to_keypair(mnemonic: &str, network: bitcoin::Network) -> Result<Keypair> {
    let mnemonic = Mnemonic::parse_in(Language::English, mnemonic)
        .map_err(|e| CoreError::config(format!("Invalid mnemonic: {}", e)))?;

    let seed = mnemonic.to_seed("");
    let secp = Secp256k1::new();

    let master_key = bitcoin::bip32::Xpriv::new_master(network, &seed)
        .map_err(|e| CoreError::crypto(format!("Failed to derive master key: {}", e)))?;

    let path = bitcoin::bip32::DerivationPath::from_str(SIGNER_DERIVATION_PATH)
        .map_err(|e| CoreError::config(format!("Invalid derivation path: {}", e)))?;

    let child_key = master_key
        .derive_priv(&secp, &path)
        .map_err(|e| CoreError::crypto(format!("Failed to derive child key: {}", e)))?;

    Ok(Keypair::from_secret_key(&secp, &child_key.private_key))
}
