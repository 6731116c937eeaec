pub mod canonical;
pub mod error;
pub mod key_codec;
pub mod keys;
pub mod signing;

pub use canonical::{canonicalize, sha256, signing_input};
pub use error::CryptoError;
pub use key_codec::{
    jwk_to_key_material, multibase_to_key_material, pem_to_key_material, public_key_to_jwk,
    strip_private_key_to_raw, strip_public_key_to_raw, Jwk, KeyMaterial, RawKey,
};
pub use keys::{KeyPair, PublicKey};
pub use signing::{generate_nonce, sign, verify, Signature};
