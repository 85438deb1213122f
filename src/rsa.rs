use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use log::info;
use openssl::pkey::PKey;
use openssl::rsa::Rsa;

/// Generates a new 2048-bit RSA key pair, returned as `(public, private)` PEM
/// bytes. The private key is PKCS#8 encoded.
pub fn generate_rsa_keys() -> Result<(Vec<u8>, Vec<u8>)> {
    let rsa = Rsa::generate(2048)?;
    let pkey = PKey::from_rsa(rsa)?;

    let private_key = pkey.private_key_to_pem_pkcs8()?;
    let public_key = pkey.public_key_to_pem()?;

    Ok((public_key, private_key))
}

/// Reads the key pair from disk, generating and writing a fresh pair when
/// neither file exists. Having only one of the two files is an error.
pub fn read_or_generate_keys(public_path: &Path, private_path: &Path) -> Result<(Vec<u8>, Vec<u8>)> {
    match (public_path.exists(), private_path.exists()) {
        (true, true) => {
            let public_key = fs::read(public_path).context("read token public key")?;
            let private_key = fs::read(private_path).context("read token private key")?;
            Ok((public_key, private_key))
        }
        (false, false) => {
            info!("Token keys not found, generating new RSA key pair");
            let (public_key, private_key) = generate_rsa_keys().context("generate token keys")?;
            fs::write(public_path, &public_key).context("write token public key")?;
            fs::write(private_path, &private_key).context("write token private key")?;
            Ok((public_key, private_key))
        }
        _ => bail!(
            "token key pair is incomplete, both '{}' and '{}' should exist",
            public_path.display(),
            private_path.display()
        ),
    }
}
