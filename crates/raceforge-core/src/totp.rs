use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha1::Sha1;

const STEP_SECONDS: u64 = 30;
const DIGITS: u32 = 6;

/// Derives an RFC 6238 TOTP code from a base32-encoded seed, for the `--seed`
/// CLI option. Thin glue: no external authenticator service, just the HOTP
/// math against the current Unix time step.
pub fn generate(seed_base32: &str) -> Option<String> {
	let key = decode_base32(seed_base32)?;
	let counter = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_secs() / STEP_SECONDS;
	Some(hotp(&key, counter))
}

fn hotp(key: &[u8], counter: u64) -> String {
	let mut mac = Hmac::<Sha1>::new_from_slice(key).expect("HMAC accepts any key length");
	mac.update(&counter.to_be_bytes());
	let digest = mac.finalize().into_bytes();

	let offset = (digest[digest.len() - 1] & 0x0f) as usize;
	let truncated = ((digest[offset] as u32 & 0x7f) << 24)
		| ((digest[offset + 1] as u32) << 16)
		| ((digest[offset + 2] as u32) << 8)
		| (digest[offset + 3] as u32);

	let code = truncated % 10u32.pow(DIGITS);
	format!("{code:0width$}", width = DIGITS as usize)
}

const BASE32_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

fn decode_base32(input: &str) -> Option<Vec<u8>> {
	let mut bits: u64 = 0;
	let mut bit_count = 0u32;
	let mut out = Vec::new();
	for c in input.trim().chars().filter(|c| *c != '=') {
		let value = BASE32_ALPHABET.iter().position(|&b| b as char == c.to_ascii_uppercase())? as u64;
		bits = (bits << 5) | value;
		bit_count += 5;
		if bit_count >= 8 {
			bit_count -= 8;
			out.push((bits >> bit_count) as u8);
		}
	}
	Some(out)
}
