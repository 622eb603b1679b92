//! Identity helpers

use crate::types::Identity;
use bech32::Bech32m;
use uuid7::uuid7;

// construct a unique id then encode using bech32m
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// A fresh caller identity such as `user_1...`, for tooling and tests.
pub fn new_identity(hrp: &str) -> anyhow::Result<Identity> {
    Ok(Identity::new(new_uuid_to_bech32(hrp)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identities_carry_prefix_and_differ() {
        let a = new_identity("user_").unwrap();
        let b = new_identity("user_").unwrap();

        assert!(a.as_str().starts_with("user_1"));
        assert_ne!(a, b);
    }

    #[test]
    fn empty_hrp_is_rejected() {
        assert!(new_identity("").is_err());
    }
}
