use crate::{
    constants::MAX_BPS,
    error::{Result, VaultError},
};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Rounding {
    Floor,
    Ceiling,
}

/// Convert assets to shares against the vault's global TVL.
///
/// The first depositor into an empty vault is minted 1:1. Afterwards:
/// shares = assets × total_shares / total_assets
///
/// With no shares outstanding, TVL already in the vault has no owner and
/// pricing fails with `UnownedAssets`. A vault whose shares are outstanding
/// but whose TVL has been written down to zero fails with `DivisionByZero`.
pub fn convert_to_shares(
    assets: u64,
    total_assets: u64,
    total_shares: u64,
    rounding: Rounding,
) -> Result<u64> {
    if total_shares == 0 {
        if total_assets > 0 {
            return Err(VaultError::UnownedAssets);
        }
        return Ok(assets);
    }
    mul_div(assets, total_shares, total_assets, rounding)
}

/// Convert shares to assets.
///
/// Formula: assets = shares × total_assets / total_shares
pub fn convert_to_assets(
    shares: u64,
    total_assets: u64,
    total_shares: u64,
    rounding: Rounding,
) -> Result<u64> {
    mul_div(shares, total_assets, total_shares, rounding)
}

/// `value` scaled by a basis-point ratio, floored.
pub fn bps_of(value: u64, bps: u64) -> Result<u64> {
    mul_div(value, bps, MAX_BPS, Rounding::Floor)
}

/// Safe multiplication then division with configurable rounding.
///
/// Computes: (value × numerator) / denominator
/// Uses u128 intermediate to prevent overflow.
pub fn mul_div(value: u64, numerator: u64, denominator: u64, rounding: Rounding) -> Result<u64> {
    if denominator == 0 {
        return Err(VaultError::DivisionByZero);
    }

    let product = (value as u128)
        .checked_mul(numerator as u128)
        .ok_or(VaultError::MathOverflow)?;

    let denom = denominator as u128;
    let result = match rounding {
        Rounding::Floor => product / denom,
        Rounding::Ceiling => product.div_ceil(denom),
    };

    u64::try_from(result).map_err(|_| VaultError::MathOverflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mul_div_rounding() {
        assert_eq!(mul_div(100, 1, 3, Rounding::Floor).unwrap(), 33);
        assert_eq!(mul_div(100, 1, 3, Rounding::Ceiling).unwrap(), 34);
        assert_eq!(mul_div(100, 3, 2, Rounding::Ceiling).unwrap(), 150);
    }

    #[test]
    fn test_first_depositor_is_minted_one_to_one() {
        assert_eq!(convert_to_shares(1_000, 0, 0, Rounding::Floor).unwrap(), 1_000);
    }

    #[test]
    fn test_shareless_tvl_cannot_be_bought_at_par() {
        let result = convert_to_shares(1_000, 500, 0, Rounding::Floor);
        assert_eq!(result, Err(VaultError::UnownedAssets));
    }

    #[test]
    fn test_shares_track_global_tvl() {
        // 1000 shares backed by 1100 assets (900 local + 200 reported remotely)
        let shares = convert_to_shares(110, 1_100, 1_000, Rounding::Floor).unwrap();
        assert_eq!(shares, 100);
        let assets = convert_to_assets(100, 1_100, 1_000, Rounding::Floor).unwrap();
        assert_eq!(assets, 110);
    }

    #[test]
    fn test_redeem_never_exceeds_pro_rata_share() {
        // 3 shares of 10 over 100 assets = 30, and 1 share of 3 over 10 = 3.33 -> 3
        assert_eq!(convert_to_assets(3, 100, 10, Rounding::Floor).unwrap(), 30);
        assert_eq!(convert_to_assets(1, 10, 3, Rounding::Floor).unwrap(), 3);
    }

    #[test]
    fn test_written_down_vault_rejects_deposits() {
        let result = convert_to_shares(100, 0, 1_000, Rounding::Floor);
        assert_eq!(result, Err(VaultError::DivisionByZero));
    }

    #[test]
    fn test_bps_of() {
        assert_eq!(bps_of(1_000, 1_000).unwrap(), 100);
        assert_eq!(bps_of(999, 5_000).unwrap(), 499);
        assert_eq!(bps_of(7, MAX_BPS).unwrap(), 7);
    }

    #[test]
    fn test_max_values() {
        let large = u64::MAX / 2;
        assert!(convert_to_shares(large, large, large, Rounding::Floor).is_ok());
        assert_eq!(
            mul_div(u64::MAX, 2, 1, Rounding::Floor),
            Err(VaultError::MathOverflow)
        );
    }
}
