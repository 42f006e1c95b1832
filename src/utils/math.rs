//! 고정소수점(WAD) 연산 유틸리티
//!
//! 모든 가격은 18자리 고정소수점 `U256`으로 표현된다.
//! 곱셈/나눗셈은 512비트 중간값을 거쳐 내림(truncate)한다.

use ethers::types::{U256, U512};
use rust_decimal::Decimal;

use crate::constants::{WAD, WAD_DECIMALS};
use crate::types::{OracleError, OracleResult};

/// U256으로 표현 가능한 10의 최대 지수
const MAX_POW10: u8 = 77;

/// 10^exp
pub fn pow10(exp: u8) -> OracleResult<U256> {
    if exp > MAX_POW10 {
        return Err(OracleError::MathOverflow);
    }
    Ok(U256::exp10(exp as usize))
}

/// a * b / denominator (512비트 중간값, 내림)
pub fn mul_div(a: U256, b: U256, denominator: U256) -> OracleResult<U256> {
    if denominator.is_zero() {
        return Err(OracleError::DivisionByZero);
    }
    let quotient = a.full_mul(b) / U512::from(denominator);
    U256::try_from(quotient).map_err(|_| OracleError::MathOverflow)
}

/// a * b / 1e18
pub fn mul_wad(a: U256, b: U256) -> OracleResult<U256> {
    mul_div(a, b, WAD)
}

/// a * 1e18 / b
pub fn div_wad(a: U256, b: U256) -> OracleResult<U256> {
    mul_div(a, WAD, b)
}

/// `from` 자리수에서 `to` 자리수로 변환 (축소 시 내림)
pub fn scale_decimals(amount: U256, from: u8, to: u8) -> OracleResult<U256> {
    if from == to {
        return Ok(amount);
    }
    if to > from {
        amount
            .checked_mul(pow10(to - from)?)
            .ok_or(OracleError::MathOverflow)
    } else {
        Ok(amount / pow10(from - to)?)
    }
}

/// 임의 자리수 값을 WAD로 정규화
pub fn to_wad(amount: U256, decimals: u8) -> OracleResult<U256> {
    scale_decimals(amount, decimals, WAD_DECIMALS)
}

/// floor(sqrt(a * b))
pub fn sqrt_product(a: U256, b: U256) -> U256 {
    let root = a.full_mul(b).integer_sqrt();
    // sqrt(U512) 는 항상 256비트 안에 들어간다
    U256::try_from(root).unwrap_or_else(|_| U256::max_value())
}

fn checked_pow(base: U256, exp: u32) -> OracleResult<U256> {
    let mut acc = U256::one();
    for _ in 0..exp {
        acc = acc.checked_mul(base).ok_or(OracleError::MathOverflow)?;
    }
    Ok(acc)
}

/// floor(x^(1/n)): 위에서부터 수렴하는 뉴턴 반복
pub fn nth_root(x: U256, n: u32) -> OracleResult<U256> {
    if n == 0 {
        return Err(OracleError::invalid("zeroth root is undefined"));
    }
    if x.is_zero() || n == 1 {
        return Ok(x);
    }

    let n_u = U256::from(n);
    let shift = (x.bits() + n as usize - 1) / n as usize;
    let mut y = U256::one() << shift;

    loop {
        let y_pow = checked_pow(y, n - 1)?;
        let z = (y * (n_u - 1) + x / y_pow) / n_u;
        if z >= y {
            return Ok(y);
        }
        y = z;
    }
}

/// WAD 값들의 기하평균 (결과도 WAD)
pub fn geometric_mean_wad(values: &[U256]) -> OracleResult<U256> {
    if values.is_empty() {
        return Err(OracleError::invalid("geometric mean of an empty set"));
    }
    let mut product = U256::one();
    for value in values {
        product = product
            .checked_mul(*value)
            .ok_or(OracleError::MathOverflow)?;
    }
    nth_root(product, values.len() as u32)
}

/// 설정값(Decimal)을 WAD로 변환 (18자리 초과분은 내림)
pub fn decimal_to_wad(value: Decimal) -> OracleResult<U256> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(OracleError::invalid(format!("negative value {}", value)));
    }
    let value = value.normalize();
    let mantissa = U256::from(value.mantissa().unsigned_abs());
    let scale = value.scale() as u8;

    scale_decimals(mantissa, scale, WAD_DECIMALS)
}

/// WAD 값을 Decimal로 변환 (표현 범위를 넘으면 None)
pub fn wad_to_decimal(value: U256) -> Option<Decimal> {
    if value > U256::from(i128::MAX as u128) {
        return None;
    }
    Decimal::try_from_i128_with_scale(value.as_u128() as i128, WAD_DECIMALS as u32)
        .ok()
        .map(|d| d.normalize())
}

/// 로그용 WAD 포맷 ("123.000000000000000000")
pub fn format_wad(value: U256) -> String {
    format!("{}.{:018}", value / WAD, (value % WAD).as_u64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn wad(n: u64) -> U256 {
        U256::from(n) * WAD
    }

    #[test]
    fn test_mul_div_uses_wide_intermediate() {
        let big = U256::max_value() / 2;
        // big * 4 / 4 overflows 256 bits in the middle but not at the end
        assert_eq!(mul_div(big, U256::from(4), U256::from(4)).unwrap(), big);
        assert_eq!(
            mul_div(U256::max_value(), U256::from(2), U256::one()),
            Err(OracleError::MathOverflow)
        );
        assert_eq!(
            mul_div(U256::one(), U256::one(), U256::zero()),
            Err(OracleError::DivisionByZero)
        );
    }

    #[test]
    fn test_wad_mul_and_div() {
        assert_eq!(mul_wad(wad(3), wad(7)).unwrap(), wad(21));
        assert_eq!(div_wad(wad(21), wad(7)).unwrap(), wad(3));
        // 1 / 3 truncates at the 18th decimal
        assert_eq!(
            div_wad(wad(1), wad(3)).unwrap(),
            U256::from(333_333_333_333_333_333u64)
        );
    }

    #[test]
    fn test_scale_decimals() {
        // 1 USDC (6 decimals) -> 1 WAD
        assert_eq!(to_wad(U256::from(1_000_000u64), 6).unwrap(), WAD);
        // 1 WAD -> 8 decimals
        assert_eq!(
            scale_decimals(WAD, 18, 8).unwrap(),
            U256::from(100_000_000u64)
        );
        assert_eq!(scale_decimals(U256::from(5), 18, 18).unwrap(), U256::from(5));
        assert_eq!(pow10(78), Err(OracleError::MathOverflow));
    }

    #[test]
    fn test_nth_root() {
        assert_eq!(nth_root(U256::from(27), 3).unwrap(), U256::from(3));
        assert_eq!(nth_root(U256::from(26), 3).unwrap(), U256::from(2));
        assert_eq!(nth_root(U256::from(1_000_000), 2).unwrap(), U256::from(1_000));
        assert_eq!(nth_root(U256::zero(), 3).unwrap(), U256::zero());
        assert!(nth_root(U256::from(8), 0).is_err());
    }

    #[test]
    fn test_geometric_mean_of_equal_prices_is_exact() {
        let prices = vec![wad(100), wad(100), wad(100)];
        assert_eq!(geometric_mean_wad(&prices).unwrap(), wad(100));

        let mixed = vec![wad(1), wad(4), wad(16)];
        assert_eq!(geometric_mean_wad(&mixed).unwrap(), wad(4));
    }

    #[test]
    fn test_sqrt_product() {
        assert_eq!(sqrt_product(wad(4), wad(9)), wad(6));
        assert_eq!(sqrt_product(U256::zero(), wad(9)), U256::zero());
    }

    #[test]
    fn test_decimal_conversions() {
        let d = Decimal::from_str("1.5").unwrap();
        assert_eq!(decimal_to_wad(d).unwrap(), U256::from(1_500_000_000_000_000_000u64));
        assert_eq!(decimal_to_wad(Decimal::ONE).unwrap(), WAD);
        assert!(decimal_to_wad(Decimal::from_str("-0.1").unwrap()).is_err());

        assert_eq!(wad_to_decimal(wad(42)), Some(Decimal::from(42)));
        assert_eq!(wad_to_decimal(U256::max_value()), None);
    }

    #[test]
    fn test_format_wad() {
        assert_eq!(format_wad(wad(2)), "2.000000000000000000");
        assert_eq!(format_wad(U256::from(5)), "0.000000000000000005");
    }
}
