//! 가격 평가 전략
//!
//! 각 전략은 현재 상태 스냅샷과 재귀 조회만으로 가격을 계산하는 순수 함수다.
//! 어떤 전략도 바인딩, 풀 레지스트리, 관측 버퍼를 변경하지 않는다.

use ethers::types::{Address, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::pool_registry::PoolKind;
use super::price_oracle::PriceSource;
use super::state::{OracleState, RouterSettings};
use crate::types::{Asset, OracleError, OracleResult, PairId, PoolId};
use crate::utils::math::{
    decimal_to_wad, div_wad, geometric_mean_wad, mul_div, mul_wad, pow10, sqrt_product, to_wad,
};
use crate::utils::time::age_of;

/// 재귀 가격 조회자
///
/// 라우터가 구현하며, 하나의 조회 안에서는 항상 같은 스냅샷을 보여준다.
pub trait PriceResolver {
    /// 다른 자산의 base unit 가격 (WAD)
    fn resolve(&self, asset: Asset) -> OracleResult<U256>;

    /// 현재 조회가 보고 있는 상태 스냅샷
    fn state(&self) -> &OracleState;

    /// 조회 시작 시각
    fn now(&self) -> u64;
}

/// 피드 호가 단위
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedQuote {
    /// 자산/base unit
    #[default]
    Base,
    /// 자산/USD (USD/base 피드로 환산)
    Usd,
}

/// 자산별로 바인딩되는 평가 전략
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValuationStrategy {
    /// 외부 피드 직접 사용
    DirectFeed {
        feed: Address,
        #[serde(default)]
        quote: FeedQuote,
        #[serde(default)]
        max_age_secs: Option<u64>,
    },
    /// AMM 누적 가격 TWAP (quote_asset 기준) × quote_asset 가격
    AmmTwap {
        pair: PairId,
        quote_asset: Asset,
        window_secs: u64,
        #[serde(default)]
        max_age_secs: Option<u64>,
    },
    /// LP 토큰: 구성 자산 가치 분해
    LpShare { pool: PoolId },
    /// vault share: underlying 가격 × 환율
    VaultShare { underlying: Asset },
    /// 스테이킹 파생 자산: wrapped 가격 × 전환 비율
    StakingDerivative { wrapped: Asset },
    /// 고정 가격
    Fixed { value: Decimal },
}

impl ValuationStrategy {
    pub fn source(&self) -> PriceSource {
        match self {
            ValuationStrategy::DirectFeed { .. } => PriceSource::DirectFeed,
            ValuationStrategy::AmmTwap { .. } => PriceSource::AmmTwap,
            ValuationStrategy::LpShare { .. } => PriceSource::LpShare,
            ValuationStrategy::VaultShare { .. } => PriceSource::VaultShare,
            ValuationStrategy::StakingDerivative { .. } => PriceSource::StakingDerivative,
            ValuationStrategy::Fixed { .. } => PriceSource::Fixed,
        }
    }

    /// 바인딩 전 파라미터 검증
    ///
    /// TWAP 창은 관측 보존 기간 안에 들어와야 한다. 더 긴 창은 가지치기 후
    /// 시작 관측을 찾을 수 없다.
    pub fn validate(&self, settings: &RouterSettings) -> OracleResult<()> {
        match self {
            ValuationStrategy::AmmTwap { window_secs, .. } if *window_secs == 0 => {
                Err(OracleError::invalid("TWAP window must be positive"))
            }
            ValuationStrategy::AmmTwap { window_secs, .. }
                if *window_secs > settings.observation_retention_secs =>
            {
                Err(OracleError::invalid(format!(
                    "TWAP window {}s exceeds observation retention {}s",
                    window_secs, settings.observation_retention_secs
                )))
            }
            ValuationStrategy::Fixed { value } => decimal_to_wad(*value).map(|_| ()),
            _ => Ok(()),
        }
    }

    /// 가격 계산 (WAD, base unit)
    pub fn resolve(&self, asset: Asset, resolver: &dyn PriceResolver) -> OracleResult<U256> {
        match self {
            ValuationStrategy::DirectFeed {
                feed,
                quote,
                max_age_secs,
            } => resolve_direct_feed(*feed, *quote, *max_age_secs, resolver),
            ValuationStrategy::AmmTwap {
                pair,
                quote_asset,
                window_secs,
                max_age_secs,
            } => resolve_amm_twap(
                asset,
                *pair,
                *quote_asset,
                *window_secs,
                *max_age_secs,
                resolver,
            ),
            ValuationStrategy::LpShare { pool } => resolve_lp_share(asset, *pool, resolver),
            ValuationStrategy::VaultShare { underlying } => {
                let rate = fresh_rate(asset, resolver)?;
                let underlying_price = resolver.resolve(*underlying)?;
                mul_wad(underlying_price, rate)
            }
            ValuationStrategy::StakingDerivative { wrapped } => {
                let wrapped_price = resolver.resolve(*wrapped)?;
                let ratio = fresh_rate(asset, resolver)?;
                mul_wad(wrapped_price, ratio)
            }
            ValuationStrategy::Fixed { value } => decimal_to_wad(*value),
        }
    }
}

fn fresh_rate(asset: Asset, resolver: &dyn PriceResolver) -> OracleResult<U256> {
    let state = resolver.state();
    state
        .rates()
        .fresh_rate(asset, resolver.now(), state.settings().max_rate_age_secs)
}

fn resolve_direct_feed(
    feed: Address,
    quote: FeedQuote,
    max_age_secs: Option<u64>,
    resolver: &dyn PriceResolver,
) -> OracleResult<U256> {
    let state = resolver.state();
    let settings = state.settings();
    let max_age = max_age_secs.unwrap_or(settings.default_max_feed_age_secs);
    let price = state.feeds().fresh_wad(feed, resolver.now(), max_age)?;

    match quote {
        FeedQuote::Base => Ok(price),
        FeedQuote::Usd => {
            let usd_feed = settings
                .usd_base_feed
                .ok_or_else(|| OracleError::invalid("USD/base feed is not configured"))?;
            let usd_per_base = state.feeds().fresh_wad(
                usd_feed,
                resolver.now(),
                settings.usd_base_feed_max_age_secs,
            )?;
            div_wad(price, usd_per_base)
        }
    }
}

fn resolve_amm_twap(
    asset: Asset,
    pair: PairId,
    quote_asset: Asset,
    window_secs: u64,
    max_age_secs: Option<u64>,
    resolver: &dyn PriceResolver,
) -> OracleResult<U256> {
    let state = resolver.state();
    let quote = state.observations().twap(pair, window_secs)?;

    let max_age = max_age_secs.unwrap_or(state.settings().default_max_feed_age_secs);
    let age = age_of(quote.end.timestamp, resolver.now());
    if age > max_age {
        return Err(OracleError::StaleFeed {
            feed: pair,
            age,
            max_age,
        });
    }

    // raw quote 단위 / raw asset 단위 -> 자산 1개당 quote 자산 개수
    let raw = quote.to_wad()?;
    let asset_decimals = state.assets().decimals(asset)?;
    let quote_decimals = state.assets().decimals(quote_asset)?;
    let relative = mul_div(raw, pow10(asset_decimals)?, pow10(quote_decimals)?)?;

    let quote_price = resolver.resolve(quote_asset)?;
    debug!(
        "TWAP {:?} over {}s: {} elapsed, relative {}",
        pair,
        window_secs,
        quote.elapsed(),
        relative
    );
    mul_wad(relative, quote_price)
}

fn resolve_lp_share(asset: Asset, pool: PoolId, resolver: &dyn PriceResolver) -> OracleResult<U256> {
    let state = resolver.state();
    let registration = state.pools().lookup(pool)?;
    let pool_state = state.pools().state(pool)?;

    let prices = registration
        .constituents
        .iter()
        .map(|constituent| resolver.resolve(*constituent))
        .collect::<OracleResult<Vec<U256>>>()?;

    match registration.kind {
        PoolKind::Reserves => {
            let mut value = U256::zero();
            for ((constituent, reserve), price) in registration
                .constituents
                .iter()
                .zip(&pool_state.reserves)
                .zip(&prices)
            {
                let decimals = state.assets().decimals(*constituent)?;
                let leg = mul_div(*reserve, *price, pow10(decimals)?)?;
                value = value.checked_add(leg).ok_or(OracleError::MathOverflow)?;
            }
            let supply = to_wad(pool_state.total_supply, state.assets().decimals(asset)?)?;
            div_wad(value, supply)
        }
        PoolKind::ConstantProduct => {
            let r0 = to_wad(
                pool_state.reserves[0],
                state.assets().decimals(registration.constituents[0])?,
            )?;
            let r1 = to_wad(
                pool_state.reserves[1],
                state.assets().decimals(registration.constituents[1])?,
            )?;
            let sqrt_k = sqrt_product(r0, r1);
            let sqrt_p = sqrt_product(prices[0], prices[1]);
            let value = mul_wad(sqrt_k, sqrt_p)?
                .checked_mul(U256::from(2))
                .ok_or(OracleError::MathOverflow)?;
            let supply = to_wad(pool_state.total_supply, state.assets().decimals(asset)?)?;
            div_wad(value, supply)
        }
        PoolKind::StableSwap => {
            let virtual_price = pool_state
                .virtual_price
                .ok_or(OracleError::PoolStateUnavailable(pool))?;
            let min_price = prices
                .iter()
                .min()
                .copied()
                .ok_or(OracleError::EmptyPool(pool))?;
            mul_wad(virtual_price, min_price)
        }
        PoolKind::TriCrypto => {
            let virtual_price = pool_state
                .virtual_price
                .ok_or(OracleError::PoolStateUnavailable(pool))?;
            let mean = geometric_mean_wad(&prices)?;
            mul_wad(virtual_price, mean)?
                .checked_mul(U256::from(prices.len()))
                .ok_or(OracleError::MathOverflow)
        }
    }
}
