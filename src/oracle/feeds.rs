use std::collections::HashMap;

use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::constants::MAX_FEED_DECIMALS;
use crate::types::{Asset, OracleError, OracleResult};
use crate::utils::math::to_wad;
use crate::utils::time::age_of;

/// 외부 피드 라운드 (Chainlink latestRoundData 형태)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedRound {
    pub answer: U256,
    pub decimals: u8,
    pub updated_at: u64,
}

impl FeedRound {
    pub fn to_wad(&self) -> OracleResult<U256> {
        to_wad(self.answer, self.decimals)
    }
}

/// 피드 저장소 (feed id => 최신 라운드)
#[derive(Debug, Clone, Default)]
pub struct FeedStore {
    rounds: HashMap<Address, FeedRound>,
}

impl FeedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 라운드 갱신 (이전 라운드보다 오래된 값은 거절)
    pub fn set(&mut self, feed: Address, round: FeedRound) -> OracleResult<()> {
        if round.decimals > MAX_FEED_DECIMALS {
            return Err(OracleError::invalid(format!(
                "feed {:?} reports {} decimals",
                feed, round.decimals
            )));
        }
        if let Some(previous) = self.rounds.get(&feed) {
            if round.updated_at < previous.updated_at {
                return Err(OracleError::NonMonotonicTimestamp {
                    key: feed,
                    last: previous.updated_at,
                    new: round.updated_at,
                });
            }
        }
        self.rounds.insert(feed, round);
        Ok(())
    }

    pub fn latest(&self, feed: Address) -> OracleResult<&FeedRound> {
        self.rounds.get(&feed).ok_or(OracleError::NoFeed(feed))
    }

    /// 신선도 검사 후 WAD 값 반환
    pub fn fresh_wad(&self, feed: Address, now: u64, max_age: u64) -> OracleResult<U256> {
        let round = self.latest(feed)?;
        let age = age_of(round.updated_at, now);
        if age > max_age {
            return Err(OracleError::StaleFeed { feed, age, max_age });
        }
        round.to_wad()
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }
}

/// 환율 항목 (share -> underlying, WAD)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateEntry {
    pub rate: U256,
    pub updated_at: u64,
}

/// vault share / staking derivative 환율 저장소
#[derive(Debug, Clone, Default)]
pub struct RateStore {
    rates: HashMap<Asset, RateEntry>,
}

impl RateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 환율 갱신 (이전 값보다 오래된 갱신은 거절)
    pub fn set(&mut self, asset: Asset, rate: U256, updated_at: u64) -> OracleResult<()> {
        if let Some(previous) = self.rates.get(&asset) {
            if updated_at < previous.updated_at {
                return Err(OracleError::NonMonotonicTimestamp {
                    key: asset,
                    last: previous.updated_at,
                    new: updated_at,
                });
            }
        }
        self.rates.insert(asset, RateEntry { rate, updated_at });
        Ok(())
    }

    pub fn rate(&self, asset: Asset) -> OracleResult<U256> {
        self.rates
            .get(&asset)
            .map(|entry| entry.rate)
            .ok_or(OracleError::ExchangeRateUnavailable(asset))
    }

    /// 신선도 검사 후 환율 반환
    pub fn fresh_rate(&self, asset: Asset, now: u64, max_age: u64) -> OracleResult<U256> {
        let entry = self
            .rates
            .get(&asset)
            .ok_or(OracleError::ExchangeRateUnavailable(asset))?;
        let age = age_of(entry.updated_at, now);
        if age > max_age {
            return Err(OracleError::StaleFeed {
                feed: asset,
                age,
                max_age,
            });
        }
        Ok(entry.rate)
    }

    pub fn entry(&self, asset: Asset) -> Option<&RateEntry> {
        self.rates.get(&asset)
    }
}
