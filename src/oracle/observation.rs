use std::collections::{HashMap, VecDeque};

use ethers::types::U256;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{MIN_TWAP_OBSERVATIONS, WAD};
use crate::types::{OracleError, OracleResult, PairId};
use crate::utils::math::mul_div;

/// 누적 가격 관측값
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: u64,
    /// price * seconds 누적값
    pub cumulative_price: U256,
}

/// TWAP 결과 (정확한 유리수)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TwapQuote {
    pub start: Observation,
    pub end: Observation,
}

impl TwapQuote {
    /// 누적 가격 차이 (분자)
    pub fn delta_cumulative(&self) -> U256 {
        self.end.cumulative_price - self.start.cumulative_price
    }

    /// 경과 시간 (분모)
    pub fn elapsed(&self) -> u64 {
        self.end.timestamp - self.start.timestamp
    }

    /// WAD 변환 (18자리에서 내림)
    pub fn to_wad(&self) -> OracleResult<U256> {
        mul_div(self.delta_cumulative(), WAD, U256::from(self.elapsed()))
    }
}

/// 페어별 누적 가격 시계열
#[derive(Debug, Clone)]
pub struct ObservationBuffer {
    series: HashMap<PairId, VecDeque<Observation>>,
    retention_secs: u64,
    max_per_pair: usize,
}

impl ObservationBuffer {
    pub fn new(retention_secs: u64, max_per_pair: usize) -> Self {
        Self {
            series: HashMap::new(),
            retention_secs,
            max_per_pair: max_per_pair.max(MIN_TWAP_OBSERVATIONS),
        }
    }

    /// 관측값 기록 (timestamp는 페어별로 엄격히 증가해야 함)
    pub fn record(
        &mut self,
        pair: PairId,
        cumulative_price: U256,
        timestamp: u64,
    ) -> OracleResult<()> {
        let series = self.series.entry(pair).or_default();

        if let Some(last) = series.back() {
            if timestamp <= last.timestamp {
                return Err(OracleError::NonMonotonicTimestamp {
                    key: pair,
                    last: last.timestamp,
                    new: timestamp,
                });
            }
            if cumulative_price < last.cumulative_price {
                return Err(OracleError::invalid(format!(
                    "cumulative price for {:?} decreased at {}",
                    pair, timestamp
                )));
            }
        }

        series.push_back(Observation {
            timestamp,
            cumulative_price,
        });
        Self::prune(series, self.retention_secs, self.max_per_pair);
        Ok(())
    }

    /// 보존 기간 밖의 관측값 정리
    ///
    /// `latest - retention` 이전의 가장 최근 관측값 하나는 윈도우 경계로 남긴다.
    /// 개수 상한을 넘으면 가장 오래된 것과 최신 것은 두고 중간을 솎아낸다.
    fn prune(series: &mut VecDeque<Observation>, retention_secs: u64, max_per_pair: usize) {
        let Some(latest) = series.back().map(|o| o.timestamp) else {
            return;
        };
        let cutoff = latest.saturating_sub(retention_secs);

        let mut pruned = 0usize;
        while series.len() > MIN_TWAP_OBSERVATIONS
            && series.get(1).map_or(false, |next| next.timestamp <= cutoff)
        {
            series.pop_front();
            pruned += 1;
        }
        while series.len() > max_per_pair && series.len() > MIN_TWAP_OBSERVATIONS {
            // 제거해도 이웃 간격이 가장 적게 벌어지는 중간 관측값
            let Some(index) = (1..series.len() - 1)
                .min_by_key(|&i| series[i + 1].timestamp - series[i - 1].timestamp)
            else {
                break;
            };
            series.remove(index);
            pruned += 1;
        }

        if pruned > 0 {
            debug!("Pruned {} observations (cutoff {})", pruned, cutoff);
        }
    }

    /// 최신 관측값으로 끝나는 `window`초 TWAP
    ///
    /// 시작점은 `end - window` 이하의 가장 최근 관측값.
    pub fn twap(&self, pair: PairId, window: u64) -> OracleResult<TwapQuote> {
        if window == 0 {
            return Err(OracleError::invalid("TWAP window must be positive"));
        }

        let insufficient = || OracleError::InsufficientObservations { pair, window };
        let series = self.series.get(&pair).ok_or_else(insufficient)?;
        if series.len() < MIN_TWAP_OBSERVATIONS {
            return Err(insufficient());
        }

        let end = *series.back().ok_or_else(insufficient)?;
        let target = end.timestamp.checked_sub(window).ok_or_else(insufficient)?;
        let start = series
            .iter()
            .rev()
            .find(|o| o.timestamp <= target)
            .copied()
            .ok_or_else(insufficient)?;

        Ok(TwapQuote { start, end })
    }

    pub fn latest(&self, pair: PairId) -> Option<&Observation> {
        self.series.get(&pair).and_then(|s| s.back())
    }

    pub fn len(&self, pair: PairId) -> usize {
        self.series.get(&pair).map_or(0, |s| s.len())
    }

    pub fn pairs(&self) -> impl Iterator<Item = &PairId> {
        self.series.keys()
    }
}
