//! 차트 패턴 인식 모듈.
//!
//! 규칙 기반으로 가격 형태를 분석하는 무상태 스캐너입니다. 학습이
//! 필요 없으므로 항상 사용 가능합니다.
//!
//! 지원 패턴:
//! - 반전 패턴: Double Top/Bottom, Head and Shoulders (정/역)
//! - 지속 패턴: Ascending/Descending/Symmetrical Triangle
//! - 지지/저항 돌파
//!
//! 모든 매칭은 피봇 포인트(프로미넌스 기준을 만족하는 피크/밸리)
//! 위에서 이루어지며, 신뢰도는 기하학적 근접도에서 파생됩니다.

use analytics_core::{AnalyticsError, AnalyticsResult, Candle};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 차트 패턴 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    /// Double Top - 이중 천장 (하락 반전)
    DoubleTop,
    /// Double Bottom - 이중 바닥 (상승 반전)
    DoubleBottom,
    /// Head and Shoulders - 머리어깨형 (하락 반전)
    HeadAndShoulders,
    /// Inverse Head and Shoulders - 역머리어깨형 (상승 반전)
    InverseHeadAndShoulders,
    /// Ascending Triangle - 상승 삼각형 (상승 지속)
    AscendingTriangle,
    /// Descending Triangle - 하락 삼각형 (하락 지속)
    DescendingTriangle,
    /// Symmetrical Triangle - 대칭 삼각형 (방향 불확실)
    SymmetricalTriangle,
    /// 저항선 상향 돌파
    ResistanceBreak,
    /// 지지선 하향 돌파
    SupportBreak,
}

/// 패턴이 제시하는 방향 신호.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Bullish,
    Bearish,
    Neutral,
}

/// 감지된 패턴 이벤트.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternEvent {
    /// 패턴 유형
    pub pattern_type: PatternType,
    /// 방향 신호
    pub signal: Signal,
    /// 신뢰도 (0.0 ~ 1.0)
    pub confidence: f64,
    /// 패턴 시작 시점
    pub start_date: DateTime<Utc>,
    /// 패턴 종료 시점
    pub end_date: DateTime<Utc>,
    /// 주요 가격 레벨 (neckline, peak 등)
    pub key_levels: HashMap<String, Decimal>,
    /// 목표가 (계산 가능한 경우)
    pub target_price: Option<Decimal>,
    /// 손절가 (계산 가능한 경우)
    pub stop_loss: Option<Decimal>,
    /// 사람이 읽을 수 있는 설명
    pub description: String,
}

/// 피크 또는 밸리 피봇 포인트.
#[derive(Debug, Clone, PartialEq)]
struct Pivot {
    index: usize,
    price: f64,
    timestamp: DateTime<Utc>,
    is_peak: bool,
}

/// 패턴 인식 설정.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternConfig {
    /// 피크/밸리 감지를 위한 좌우 탐색 범위
    pub pivot_lookback: usize,
    /// 피봇 최소 프로미넌스 (가격 대비 비율)
    pub min_prominence: f64,
    /// 패턴 감지를 위한 최소 캔들 수
    pub min_candles: usize,
    /// 가격 허용 오차 (같은 가격 레벨 판단용)
    pub price_tolerance: f64,
    /// 추세선 기울기 허용 오차 (%/봉)
    pub slope_tolerance: f64,
    /// 머리가 어깨보다 높아야 하는 최소 비율
    pub head_margin: f64,
    /// 지지/저항 레벨 최소 터치 횟수
    pub min_level_touches: usize,
    /// 돌파 판정 최소 마진 (레벨 대비 비율)
    pub break_margin: f64,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            pivot_lookback: 5,
            min_prominence: 0.01,
            min_candles: 20,
            price_tolerance: 0.02,
            slope_tolerance: 0.1,
            head_margin: 0.02,
            min_level_touches: 3,
            break_margin: 0.005,
        }
    }
}

/// 차트 패턴 스캐너.
pub struct PatternScanner {
    config: PatternConfig,
}

impl PatternScanner {
    /// 새 패턴 스캐너 생성.
    pub fn new(config: PatternConfig) -> Self {
        Self { config }
    }

    /// 기본 설정으로 패턴 스캐너 생성.
    pub fn with_defaults() -> Self {
        Self::new(PatternConfig::default())
    }

    /// 설정 반환.
    pub fn config(&self) -> &PatternConfig {
        &self.config
    }

    /// 캔들 이력에서 패턴 스캔.
    ///
    /// `min_confidence` 이상인 이벤트만 반환합니다. 패턴이 없으면 빈
    /// Vec을 반환하며, 이는 정상 결과입니다. 캔들은 오래된 것부터
    /// 최신 순이어야 합니다.
    pub fn scan(
        &self,
        candles: &[Candle],
        min_confidence: f64,
    ) -> AnalyticsResult<Vec<PatternEvent>> {
        if candles.len() < self.config.min_candles {
            return Err(AnalyticsError::InsufficientHistory {
                required: self.config.min_candles,
                actual: candles.len(),
            });
        }

        let prices = PriceSeries::from_candles(candles)?;
        let pivots = self.find_pivots(&prices);

        let mut events = Vec::new();
        events.extend(self.detect_double_patterns(&prices, &pivots));
        events.extend(self.detect_head_and_shoulders(&prices, &pivots));
        events.extend(self.detect_triangles(&prices, &pivots));
        events.extend(self.detect_level_breaks(&prices, &pivots));

        events.retain(|e| e.confidence >= min_confidence);
        Ok(events)
    }

    /// 프로미넌스 기준을 만족하는 피크/밸리 감지.
    fn find_pivots(&self, prices: &PriceSeries) -> Vec<Pivot> {
        let mut pivots = Vec::new();
        let lookback = self.config.pivot_lookback;
        let n = prices.len();

        if n < 2 * lookback + 1 {
            return pivots;
        }

        for i in lookback..n - lookback {
            let window = &prices.highs[i - lookback..=i + lookback];
            let window_lows = &prices.lows[i - lookback..=i + lookback];

            let current_high = prices.highs[i];
            let current_low = prices.lows[i];

            // 피크: 윈도우 내 최고가이면서 윈도우 최저가 대비 충분히 돌출
            let is_peak = window.iter().all(|&h| h <= current_high);
            if is_peak {
                let base = window_lows.iter().fold(f64::INFINITY, |a, &b| a.min(b));
                let prominence = (current_high - base) / current_high;
                if prominence >= self.config.min_prominence {
                    pivots.push(Pivot {
                        index: i,
                        price: current_high,
                        timestamp: prices.timestamps[i],
                        is_peak: true,
                    });
                }
            }

            let is_valley = window_lows.iter().all(|&l| l >= current_low);
            if is_valley {
                let top = window.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
                let prominence = (top - current_low) / top;
                if prominence >= self.config.min_prominence {
                    pivots.push(Pivot {
                        index: i,
                        price: current_low,
                        timestamp: prices.timestamps[i],
                        is_peak: false,
                    });
                }
            }
        }

        pivots
    }

    /// Double Top/Bottom 감지.
    ///
    /// 두 극점이 `price_tolerance` 내에서 같고, 중간 극점이 충분히
    /// 구분되며, 마지막 종가가 넥라인을 넘어선 (완성된) 패턴만
    /// 이벤트가 됩니다.
    fn detect_double_patterns(&self, prices: &PriceSeries, pivots: &[Pivot]) -> Vec<PatternEvent> {
        let mut events = Vec::new();

        let peaks: Vec<&Pivot> = pivots.iter().filter(|p| p.is_peak).collect();
        let valleys: Vec<&Pivot> = pivots.iter().filter(|p| !p.is_peak).collect();
        let last_close = prices.last_close();

        // Double Top
        for pair in peaks.windows(2) {
            let (first, second) = (pair[0], pair[1]);

            let avg = (first.price + second.price) / 2.0;
            let diff_ratio = (first.price - second.price).abs() / avg;
            if diff_ratio > self.config.price_tolerance {
                continue;
            }

            // 중간 밸리 (넥라인)
            let Some(neckline) = valleys
                .iter()
                .filter(|v| v.index > first.index && v.index < second.index)
                .min_by(|a, b| total_cmp(a.price, b.price))
            else {
                continue;
            };

            // 넥라인이 피크와 충분히 구분되어야 함
            if (avg - neckline.price) / avg < self.config.price_tolerance {
                continue;
            }

            // 완성: 종가가 넥라인 아래로 이탈
            if last_close >= neckline.price {
                continue;
            }

            let height = avg - neckline.price;
            let target = neckline.price - height;

            events.push(PatternEvent {
                pattern_type: PatternType::DoubleTop,
                signal: Signal::Bearish,
                confidence: closeness_confidence(diff_ratio, self.config.price_tolerance),
                start_date: first.timestamp,
                end_date: prices.last_timestamp(),
                key_levels: level_map(&[
                    ("first_peak", first.price),
                    ("second_peak", second.price),
                    ("neckline", neckline.price),
                ]),
                target_price: to_decimal(target),
                stop_loss: to_decimal(avg),
                description: format!(
                    "Double top at {:.2} with neckline break below {:.2}",
                    avg, neckline.price
                ),
            });
        }

        // Double Bottom
        for pair in valleys.windows(2) {
            let (first, second) = (pair[0], pair[1]);

            let avg = (first.price + second.price) / 2.0;
            let diff_ratio = (first.price - second.price).abs() / avg;
            if diff_ratio > self.config.price_tolerance {
                continue;
            }

            let Some(neckline) = peaks
                .iter()
                .filter(|p| p.index > first.index && p.index < second.index)
                .max_by(|a, b| total_cmp(a.price, b.price))
            else {
                continue;
            };

            if (neckline.price - avg) / avg < self.config.price_tolerance {
                continue;
            }

            if last_close <= neckline.price {
                continue;
            }

            let height = neckline.price - avg;
            let target = neckline.price + height;

            events.push(PatternEvent {
                pattern_type: PatternType::DoubleBottom,
                signal: Signal::Bullish,
                confidence: closeness_confidence(diff_ratio, self.config.price_tolerance),
                start_date: first.timestamp,
                end_date: prices.last_timestamp(),
                key_levels: level_map(&[
                    ("first_bottom", first.price),
                    ("second_bottom", second.price),
                    ("neckline", neckline.price),
                ]),
                target_price: to_decimal(target),
                stop_loss: to_decimal(avg),
                description: format!(
                    "Double bottom at {:.2} with neckline break above {:.2}",
                    avg, neckline.price
                ),
            });
        }

        events
    }

    /// Head and Shoulders (정/역) 감지.
    fn detect_head_and_shoulders(
        &self,
        prices: &PriceSeries,
        pivots: &[Pivot],
    ) -> Vec<PatternEvent> {
        let mut events = Vec::new();

        let peaks: Vec<&Pivot> = pivots.iter().filter(|p| p.is_peak).collect();
        let valleys: Vec<&Pivot> = pivots.iter().filter(|p| !p.is_peak).collect();

        // 정배열: 연속 3개 피크, 가운데가 머리
        for triple in peaks.windows(3) {
            let (left, head, right) = (triple[0], triple[1], triple[2]);

            let shoulder_avg = (left.price + right.price) / 2.0;
            // 머리가 양 어깨보다 head_margin 이상 높아야 함
            if head.price < shoulder_avg * (1.0 + self.config.head_margin) {
                continue;
            }

            let shoulder_diff = (left.price - right.price).abs() / shoulder_avg;
            if shoulder_diff > self.config.price_tolerance {
                continue;
            }

            // 어깨 사이 밸리로 넥라인 추정
            let neckline_points: Vec<&&Pivot> = valleys
                .iter()
                .filter(|v| v.index > left.index && v.index < right.index)
                .collect();
            if neckline_points.len() < 2 {
                continue;
            }
            let neckline = (neckline_points[0].price
                + neckline_points[neckline_points.len() - 1].price)
                / 2.0;

            let height = head.price - neckline;
            events.push(PatternEvent {
                pattern_type: PatternType::HeadAndShoulders,
                signal: Signal::Bearish,
                confidence: closeness_confidence(shoulder_diff, self.config.price_tolerance),
                start_date: left.timestamp,
                end_date: right.timestamp,
                key_levels: level_map(&[
                    ("left_shoulder", left.price),
                    ("head", head.price),
                    ("right_shoulder", right.price),
                    ("neckline", neckline),
                ]),
                target_price: to_decimal(neckline - height),
                stop_loss: to_decimal(head.price),
                description: format!(
                    "Head and shoulders with head at {:.2}, neckline {:.2}",
                    head.price, neckline
                ),
            });
        }

        // 역배열: 연속 3개 밸리, 가운데가 머리
        for triple in valleys.windows(3) {
            let (left, head, right) = (triple[0], triple[1], triple[2]);

            let shoulder_avg = (left.price + right.price) / 2.0;
            if head.price > shoulder_avg * (1.0 - self.config.head_margin) {
                continue;
            }

            let shoulder_diff = (left.price - right.price).abs() / shoulder_avg;
            if shoulder_diff > self.config.price_tolerance {
                continue;
            }

            let neckline_points: Vec<&&Pivot> = peaks
                .iter()
                .filter(|p| p.index > left.index && p.index < right.index)
                .collect();
            if neckline_points.len() < 2 {
                continue;
            }
            let neckline = (neckline_points[0].price
                + neckline_points[neckline_points.len() - 1].price)
                / 2.0;

            let height = neckline - head.price;
            events.push(PatternEvent {
                pattern_type: PatternType::InverseHeadAndShoulders,
                signal: Signal::Bullish,
                confidence: closeness_confidence(shoulder_diff, self.config.price_tolerance),
                start_date: left.timestamp,
                end_date: right.timestamp,
                key_levels: level_map(&[
                    ("left_shoulder", left.price),
                    ("head", head.price),
                    ("right_shoulder", right.price),
                    ("neckline", neckline),
                ]),
                target_price: to_decimal(neckline + height),
                stop_loss: to_decimal(head.price),
                description: format!(
                    "Inverse head and shoulders with head at {:.2}, neckline {:.2}",
                    head.price, neckline
                ),
            });
        }

        events
    }

    /// Triangle 패턴 감지.
    ///
    /// 연속 피크/밸리 쌍의 정규화된 추세선 기울기(%/봉) 부호로
    /// ascending / descending / symmetrical을 구분합니다.
    fn detect_triangles(&self, prices: &PriceSeries, pivots: &[Pivot]) -> Vec<PatternEvent> {
        let mut events = Vec::new();

        let peaks: Vec<&Pivot> = pivots.iter().filter(|p| p.is_peak).collect();
        let valleys: Vec<&Pivot> = pivots.iter().filter(|p| !p.is_peak).collect();

        if peaks.len() < 2 || valleys.len() < 2 {
            return events;
        }

        let tolerance = self.config.slope_tolerance;

        for pi in 0..peaks.len() - 1 {
            for vi in 0..valleys.len() - 1 {
                let (peak1, peak2) = (peaks[pi], peaks[pi + 1]);
                let (valley1, valley2) = (valleys[vi], valleys[vi + 1]);

                // 두 추세선이 겹치는 구간이어야 함
                let start = peak1.index.max(valley1.index);
                let end = peak2.index.min(valley2.index);
                if end <= start {
                    continue;
                }

                let peak_slope = normalized_slope(peak1, peak2);
                let valley_slope = normalized_slope(valley1, valley2);

                let (pattern_type, signal, target) =
                    if peak_slope.abs() < tolerance && valley_slope > tolerance {
                        // 상단 평행, 하단 상승
                        let height = peak1.price - valley1.price;
                        (
                            PatternType::AscendingTriangle,
                            Signal::Bullish,
                            Some(peak1.price + height),
                        )
                    } else if valley_slope.abs() < tolerance && peak_slope < -tolerance {
                        // 하단 평행, 상단 하락
                        let height = peak1.price - valley1.price;
                        (
                            PatternType::DescendingTriangle,
                            Signal::Bearish,
                            Some(valley1.price - height),
                        )
                    } else if peak_slope < -tolerance && valley_slope > tolerance {
                        // 양쪽 수렴, 방향 불확실
                        (PatternType::SymmetricalTriangle, Signal::Neutral, None)
                    } else {
                        continue;
                    };

                // 수렴 정도가 뚜렷할수록 신뢰도 상승
                let convergence = (valley_slope - peak_slope).abs();
                let confidence = (0.5 + convergence / (tolerance * 10.0)).clamp(0.5, 0.9);

                events.push(PatternEvent {
                    pattern_type,
                    signal,
                    confidence,
                    start_date: prices.timestamps[start],
                    end_date: prices.timestamps[end],
                    key_levels: level_map(&[
                        ("resistance_start", peak1.price),
                        ("resistance_end", peak2.price),
                        ("support_start", valley1.price),
                        ("support_end", valley2.price),
                    ]),
                    target_price: target.and_then(to_decimal),
                    stop_loss: None,
                    description: format!(
                        "Triangle with resistance slope {:.3}%/bar, support slope {:.3}%/bar",
                        peak_slope, valley_slope
                    ),
                });
            }
        }

        events
    }

    /// 지지/저항 돌파 감지.
    ///
    /// `min_level_touches`회 이상 터치된 피봇 레벨을 현재 종가가
    /// `break_margin` 이상 넘어서면 이벤트가 됩니다.
    fn detect_level_breaks(&self, prices: &PriceSeries, pivots: &[Pivot]) -> Vec<PatternEvent> {
        let mut events = Vec::new();
        let last_close = prices.last_close();

        // 피크 레벨 군집 → 저항, 밸리 레벨 군집 → 지지
        for is_peak in [true, false] {
            let points: Vec<&Pivot> = pivots.iter().filter(|p| p.is_peak == is_peak).collect();
            let mut used = vec![false; points.len()];

            for i in 0..points.len() {
                if used[i] {
                    continue;
                }

                // 기준 레벨과 tolerance 내의 터치 수집
                let mut touches = vec![points[i]];
                for (j, point) in points.iter().enumerate().skip(i + 1) {
                    let diff = (point.price - points[i].price).abs() / points[i].price;
                    if diff <= self.config.price_tolerance {
                        touches.push(point);
                        used[j] = true;
                    }
                }

                if touches.len() < self.config.min_level_touches {
                    continue;
                }

                let level =
                    touches.iter().map(|t| t.price).sum::<f64>() / touches.len() as f64;
                let margin = self.config.break_margin;

                let broken = if is_peak {
                    last_close > level * (1.0 + margin)
                } else {
                    last_close < level * (1.0 - margin)
                };
                if !broken {
                    continue;
                }

                // 터치 구간의 반대편 극값으로 목표가 투영
                let first_idx = touches.iter().map(|t| t.index).min().unwrap_or(0);
                let last_idx = touches
                    .iter()
                    .map(|t| t.index)
                    .max()
                    .unwrap_or(prices.len() - 1);
                let span_lows = &prices.lows[first_idx..=last_idx];
                let span_highs = &prices.highs[first_idx..=last_idx];

                let (pattern_type, signal, target, stop) = if is_peak {
                    let base = span_lows.iter().fold(f64::INFINITY, |a, &b| a.min(b));
                    (
                        PatternType::ResistanceBreak,
                        Signal::Bullish,
                        level + (level - base),
                        level,
                    )
                } else {
                    let top = span_highs.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
                    (
                        PatternType::SupportBreak,
                        Signal::Bearish,
                        level - (top - level),
                        level,
                    )
                };

                // 터치가 많고 마진이 클수록 신뢰도 상승
                let touch_score = (touches.len() as f64 / 5.0).min(1.0);
                let break_ratio = ((last_close - level).abs() / level / margin).min(2.0) / 2.0;
                let confidence = (0.4 + 0.3 * touch_score + 0.3 * break_ratio).clamp(0.0, 1.0);

                events.push(PatternEvent {
                    pattern_type,
                    signal,
                    confidence,
                    start_date: touches[0].timestamp,
                    end_date: prices.last_timestamp(),
                    key_levels: level_map(&[("level", level)]),
                    target_price: to_decimal(target),
                    stop_loss: to_decimal(stop),
                    description: format!(
                        "{} touched {} times, broken at close {:.2}",
                        if is_peak { "Resistance" } else { "Support" },
                        touches.len(),
                        last_close
                    ),
                });
            }
        }

        events
    }
}

/// 캔들에서 변환된 f64 가격 시계열.
struct PriceSeries {
    highs: Vec<f64>,
    lows: Vec<f64>,
    closes: Vec<f64>,
    timestamps: Vec<DateTime<Utc>>,
}

impl PriceSeries {
    fn from_candles(candles: &[Candle]) -> AnalyticsResult<Self> {
        let mut highs = Vec::with_capacity(candles.len());
        let mut lows = Vec::with_capacity(candles.len());
        let mut closes = Vec::with_capacity(candles.len());
        let mut timestamps = Vec::with_capacity(candles.len());

        for candle in candles {
            let high = candle.high.to_f64();
            let low = candle.low.to_f64();
            let close = candle.close.to_f64();
            match (high, low, close) {
                (Some(h), Some(l), Some(c)) if h > 0.0 && l > 0.0 && c > 0.0 => {
                    highs.push(h);
                    lows.push(l);
                    closes.push(c);
                    timestamps.push(candle.timestamp);
                }
                _ => {
                    return Err(AnalyticsError::InvalidInput(format!(
                        "invalid candle prices at {}",
                        candle.timestamp
                    )));
                }
            }
        }

        Ok(Self {
            highs,
            lows,
            closes,
            timestamps,
        })
    }

    fn len(&self) -> usize {
        self.closes.len()
    }

    fn last_close(&self) -> f64 {
        self.closes[self.closes.len() - 1]
    }

    fn last_timestamp(&self) -> DateTime<Utc> {
        self.timestamps[self.timestamps.len() - 1]
    }
}

/// 두 피봇 사이의 정규화된 기울기 (%/봉).
fn normalized_slope(a: &Pivot, b: &Pivot) -> f64 {
    let bars = (b.index as f64 - a.index as f64).abs().max(1.0);
    (b.price - a.price) / a.price / bars * 100.0
}

/// 허용 오차 대비 편차가 작을수록 높은 신뢰도 (0.5 ~ 1.0).
fn closeness_confidence(diff_ratio: f64, tolerance: f64) -> f64 {
    let closeness = 1.0 - (diff_ratio / tolerance).clamp(0.0, 1.0);
    0.5 + 0.5 * closeness
}

fn total_cmp(a: f64, b: f64) -> std::cmp::Ordering {
    a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal)
}

fn to_decimal(value: f64) -> Option<Decimal> {
    Decimal::from_f64_retain(value)
}

fn level_map(levels: &[(&str, f64)]) -> HashMap<String, Decimal> {
    levels
        .iter()
        .filter_map(|(name, value)| to_decimal(*value).map(|d| (name.to_string(), d)))
        .collect()
}
