//! Adaptive learning engine: long-lived provider profiles and routing.
//!
//! Consumes every completed competition, maintains per-provider profiles
//! (win rate, EMA score/latency/cost, category performance, trend) and
//! answers "which providers should handle task X" queries. This component
//! never fails outward; malformed input degrades to a neutral result and a
//! log line, because worse routing beats broken execution.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::RwLock;
use tracing::{debug, warn};

use crate::config::LearningConfig;

/// Score-difference threshold between window halves for a trend call.
const TREND_THRESHOLD: f64 = 5.0;
/// Category EMA win-rate bounds for strengths and weaknesses.
const STRENGTH_THRESHOLD: f64 = 0.7;
const WEAKNESS_THRESHOLD: f64 = 0.3;

/// Recent performance direction of one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Improving,
    Stable,
    Declining,
    InsufficientData,
}

/// One competition outcome for one provider, kept for trend detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub provider_id: String,
    pub won: bool,
    pub score: f64,
    pub category: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Long-lived per-provider performance profile.
///
/// Created lazily on first sighting, never deleted during the process
/// lifetime. `win_rate` is always recomputed from `wins` and
/// `total_competitions`, never set independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderProfile {
    pub provider_id: String,
    pub total_competitions: u64,
    pub wins: u64,
    pub win_rate: f64,
    /// EMA of the provider's aggregate scores.
    pub score: f64,
    /// EMA of observed latency.
    pub latency_ms: f64,
    /// EMA of observed cost.
    pub cost_usd: f64,
    /// Category → EMA of the binary won/lost signal.
    pub category_performance: BTreeMap<String, f64>,
    /// Categories with EMA win-rate ≥ 0.7, best first.
    pub strengths: Vec<String>,
    /// Categories with EMA win-rate ≤ 0.3, worst first.
    pub weaknesses: Vec<String>,
    pub trend: Trend,
    pub last_updated: DateTime<Utc>,
}

impl ProviderProfile {
    fn new(provider_id: &str) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            total_competitions: 0,
            wins: 0,
            win_rate: 0.0,
            score: 0.0,
            latency_ms: 0.0,
            cost_usd: 0.0,
            category_performance: BTreeMap::new(),
            strengths: Vec::new(),
            weaknesses: Vec::new(),
            trend: Trend::InsufficientData,
            last_updated: Utc::now(),
        }
    }
}

/// Ranked provider suggestion for an upcoming task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub ranked_providers: Vec<String>,
    /// Gap-based confidence in the top pick, in [0, 1].
    pub confidence: f64,
    pub reasoning: String,
    /// Whether the requested category informed the ranking.
    pub category_match: bool,
}

impl RecommendationResult {
    fn empty(reasoning: impl Into<String>) -> Self {
        Self {
            ranked_providers: Vec::new(),
            confidence: 0.0,
            reasoning: reasoning.into(),
            category_match: false,
        }
    }
}

/// The engine itself. Construct one instance and share it; profile writes
/// serialize through the lock so concurrent competitions cannot race the
/// EMA arithmetic, while recommendation reads take cheap snapshots.
pub struct AdaptiveLearningEngine {
    config: LearningConfig,
    profiles: RwLock<HashMap<String, ProviderProfile>>,
    history: RwLock<VecDeque<Observation>>,
}

impl AdaptiveLearningEngine {
    pub fn new(config: LearningConfig) -> Self {
        Self {
            config,
            profiles: RwLock::new(HashMap::new()),
            history: RwLock::new(VecDeque::new()),
        }
    }

    /// Record one provider's outcome from a completed competition.
    pub fn update(
        &self,
        provider_id: &str,
        won: bool,
        score: f64,
        latency_ms: f64,
        cost_usd: f64,
        category: Option<&str>,
    ) {
        if provider_id.is_empty() {
            warn!("learning update with empty provider id, ignoring");
            return;
        }
        let now = Utc::now();
        let alpha = self.config.ema_alpha;

        {
            let mut history = match self.history.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            history.push_back(Observation {
                provider_id: provider_id.to_string(),
                won,
                score,
                category: category.map(str::to_string),
                timestamp: now,
            });
            while history.len() > self.config.history_capacity {
                history.pop_front();
            }
        }

        let trend = self.detect_trend(provider_id, now);

        let mut profiles = match self.profiles.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let profile = profiles
            .entry(provider_id.to_string())
            .or_insert_with(|| ProviderProfile::new(provider_id));

        profile.total_competitions += 1;
        if won {
            profile.wins += 1;
        }
        profile.win_rate = profile.wins as f64 / profile.total_competitions as f64;

        // First observation seeds the EMA directly instead of blending
        // with the zero initial value.
        if profile.total_competitions == 1 {
            profile.score = score;
            profile.latency_ms = latency_ms;
            profile.cost_usd = cost_usd;
        } else {
            profile.score = alpha * score + (1.0 - alpha) * profile.score;
            profile.latency_ms = alpha * latency_ms + (1.0 - alpha) * profile.latency_ms;
            profile.cost_usd = alpha * cost_usd + (1.0 - alpha) * profile.cost_usd;
        }

        if let Some(category) = category {
            let signal = if won { 1.0 } else { 0.0 };
            match profile.category_performance.get(category).copied() {
                Some(previous) => {
                    profile
                        .category_performance
                        .insert(category.to_string(), alpha * signal + (1.0 - alpha) * previous);
                }
                None => {
                    profile.category_performance.insert(category.to_string(), signal);
                }
            }
        }

        profile.trend = trend;
        Self::recompute_strengths(profile);
        profile.last_updated = now;

        debug!(
            provider = provider_id,
            won,
            win_rate = profile.win_rate,
            ema_score = profile.score,
            trend = ?profile.trend,
            "provider profile updated"
        );
    }

    /// Trend over the lookback window: the provider's recent observations
    /// are split chronologically in half and the mean scores compared.
    fn detect_trend(&self, provider_id: &str, now: DateTime<Utc>) -> Trend {
        let cutoff = now - Duration::days(self.config.lookback_days);
        let history = match self.history.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let recent: Vec<f64> = history
            .iter()
            .filter(|o| o.provider_id == provider_id && o.timestamp >= cutoff)
            .map(|o| o.score)
            .collect();

        if recent.len() < self.config.min_competitions_for_trend {
            return Trend::InsufficientData;
        }

        let mid = recent.len() / 2;
        let earlier = &recent[..mid];
        let later = &recent[mid..];
        let mean = |s: &[f64]| s.iter().sum::<f64>() / s.len() as f64;
        let diff = mean(later) - mean(earlier);

        if diff > TREND_THRESHOLD {
            Trend::Improving
        } else if diff < -TREND_THRESHOLD {
            Trend::Declining
        } else {
            Trend::Stable
        }
    }

    fn recompute_strengths(profile: &mut ProviderProfile) {
        let mut strengths: Vec<(&String, f64)> = profile
            .category_performance
            .iter()
            .filter(|(_, rate)| **rate >= STRENGTH_THRESHOLD)
            .map(|(c, r)| (c, *r))
            .collect();
        strengths.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let mut weaknesses: Vec<(&String, f64)> = profile
            .category_performance
            .iter()
            .filter(|(_, rate)| **rate <= WEAKNESS_THRESHOLD)
            .map(|(c, r)| (c, *r))
            .collect();
        weaknesses.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));

        profile.strengths = strengths.into_iter().map(|(c, _)| c.clone()).collect();
        profile.weaknesses = weaknesses.into_iter().map(|(c, _)| c.clone()).collect();
    }

    /// Rank known providers for an upcoming task.
    pub fn recommend(
        &self,
        category: Option<&str>,
        max_providers: usize,
        prefer_fast: bool,
        prefer_cheap: bool,
    ) -> RecommendationResult {
        let profiles: Vec<ProviderProfile> = {
            let guard = match self.profiles.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.values().cloned().collect()
        };

        if profiles.is_empty() {
            debug!("recommendation requested with no known providers");
            return RecommendationResult::empty("no providers have competed yet");
        }

        let max_latency = profiles
            .iter()
            .map(|p| p.latency_ms)
            .fold(0.0f64, f64::max);
        let max_cost = profiles.iter().map(|p| p.cost_usd).fold(0.0f64, f64::max);

        let category_known = |p: &ProviderProfile| {
            category
                .and_then(|c| p.category_performance.get(c).copied())
        };
        let category_match = profiles.iter().any(|p| category_known(p).is_some());

        let mut scored: Vec<(String, f64)> = profiles
            .iter()
            .map(|p| {
                let mut value = match category_known(p) {
                    Some(rate) => rate * 50.0,
                    None => p.win_rate * 30.0,
                };
                value += match p.trend {
                    Trend::Improving => 10.0,
                    Trend::Declining => -10.0,
                    Trend::Stable | Trend::InsufficientData => 0.0,
                };
                if prefer_fast && max_latency > 0.0 {
                    value += 20.0 * (1.0 - p.latency_ms / max_latency);
                }
                if prefer_cheap && max_cost > 0.0 {
                    value += 20.0 * (1.0 - p.cost_usd / max_cost);
                }
                (p.provider_id.clone(), value)
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let confidence = if scored.len() < 2 {
            0.5
        } else {
            ((scored[0].1 - scored[1].1) / 50.0).clamp(0.0, 1.0)
        };

        let basis = match (category, category_match) {
            (Some(c), true) => format!("category '{c}' performance"),
            (Some(c), false) => format!("overall win rate (no data for category '{c}')"),
            (None, _) => "overall win rate".to_string(),
        };
        let mut qualifiers = Vec::new();
        if prefer_fast {
            qualifiers.push("low latency");
        }
        if prefer_cheap {
            qualifiers.push("low cost");
        }
        let reasoning = if qualifiers.is_empty() {
            format!("ranked {} providers by {basis} and trend", scored.len())
        } else {
            format!(
                "ranked {} providers by {basis}, trend, and {}",
                scored.len(),
                qualifiers.join(" and ")
            )
        };

        RecommendationResult {
            ranked_providers: scored
                .into_iter()
                .take(max_providers)
                .map(|(id, _)| id)
                .collect(),
            confidence,
            reasoning,
            category_match,
        }
    }

    /// Snapshot of one provider's profile.
    pub fn get_profile(&self, provider_id: &str) -> Option<ProviderProfile> {
        let guard = match self.profiles.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.get(provider_id).cloned()
    }

    /// Top providers by win rate; ties break by total wins then id.
    pub fn leaderboard(&self, top_n: usize) -> Vec<ProviderProfile> {
        let mut profiles: Vec<ProviderProfile> = {
            let guard = match self.profiles.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.values().cloned().collect()
        };
        profiles.sort_by(|a, b| {
            b.win_rate
                .total_cmp(&a.win_rate)
                .then_with(|| b.wins.cmp(&a.wins))
                .then_with(|| a.provider_id.cmp(&b.provider_id))
        });
        profiles.truncate(top_n);
        profiles
    }
}
