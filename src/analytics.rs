use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, warn};

use crate::article::{Article, Sentiment};
use crate::db::{ArticleFilter, Store};
use crate::languages::REGIONS;
use crate::TARGET_DB;

/// Look-back windows compared per entity.
pub const COMPARISON_PERIODS: [i64; 3] = [7, 30, 90];
/// Entities with fewer articles in the lookback window are skipped, not
/// estimated.
pub const MIN_ARTICLES_FOR_ANALYSIS: i64 = 50;
/// The day-by-day series and event scan cover this window.
const DETAIL_PERIOD_DAYS: i64 = 30;
/// At most this many countries are analyzed per run.
const MAX_COUNTRIES: usize = 10;
/// Rolling window length for change-point detection, in observed days.
const ROLLING_WINDOW: usize = 3;
/// A rolling-average shift beyond this many percentage points is a change
/// point.
const CHANGE_THRESHOLD_PCT: f64 = 20.0;
/// Periods with fewer documents than this cannot carry a trend label.
const MIN_PERIOD_ARTICLES: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trend {
    Improving,
    Declining,
    Stable,
    InsufficientData,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Improving => "improving",
            Trend::Declining => "declining",
            Trend::Stable => "stable",
            Trend::InsufficientData => "insufficient_data",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SentimentBreakdown {
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
    pub positive_pct: f64,
    pub negative_pct: f64,
    pub neutral_pct: f64,
}

#[derive(Clone, Debug)]
pub struct PeriodSummary {
    pub period_days: i64,
    pub total_articles: usize,
    pub breakdown: SentimentBreakdown,
    pub top_topics: Vec<(String, usize)>,
    pub daily_average: f64,
    pub trend: Trend,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeDirection {
    Improvement,
    Deterioration,
}

#[derive(Clone, Debug)]
pub struct ChangePoint {
    pub date: NaiveDate,
    pub change_pct: f64,
    pub direction: ChangeDirection,
    pub current_avg: f64,
    pub previous_avg: f64,
}

#[derive(Clone, Debug)]
pub struct SignificantEvent {
    pub date: NaiveDate,
    pub article_count: usize,
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
    pub top_topics: Vec<(String, usize)>,
    pub deviation: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForwardTrend {
    Volatile,
    Improving,
    Declining,
    Stable,
    InsufficientData,
}

impl ForwardTrend {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForwardTrend::Volatile => "volatile",
            ForwardTrend::Improving => "improving",
            ForwardTrend::Declining => "declining",
            ForwardTrend::Stable => "stable",
            ForwardTrend::InsufficientData => "insufficient_data",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForwardOutlook {
    Uncertain,
    StablePositive,
    NeedsIntervention,
    Stable,
    InsufficientData,
}

impl ForwardOutlook {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForwardOutlook::Uncertain => "uncertain",
            ForwardOutlook::StablePositive => "stable_positive",
            ForwardOutlook::NeedsIntervention => "needs_intervention",
            ForwardOutlook::Stable => "stable",
            ForwardOutlook::InsufficientData => "insufficient_data",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Prediction {
    pub next_7_days: ForwardTrend,
    pub next_30_days: ForwardOutlook,
    pub confidence: Confidence,
    pub volatility_score: f64,
    pub influencing_factors: Vec<String>,
    pub explanation: String,
}

#[derive(Clone, Debug, Default)]
pub struct DaySentiment {
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
    pub total: usize,
}

impl DaySentiment {
    fn positive_ratio(&self) -> f64 {
        self.positive as f64 / (self.total.max(1)) as f64
    }
}

pub type DailySeries = BTreeMap<NaiveDate, DaySentiment>;

/// Temporal analysis of one entity (a source country or a region).
#[derive(Clone, Debug)]
pub struct EntityAnalysis {
    pub country: Option<String>,
    pub region: Option<String>,
    pub trends: Vec<PeriodSummary>,
    pub change_points: Vec<ChangePoint>,
    pub volatility_score: f64,
    pub significant_events: Vec<SignificantEvent>,
    pub prediction: Prediction,
}

impl EntityAnalysis {
    pub fn entity_name(&self) -> &str {
        self.country
            .as_deref()
            .or(self.region.as_deref())
            .unwrap_or("unknown")
    }

    /// The 7-day summary, which anchors the prediction.
    pub fn recent_summary(&self) -> Option<&PeriodSummary> {
        self.trends.iter().find(|t| t.period_days == 7)
    }
}

#[derive(Clone, Debug, Default)]
pub struct TemporalReport {
    pub by_country: Vec<EntityAnalysis>,
    pub by_region: Vec<EntityAnalysis>,
}

/// Computes sentiment trends, change points, volatility and a bounded
/// forward prediction per entity with sufficient history.
pub struct TemporalAnalyzer {
    store: Arc<dyn Store>,
}

impl TemporalAnalyzer {
    pub fn new(store: Arc<dyn Store>) -> TemporalAnalyzer {
        TemporalAnalyzer { store }
    }

    pub async fn analyze(&self, now: DateTime<Utc>) -> TemporalReport {
        let mut report = TemporalReport::default();

        let countries = match self
            .store
            .countries_with_sufficient_data(MIN_ARTICLES_FOR_ANALYSIS, *COMPARISON_PERIODS.last().unwrap_or(&90))
            .await
        {
            Ok(countries) => countries,
            Err(e) => {
                warn!(target: TARGET_DB, "Temporal analysis unavailable: {}", e);
                return report;
            }
        };

        for country in countries.into_iter().take(MAX_COUNTRIES) {
            match self.analyze_scope(Some(country.clone()), None, now).await {
                Ok(Some(analysis)) => report.by_country.push(analysis),
                Ok(None) => {}
                Err(e) => warn!("Temporal analysis failed for {}: {}", country, e),
            }
        }

        for region in REGIONS {
            match self.analyze_scope(None, Some(region.to_string()), now).await {
                Ok(Some(analysis)) => report.by_region.push(analysis),
                Ok(None) => {}
                Err(e) => warn!("Temporal analysis failed for {}: {}", region, e),
            }
        }

        info!(
            "Temporal analysis completed for {} countries and {} regions.",
            report.by_country.len(),
            report.by_region.len()
        );
        report
    }

    /// Returns `None` when the entity lacks sufficient historical volume.
    async fn analyze_scope(
        &self,
        country: Option<String>,
        region: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Option<EntityAnalysis>> {
        let lookback = *COMPARISON_PERIODS.iter().max().unwrap_or(&90);
        let filter = ArticleFilter {
            country: country.clone(),
            region: region.clone(),
            days_back: lookback,
            ..Default::default()
        };
        let articles = self.store.articles_since(&filter).await?;
        if (articles.len() as i64) < MIN_ARTICLES_FOR_ANALYSIS {
            return Ok(None);
        }

        Ok(Some(analyze_articles(country, region, &articles, now)))
    }
}

/// Pure entity analysis over a pre-fetched article set.
pub fn analyze_articles(
    country: Option<String>,
    region: Option<String>,
    articles: &[Article],
    now: DateTime<Utc>,
) -> EntityAnalysis {
    let trends: Vec<PeriodSummary> = COMPARISON_PERIODS
        .iter()
        .map(|&period| summarize_period(articles, period, now))
        .collect();

    let series = build_daily_series(articles, DETAIL_PERIOD_DAYS, now);
    let change_points = detect_change_points(&series);
    let volatility = volatility_score(&series);
    let significant_events = find_significant_events(articles, &series);

    let seven_day = trends
        .iter()
        .find(|t| t.period_days == 7)
        .cloned()
        .unwrap_or_else(|| summarize_period(articles, 7, now));
    let prediction = predict(&seven_day, volatility, &change_points);

    EntityAnalysis {
        country,
        region,
        trends,
        change_points,
        volatility_score: volatility,
        significant_events,
        prediction,
    }
}

/// Counts, percentages, top topics and trend label for one look-back window.
pub fn summarize_period(articles: &[Article], period_days: i64, now: DateTime<Utc>) -> PeriodSummary {
    let cutoff = now - Duration::days(period_days);
    let period_articles: Vec<&Article> = articles
        .iter()
        .filter(|a| a.effective_date() >= cutoff)
        .collect();

    let total = period_articles.len();
    let positive = period_articles
        .iter()
        .filter(|a| a.sentiment == Sentiment::Positive)
        .count();
    let negative = period_articles
        .iter()
        .filter(|a| a.sentiment == Sentiment::Negative)
        .count();
    let neutral = total - positive - negative;

    let pct = |count: usize| {
        if total == 0 {
            0.0
        } else {
            count as f64 / total as f64 * 100.0
        }
    };
    let breakdown = SentimentBreakdown {
        positive,
        negative,
        neutral,
        positive_pct: pct(positive),
        negative_pct: pct(negative),
        neutral_pct: pct(neutral),
    };

    let trend = if total < MIN_PERIOD_ARTICLES {
        Trend::InsufficientData
    } else if breakdown.positive_pct > breakdown.negative_pct + CHANGE_THRESHOLD_PCT {
        Trend::Improving
    } else if breakdown.negative_pct > breakdown.positive_pct + CHANGE_THRESHOLD_PCT {
        Trend::Declining
    } else {
        Trend::Stable
    };

    let mut topic_counts: HashMap<&str, usize> = HashMap::new();
    for article in &period_articles {
        for topic in &article.topics {
            *topic_counts.entry(topic.as_str()).or_default() += 1;
        }
    }
    let mut top_topics: Vec<(String, usize)> = topic_counts
        .into_iter()
        .map(|(topic, count)| (topic.to_string(), count))
        .collect();
    top_topics.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    top_topics.truncate(10);

    PeriodSummary {
        period_days,
        total_articles: total,
        breakdown,
        top_topics,
        daily_average: if period_days > 0 {
            total as f64 / period_days as f64
        } else {
            0.0
        },
        trend,
    }
}

/// Groups articles by UTC day over the detail window.
pub fn build_daily_series(articles: &[Article], period_days: i64, now: DateTime<Utc>) -> DailySeries {
    let cutoff = now - Duration::days(period_days);
    let mut series: DailySeries = BTreeMap::new();

    for article in articles {
        let date = article.effective_date();
        if date < cutoff {
            continue;
        }
        let day = series.entry(date.date_naive()).or_default();
        match article.sentiment {
            Sentiment::Positive => day.positive += 1,
            Sentiment::Negative => day.negative += 1,
            Sentiment::Neutral => day.neutral += 1,
        }
        day.total += 1;
    }
    series
}

/// Discrete change-point detection: the rolling 3-day positive-ratio average
/// is compared to the immediately preceding, non-overlapping 3-day window; a
/// shift beyond the threshold flags a change point. Windows are over observed
/// days, so at least seven days of data are required before anything can
/// fire.
pub fn detect_change_points(series: &DailySeries) -> Vec<ChangePoint> {
    let dates: Vec<NaiveDate> = series.keys().copied().collect();
    let ratios: Vec<f64> = dates
        .iter()
        .map(|date| series[date].positive_ratio())
        .collect();

    let mut changes = Vec::new();
    for i in (2 * ROLLING_WINDOW)..dates.len() {
        let current_avg = mean(&ratios[i + 1 - ROLLING_WINDOW..=i]);
        let previous_avg = mean(&ratios[i + 1 - 2 * ROLLING_WINDOW..=i - ROLLING_WINDOW]);
        let change_pct = (current_avg - previous_avg) * 100.0;

        if change_pct.abs() > CHANGE_THRESHOLD_PCT {
            changes.push(ChangePoint {
                date: dates[i],
                change_pct,
                direction: if change_pct > 0.0 {
                    ChangeDirection::Improvement
                } else {
                    ChangeDirection::Deterioration
                },
                current_avg,
                previous_avg,
            });
        }
    }
    changes
}

/// Sample standard deviation of daily positive ratios, scaled by 2 and
/// clamped to [0, 1]. Days without articles do not contribute; fewer than
/// two contributing days yields zero.
pub fn volatility_score(series: &DailySeries) -> f64 {
    let ratios: Vec<f64> = series
        .values()
        .filter(|day| day.total > 0)
        .map(|day| day.positive_ratio())
        .collect();
    if ratios.len() < 2 {
        return 0.0;
    }
    (sample_stdev(&ratios) * 2.0).min(1.0)
}

/// Days whose volume exceeds the window mean by more than two standard
/// deviations, annotated with the day's top topics. Requires a positive
/// volume spread; a flat series flags nothing.
pub fn find_significant_events(articles: &[Article], series: &DailySeries) -> Vec<SignificantEvent> {
    let counts: Vec<f64> = series.values().map(|day| day.total as f64).collect();
    if counts.len() < 2 {
        return Vec::new();
    }
    let avg = mean(&counts);
    let std = sample_stdev(&counts);
    if std <= 0.0 {
        return Vec::new();
    }

    let mut events = Vec::new();
    for (date, day) in series {
        if (day.total as f64) > avg + 2.0 * std {
            let mut topic_counts: HashMap<&str, usize> = HashMap::new();
            for article in articles {
                if article.effective_date().date_naive() != *date {
                    continue;
                }
                for topic in &article.topics {
                    *topic_counts.entry(topic.as_str()).or_default() += 1;
                }
            }
            let mut top_topics: Vec<(String, usize)> = topic_counts
                .into_iter()
                .map(|(topic, count)| (topic.to_string(), count))
                .collect();
            top_topics.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            top_topics.truncate(3);

            events.push(SignificantEvent {
                date: *date,
                article_count: day.total,
                positive: day.positive,
                negative: day.negative,
                neutral: day.neutral,
                top_topics,
                deviation: (day.total as f64 - avg) / std,
            });
        }
    }

    events.sort_by(|a, b| {
        b.deviation
            .partial_cmp(&a.deviation)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    events.truncate(10);
    events
}

/// Combines the recent trend, volatility, and change-point count into one of
/// five forward labels with a confidence tier.
pub fn predict(
    seven_day: &PeriodSummary,
    volatility: f64,
    change_points: &[ChangePoint],
) -> Prediction {
    let mut factors = Vec::new();
    if let Some(last) = change_points.last() {
        factors.push(format!("Recent trend change on {}", last.date));
    }
    if volatility > 0.5 {
        factors.push("High sentiment volatility".to_string());
    }
    if let Some((topic, _)) = seven_day.top_topics.first() {
        factors.push(format!("Dominant topic: {topic}"));
    }

    let (next_7_days, next_30_days, confidence) =
        if seven_day.total_articles < MIN_PERIOD_ARTICLES {
            (
                ForwardTrend::InsufficientData,
                ForwardOutlook::InsufficientData,
                Confidence::Low,
            )
        } else if volatility > 0.7 {
            (ForwardTrend::Volatile, ForwardOutlook::Uncertain, Confidence::Low)
        } else if seven_day.trend == Trend::Improving && change_points.len() < 2 {
            (
                ForwardTrend::Improving,
                ForwardOutlook::StablePositive,
                Confidence::High,
            )
        } else if seven_day.trend == Trend::Declining && change_points.len() < 2 {
            (
                ForwardTrend::Declining,
                ForwardOutlook::NeedsIntervention,
                Confidence::High,
            )
        } else {
            (ForwardTrend::Stable, ForwardOutlook::Stable, Confidence::Medium)
        };

    let explanation = if next_7_days == ForwardTrend::InsufficientData {
        "Not enough recent data for a reliable prediction".to_string()
    } else {
        let mut text = format!(
            "Sentiment is predicted to be {} over the next 7 days and {} over the next 30 days. This prediction has {} confidence",
            next_7_days.as_str(),
            next_30_days.as_str(),
            confidence.as_str()
        );
        if factors.is_empty() {
            text.push('.');
        } else {
            text.push_str(&format!(" due to: {}.", factors.join(", ")));
        }
        text
    };

    Prediction {
        next_7_days,
        next_30_days,
        confidence,
        volatility_score: volatility,
        influencing_factors: factors,
        explanation,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator).
fn sample_stdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let avg = mean(values);
    let variance = values
        .iter()
        .map(|v| (v - avg).powi(2))
        .sum::<f64>()
        / (values.len() - 1) as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::languages::Language;

    fn dated_article(url: &str, sentiment: Sentiment, days_ago: i64, now: DateTime<Utc>) -> Article {
        let mut article =
            Article::discovered(url, "title", "content", &Language::resolve("tr"), now)
                .expect("valid url");
        article.published_date = Some(now - Duration::days(days_ago));
        article.sentiment = sentiment;
        article
    }

    fn batch(positive: usize, negative: usize, now: DateTime<Utc>) -> Vec<Article> {
        let mut articles = Vec::new();
        for i in 0..positive {
            articles.push(dated_article(
                &format!("https://example.com/p{i}"),
                Sentiment::Positive,
                1,
                now,
            ));
        }
        for i in 0..negative {
            articles.push(dated_article(
                &format!("https://example.com/n{i}"),
                Sentiment::Negative,
                1,
                now,
            ));
        }
        articles
    }

    #[test]
    fn five_articles_at_eighty_twenty_is_improving() {
        let now = Utc::now();
        let articles = batch(4, 1, now);
        let summary = summarize_period(&articles, 7, now);
        assert_eq!(summary.total_articles, 5);
        assert_eq!(summary.trend, Trend::Improving);
    }

    #[test]
    fn four_articles_is_insufficient_regardless_of_ratio() {
        let now = Utc::now();
        let articles = batch(4, 0, now);
        let summary = summarize_period(&articles, 7, now);
        assert_eq!(summary.trend, Trend::InsufficientData);
    }

    #[test]
    fn balanced_window_is_stable() {
        let now = Utc::now();
        let articles = batch(3, 3, now);
        let summary = summarize_period(&articles, 7, now);
        assert_eq!(summary.trend, Trend::Stable);
    }

    #[test]
    fn inverse_ratio_is_declining() {
        let now = Utc::now();
        let articles = batch(1, 4, now);
        let summary = summarize_period(&articles, 7, now);
        assert_eq!(summary.trend, Trend::Declining);
    }

    fn series_from_ratios(ratios: &[(i64, usize, usize)], now: DateTime<Utc>) -> DailySeries {
        // (days_ago, positive, negative)
        let mut articles = Vec::new();
        for (days_ago, positive, negative) in ratios {
            for i in 0..*positive {
                articles.push(dated_article(
                    &format!("https://example.com/{days_ago}/p{i}"),
                    Sentiment::Positive,
                    *days_ago,
                    now,
                ));
            }
            for i in 0..*negative {
                articles.push(dated_article(
                    &format!("https://example.com/{days_ago}/n{i}"),
                    Sentiment::Negative,
                    *days_ago,
                    now,
                ));
            }
        }
        build_daily_series(&articles, DETAIL_PERIOD_DAYS, now)
    }

    #[test]
    fn volatility_is_zero_for_single_day() {
        let now = Utc::now();
        let series = series_from_ratios(&[(1, 3, 1)], now);
        assert_eq!(volatility_score(&series), 0.0);
    }

    #[test]
    fn volatility_monotonicity() {
        let now = Utc::now();
        // Same mean positive ratio (0.5), different dispersion.
        let flat = series_from_ratios(&[(1, 1, 1), (2, 1, 1), (3, 1, 1), (4, 1, 1)], now);
        let dispersed = series_from_ratios(&[(1, 2, 0), (2, 0, 2), (3, 2, 0), (4, 0, 2)], now);
        assert!(volatility_score(&dispersed) > volatility_score(&flat));
    }

    #[test]
    fn volatility_is_clamped() {
        let now = Utc::now();
        let dispersed = series_from_ratios(&[(1, 5, 0), (2, 0, 5), (3, 5, 0), (4, 0, 5)], now);
        assert!(volatility_score(&dispersed) <= 1.0);
    }

    #[test]
    fn change_point_fires_on_ratio_shift() {
        let now = Utc::now();
        // Three negative-dominated days followed by three positive-dominated
        // days: the rolling averages differ by far more than the threshold.
        let series = series_from_ratios(
            &[
                (7, 0, 3),
                (6, 0, 3),
                (5, 0, 3),
                (3, 3, 0),
                (2, 3, 0),
                (1, 3, 0),
            ],
            now,
        );
        // Only six observed days: not enough for a preceding window plus a
        // current window beyond it.
        assert!(detect_change_points(&series).is_empty());

        let series = series_from_ratios(
            &[
                (8, 0, 3),
                (7, 0, 3),
                (6, 0, 3),
                (5, 0, 3),
                (3, 3, 0),
                (2, 3, 0),
                (1, 3, 0),
            ],
            now,
        );
        let changes = detect_change_points(&series);
        assert!(!changes.is_empty());
        assert_eq!(changes[0].direction, ChangeDirection::Improvement);
        assert!(changes[0].change_pct > CHANGE_THRESHOLD_PCT);
    }

    #[test]
    fn steady_series_has_no_change_points() {
        let now = Utc::now();
        let series = series_from_ratios(
            &[
                (8, 2, 1),
                (7, 2, 1),
                (6, 2, 1),
                (5, 2, 1),
                (4, 2, 1),
                (3, 2, 1),
                (2, 2, 1),
                (1, 2, 1),
            ],
            now,
        );
        assert!(detect_change_points(&series).is_empty());
    }

    #[test]
    fn significant_events_require_volume_spread() {
        let now = Utc::now();
        // Flat volume: no events even though every day has articles.
        let flat = series_from_ratios(&[(1, 2, 0), (2, 2, 0), (3, 2, 0)], now);
        assert!(find_significant_events(&[], &flat).is_empty());
    }

    #[test]
    fn high_volume_day_is_flagged_with_topics() {
        let now = Utc::now();
        let mut articles = Vec::new();
        // Baseline of one article per day.
        for days_ago in 2..12 {
            articles.push(dated_article(
                &format!("https://example.com/base{days_ago}"),
                Sentiment::Neutral,
                days_ago,
                now,
            ));
        }
        // Spike day with a dominant topic.
        for i in 0..12 {
            let mut article = dated_article(
                &format!("https://example.com/spike{i}"),
                Sentiment::Negative,
                1,
                now,
            );
            article.topics = vec!["energy".to_string()];
            articles.push(article);
        }

        let series = build_daily_series(&articles, DETAIL_PERIOD_DAYS, now);
        let events = find_significant_events(&articles, &series);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].article_count, 12);
        assert_eq!(events[0].top_topics[0].0, "energy");
        assert!(events[0].deviation > 2.0);
    }

    #[test]
    fn prediction_tiers() {
        let now = Utc::now();

        // Insufficient data.
        let sparse = summarize_period(&batch(2, 1, now), 7, now);
        let p = predict(&sparse, 0.1, &[]);
        assert_eq!(p.next_7_days, ForwardTrend::InsufficientData);
        assert_eq!(p.confidence, Confidence::Low);

        // High volatility dominates.
        let improving = summarize_period(&batch(8, 1, now), 7, now);
        let p = predict(&improving, 0.8, &[]);
        assert_eq!(p.next_7_days, ForwardTrend::Volatile);
        assert_eq!(p.next_30_days, ForwardOutlook::Uncertain);
        assert_eq!(p.confidence, Confidence::Low);

        // A single dominant trend with few changes predicts with high
        // confidence.
        let p = predict(&improving, 0.2, &[]);
        assert_eq!(p.next_7_days, ForwardTrend::Improving);
        assert_eq!(p.next_30_days, ForwardOutlook::StablePositive);
        assert_eq!(p.confidence, Confidence::High);

        let declining = summarize_period(&batch(1, 8, now), 7, now);
        let p = predict(&declining, 0.2, &[]);
        assert_eq!(p.next_7_days, ForwardTrend::Declining);
        assert_eq!(p.next_30_days, ForwardOutlook::NeedsIntervention);
        assert_eq!(p.confidence, Confidence::High);

        // Everything else is a medium-confidence stable call.
        let stable = summarize_period(&batch(4, 4, now), 7, now);
        let p = predict(&stable, 0.2, &[]);
        assert_eq!(p.next_7_days, ForwardTrend::Stable);
        assert_eq!(p.confidence, Confidence::Medium);
    }
}
