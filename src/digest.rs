use chrono::{DateTime, Utc};
use std::fmt::Write as _;

use crate::analytics::TemporalReport;
use crate::article::Article;
use crate::orchestrator::RunState;

/// A rendered digest, ready to persist.
#[derive(Clone, Debug)]
pub struct DigestRecord {
    pub digest_type: String,
    pub content: String,
    pub articles_count: i64,
    pub languages_covered: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

/// Assembles the run digest. Coverage gaps and degraded units are named
/// explicitly rather than presenting sparse data as complete.
pub fn render(
    run: &RunState,
    report: &TemporalReport,
    subject: &str,
    now: DateTime<Utc>,
) -> DigestRecord {
    let mut content = String::new();
    let (positive, negative, neutral) = run.partitions.counts();
    let total = run.all_articles.len();

    let _ = writeln!(
        content,
        "# Press digest: {subject}, {}\n",
        now.format("%Y-%m-%d")
    );

    let _ = writeln!(content, "## Run summary");
    let _ = writeln!(
        content,
        "- {} articles across {} languages",
        total,
        run.units.len()
    );
    let pct = |count: usize| {
        if total == 0 {
            0.0
        } else {
            count as f64 / total as f64 * 100.0
        }
    };
    let _ = writeln!(
        content,
        "- Positive: {} ({:.1}%), Negative: {} ({:.1}%), Neutral: {} ({:.1}%)\n",
        positive,
        pct(positive),
        negative,
        pct(negative),
        neutral,
        pct(neutral)
    );

    let _ = writeln!(content, "## Coverage");
    for code in &run.dispatch_order {
        let Some(unit) = run.units.get(code) else {
            continue;
        };
        if unit.articles.is_empty() {
            let _ = write!(
                content,
                "- {} ({}): no articles found this run",
                unit.language.code, unit.language.name
            );
            if let Some(failure) = &unit.failure {
                let _ = write!(content, " (degraded: {failure})");
            }
            let _ = writeln!(content);
        } else {
            let _ = writeln!(
                content,
                "- {} ({}): {} articles",
                unit.language.code,
                unit.language.name,
                unit.articles.len()
            );
        }
    }
    let empty = run.empty_languages();
    if !empty.is_empty() {
        let names: Vec<&str> = empty.iter().map(|u| u.language.code.as_str()).collect();
        let _ = writeln!(
            content,
            "\nCoverage was limited this run: no articles for {}.",
            names.join(", ")
        );
    }

    write_drivers(&mut content, "Leading positive coverage", &run.partitions.positive, true);
    write_drivers(&mut content, "Leading negative coverage", &run.partitions.negative, false);

    if !report.by_country.is_empty() || !report.by_region.is_empty() {
        let _ = writeln!(content, "\n## Temporal outlook");
        for analysis in report.by_country.iter().chain(report.by_region.iter()) {
            let trend = analysis
                .recent_summary()
                .map(|s| s.trend.as_str())
                .unwrap_or("insufficient_data");
            let _ = writeln!(
                content,
                "- {}: 7-day trend {}, volatility {:.2}, next 7 days {} ({} confidence)",
                analysis.entity_name(),
                trend,
                analysis.volatility_score,
                analysis.prediction.next_7_days.as_str(),
                analysis.prediction.confidence.as_str()
            );
        }
    }

    let mut languages_covered: Vec<String> = run
        .dispatch_order
        .iter()
        .filter(|code| {
            run.units
                .get(*code)
                .map(|unit| !unit.articles.is_empty())
                .unwrap_or(false)
        })
        .cloned()
        .collect();
    languages_covered.sort();

    DigestRecord {
        digest_type: "daily".to_string(),
        content,
        articles_count: total as i64,
        languages_covered,
        generated_at: now,
    }
}

fn write_drivers(content: &mut String, heading: &str, articles: &[Article], descending: bool) {
    if articles.is_empty() {
        return;
    }
    let mut ranked: Vec<&Article> = articles.iter().collect();
    ranked.sort_by(|a, b| {
        let ordering = a
            .sentiment_score
            .partial_cmp(&b.sentiment_score)
            .unwrap_or(std::cmp::Ordering::Equal);
        if descending {
            ordering.reverse()
        } else {
            ordering
        }
    });

    let _ = writeln!(content, "\n## {heading}");
    for article in ranked.iter().take(5) {
        let _ = writeln!(
            content,
            "- [{}] {} ({:+.2}): {}",
            article.source_name, article.title, article.sentiment_score, article.url
        );
    }
}
