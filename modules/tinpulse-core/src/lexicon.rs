//! The layered sentiment lexicon.
//!
//! Three tiers feed the merged lexicon the scanner runs against:
//! the hand-curated static tables below, human-approved learned keywords,
//! and auto-aggregated keyword suggestions. On a term collision the higher
//! tier wins: Static > Approved > AutoAggregated. Static terms never enter
//! the lower tiers at all.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use tracing::{debug, warn};

use tinpulse_common::{Config, Result, SentimentType};
use tinpulse_store::Store;

use crate::aggregate::{aggregate, AggregatedKeyword};

/// Hand-curated positive terms for Vietnamese financial headlines.
/// Weights in (0, 1]; multi-word phrases outrank their parts because the
/// scanner matches longest-first.
pub const VI_POSITIVE: &[(&str, f64)] = &[
    // Records and targets
    ("kỷ lục", 0.8),
    ("lập kỷ lục", 0.85),
    ("phá kỷ lục", 0.85),
    ("vượt kế hoạch", 0.75),
    ("vượt mục tiêu", 0.75),
    ("đạt mục tiêu", 0.65),
    ("thắng thầu", 0.65),
    ("trúng thầu", 0.65),
    // Strong growth
    ("tăng mạnh", 0.8),
    ("bứt phá", 0.75),
    ("đột phá", 0.75),
    ("bullish", 0.7),
    ("tăng vọt", 0.75),
    ("tăng đột biến", 0.75),
    ("leo thang tích cực", 0.65),
    // Recovery
    ("phục hồi mạnh", 0.7),
    ("phục hồi", 0.6),
    ("khởi sắc", 0.6),
    ("uptrend", 0.6),
    ("hồi phục", 0.55),
    ("cải thiện", 0.5),
    // Benefit and advantage
    ("hưởng lợi", 0.6),
    ("tận dụng cơ hội", 0.55),
    ("lợi thế cạnh tranh", 0.6),
    ("ưu thế", 0.5),
    ("thắng lợi", 0.65),
    // Growth, revenue, profit
    ("tăng trưởng mạnh", 0.7),
    ("tăng trưởng tốt", 0.65),
    ("tăng trưởng", 0.6),
    ("lãi ròng tăng", 0.7),
    ("doanh thu tăng", 0.65),
    ("lợi nhuận tăng", 0.7),
    ("lợi nhuận cao kỷ lục", 0.85),
    ("lợi nhuận", 0.5),
    ("lãi", 0.5),
    // Dividends and buybacks
    ("chia cổ tức", 0.6),
    ("tăng cổ tức", 0.65),
    ("thưởng cổ phiếu", 0.55),
    ("mua lại cổ phiếu", 0.5),
    // Expansion and investment
    ("mở rộng quy mô", 0.6),
    ("mở rộng thị trường", 0.6),
    ("mở rộng", 0.55),
    ("hợp đồng lớn", 0.65),
    ("đầu tư mới", 0.55),
    ("nâng hạng", 0.6),
    ("nâng cấp", 0.45),
    ("tái cơ cấu thành công", 0.6),
    // Cash flow and liquidity
    ("dòng tiền vào", 0.55),
    ("ngoại tệ vào", 0.5),
    ("mua ròng", 0.5),
    ("thanh khoản tốt", 0.5),
    ("thanh khoản cao", 0.5),
    // Market tone
    ("điểm xanh", 0.5),
    ("xanh", 0.4),
    ("tích cực", 0.45),
    ("tăng điểm", 0.5),
    ("thị trường tích cực", 0.55),
    // Single movement words
    ("tăng", 0.45),
    ("lên", 0.3),
    ("vượt", 0.35),
    ("kỳ vọng", 0.3),
    // Quality and credibility
    ("được xếp hạng tốt", 0.55),
    ("uy tín cao", 0.5),
    ("chất lượng tốt", 0.5),
    ("đánh giá cao", 0.55),
    ("được vinh danh", 0.6),
    ("nhận giải thưởng", 0.6),
    // Partnership
    ("hợp tác chiến lược", 0.55),
    ("ký kết hợp đồng", 0.5),
    ("bắt tay hợp tác", 0.45),
    ("liên doanh", 0.45),
    // Listing
    ("niêm yết thành công", 0.65),
    ("ipo thành công", 0.65),
    ("lên sàn", 0.5),
    ("tăng vốn", 0.45),
    // Peaks
    ("đỉnh lịch sử", 0.75),
    ("đỉnh", 0.5),
    ("cao nhất", 0.6),
    ("cao kỷ lục", 0.75),
];

/// Hand-curated negative terms. Weights are magnitudes; the scanner applies
/// the negative sign.
pub const VI_NEGATIVE: &[(&str, f64)] = &[
    // Complaints and opposition
    ("kiến nghị khẩn", 0.55),
    ("kiến nghị", 0.25),
    ("kêu cứu", 0.6),
    ("phản đối", 0.45),
    ("khiếu nại", 0.4),
    ("tố cáo", 0.5),
    ("phàn nàn", 0.35),
    ("chỉ trích", 0.4),
    ("lên án", 0.5),
    ("yêu cầu khẩn", 0.5),
    ("đề nghị khẩn", 0.45),
    // Urgency and stress
    ("khẩn cấp", 0.4),
    ("khẩn", 0.3),
    ("gấp", 0.25),
    ("bức xúc", 0.45),
    ("lo lắng", 0.35),
    ("lo ngại", 0.4),
    ("căng thẳng", 0.4),
    ("hoang mang", 0.45),
    ("bất an", 0.45),
    // Bankruptcy and crisis
    ("phá sản", 0.9),
    ("vỡ nợ", 0.85),
    ("khủng hoảng", 0.8),
    ("sụp đổ", 0.8),
    ("mất vốn", 0.75),
    ("âm vốn", 0.75),
    ("mất thanh khoản", 0.8),
    ("mất khả năng thanh toán", 0.85),
    // Sharp decline
    ("lao dốc", 0.75),
    ("giảm mạnh", 0.7),
    ("giảm sâu", 0.7),
    ("lao xuống", 0.7),
    ("rơi tự do", 0.8),
    ("bốc hơi tỷ đồng", 0.75),
    ("bốc hơi", 0.65),
    // Losses and failure
    ("thua lỗ", 0.65),
    ("thất bại", 0.6),
    ("lỗ nặng", 0.75),
    ("lỗ lớn", 0.7),
    ("lỗ", 0.55),
    ("thua", 0.45),
    // Sell-off and capital flight
    ("bán tháo ròng", 0.65),
    ("bán tháo", 0.65),
    ("tháo chạy", 0.7),
    ("tháo vốn", 0.65),
    ("rút vốn", 0.5),
    // Bearish markers
    ("bearish", 0.65),
    ("downtrend", 0.55),
    ("xu hướng giảm", 0.55),
    // Bad debt
    ("nợ xấu", 0.7),
    ("nợ tăng", 0.5),
    ("gánh nặng nợ", 0.65),
    ("nợ quá hạn", 0.65),
    ("nợ khó đòi", 0.65),
    // Market tone
    ("giảm điểm", 0.5),
    ("thanh khoản thấp", 0.45),
    ("thanh khoản cạn", 0.55),
    ("tiêu cực", 0.5),
    ("điểm đỏ", 0.5),
    ("đỏ sàn", 0.55),
    // Stalled operations
    ("trì hoãn", 0.4),
    ("chậm tiến độ", 0.45),
    ("dừng hoạt động", 0.6),
    ("tạm dừng", 0.45),
    ("đình trệ", 0.55),
    ("ngừng hoạt động", 0.6),
    ("tạm hoãn", 0.4),
    ("chậm trễ", 0.4),
    // Cost pressure
    ("chi phí tăng", 0.4),
    ("giá điện tăng", 0.4),
    ("thuế tăng", 0.35),
    ("gánh nặng chi phí", 0.5),
    ("áp lực chi phí", 0.45),
    ("chi phí leo thang", 0.5),
    // Legal and regulatory
    ("bị điều tra", 0.6),
    ("vi phạm", 0.55),
    ("bị xử phạt", 0.55),
    ("bị phạt", 0.5),
    ("khởi tố", 0.7),
    ("bắt giữ", 0.65),
    ("bị bắt", 0.65),
    ("tạm giam", 0.6),
    // Risk and warnings
    ("rủi ro cao", 0.55),
    ("rủi ro", 0.4),
    ("áp lực", 0.4),
    ("cảnh báo nghiêm trọng", 0.6),
    ("cảnh báo", 0.4),
    // Damage
    ("thiệt hại nặng", 0.7),
    ("thiệt hại", 0.55),
    ("mất mát", 0.5),
    ("suy giảm", 0.45),
    ("sụt giảm", 0.5),
    ("sụt", 0.45),
    // Single movement words
    ("giảm", 0.4),
    ("khó khăn", 0.4),
    ("không phanh", 0.35),
    ("bán ròng", 0.4),
    ("đỏ", 0.35),
];

/// Multipliers applied when one of these appears shortly before a match.
pub const INTENSIFIERS: &[(&str, f64)] = &[
    ("nghiêm trọng", 1.6),
    ("cực kỳ", 1.6),
    ("cực", 1.5),
    ("rất mạnh", 1.6),
    ("rất", 1.4),
    ("quá", 1.3),
    ("mạnh mẽ", 1.4),
    ("mạnh", 1.3),
    ("nặng nề", 1.4),
    ("nặng", 1.35),
    ("sâu sắc", 1.3),
    ("sâu", 1.25),
    ("đột ngột", 1.2),
];

pub const DIMINISHERS: &[(&str, f64)] = &[
    ("một chút", 0.5),
    ("nhẹ nhàng", 0.6),
    ("nhẹ", 0.6),
    ("hơi hơi", 0.55),
    ("hơi", 0.65),
    ("ít nhiều", 0.7),
    ("ít", 0.65),
    ("tương đối", 0.75),
];

/// Negation markers, longest first so "không hề" wins over "không".
pub const NEGATIONS: &[&str] = &[
    "không còn",
    "không hề",
    "chưa từng",
    "chẳng hề",
    "không phải",
    "chẳng phải",
    "không",
    "chưa",
    "chẳng",
    "chả",
];

/// Which tier a merged entry came from. Ordering is precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LexiconTier {
    AutoAggregated,
    Approved,
    Static,
}

/// The scanner's view of the lexicon: per-side term/weight lists sorted by
/// descending term length so the longest phrase wins a span.
#[derive(Debug, Clone, Default)]
pub struct MergedLexicon {
    pub positive: Vec<(String, f64)>,
    pub negative: Vec<(String, f64)>,
}

impl MergedLexicon {
    pub fn term_count(&self) -> usize {
        self.positive.len() + self.negative.len()
    }
}

fn static_terms() -> &'static HashSet<&'static str> {
    static TERMS: OnceLock<HashSet<&'static str>> = OnceLock::new();
    TERMS.get_or_init(|| {
        VI_POSITIVE
            .iter()
            .chain(VI_NEGATIVE.iter())
            .map(|(t, _)| *t)
            .collect()
    })
}

/// True if the term belongs to the hand-curated tables. Such terms are
/// barred from the learned tiers.
pub fn is_static_term(term: &str) -> bool {
    static_terms().contains(term)
}

/// Resolve the three tiers into one scanner lexicon.
pub fn merge(
    approved: &[(String, SentimentType, f64)],
    aggregated: &[AggregatedKeyword],
) -> MergedLexicon {
    // term -> (weight, type, tier); higher tier replaces lower.
    let mut entries: HashMap<String, (f64, SentimentType, LexiconTier)> = HashMap::new();

    for kw in aggregated {
        if is_static_term(&kw.keyword) {
            continue;
        }
        entries.insert(
            kw.keyword.clone(),
            (kw.weight, kw.sentiment_type, LexiconTier::AutoAggregated),
        );
    }

    for (term, sentiment_type, weight) in approved {
        if is_static_term(term) {
            continue;
        }
        let candidate = (*weight, *sentiment_type, LexiconTier::Approved);
        entries
            .entry(term.clone())
            .and_modify(|existing| {
                if existing.2 < LexiconTier::Approved {
                    *existing = candidate;
                }
            })
            .or_insert(candidate);
    }

    let mut positive: Vec<(String, f64)> = VI_POSITIVE
        .iter()
        .map(|(t, w)| (t.to_string(), *w))
        .collect();
    let mut negative: Vec<(String, f64)> = VI_NEGATIVE
        .iter()
        .map(|(t, w)| (t.to_string(), *w))
        .collect();

    for (term, (weight, sentiment_type, _)) in entries {
        match sentiment_type {
            SentimentType::Positive => positive.push((term, weight)),
            SentimentType::Negative => negative.push((term, weight)),
        }
    }

    positive.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));
    negative.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));

    MergedLexicon { positive, negative }
}

/// The static tables alone, sorted for scanning. Used for cooccurrence
/// counting and as the no-database fallback.
pub fn static_lexicon() -> MergedLexicon {
    merge(&[], &[])
}

struct CacheSlot {
    lexicon: Arc<MergedLexicon>,
    /// `None` marks the snapshot expired; the next read rebuilds.
    loaded_at: Option<Instant>,
}

/// TTL-bounded snapshot of the merged lexicon. Reads are lock-free; an
/// expired snapshot is recomputed from the store and swapped in. Concurrent
/// refreshes may recompute redundantly, which is harmless: the result is a
/// pure function of database state.
pub struct LexiconCache {
    slot: ArcSwap<CacheSlot>,
    ttl: Duration,
}

impl LexiconCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            slot: ArcSwap::new(Arc::new(CacheSlot {
                lexicon: Arc::new(static_lexicon()),
                loaded_at: None,
            })),
            ttl,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(Duration::from_secs(config.lexicon_ttl_secs))
    }

    /// Current merged lexicon, refreshed from the store when the snapshot
    /// has outlived its TTL. A failed refresh keeps serving the stale
    /// snapshot and logs at warn.
    pub async fn get(&self, store: &Store, config: &Config) -> Arc<MergedLexicon> {
        if let Some(lexicon) = self.fresh_lexicon() {
            return lexicon;
        }

        match self.rebuild(store, config).await {
            Ok(lexicon) => {
                let lexicon = Arc::new(lexicon);
                self.install(Arc::clone(&lexicon));
                lexicon
            }
            Err(e) => {
                warn!(error = %e, "Lexicon refresh failed, serving stale snapshot");
                Arc::clone(&self.slot.load().lexicon)
            }
        }
    }

    /// Drop the snapshot so the next read recomputes. Called after keyword
    /// approval or rejection.
    pub fn invalidate(&self) {
        let slot = self.slot.load_full();
        self.slot.store(Arc::new(CacheSlot {
            lexicon: Arc::clone(&slot.lexicon),
            loaded_at: None,
        }));
    }

    /// The current snapshot, if it is still within its TTL.
    fn fresh_lexicon(&self) -> Option<Arc<MergedLexicon>> {
        let slot = self.slot.load_full();
        match slot.loaded_at {
            Some(at) if at.elapsed() < self.ttl => Some(Arc::clone(&slot.lexicon)),
            _ => None,
        }
    }

    fn install(&self, lexicon: Arc<MergedLexicon>) {
        self.slot.store(Arc::new(CacheSlot {
            lexicon,
            loaded_at: Some(Instant::now()),
        }));
    }

    async fn rebuild(&self, store: &Store, config: &Config) -> Result<MergedLexicon> {
        let learned = store.learned_keywords().await?;
        let approved: Vec<(String, SentimentType, f64)> = learned
            .iter()
            .filter_map(|row| {
                let sentiment_type = SentimentType::from_str_loose(&row.sentiment_type)?;
                Some((row.keyword.clone(), sentiment_type, row.weight))
            })
            .collect();

        let suggestions = store
            .suggestions_within(config.aggregation_lookback_days)
            .await?;
        let aggregated = aggregate(
            &suggestions,
            config.aggregation_min_confidence,
            config.aggregation_min_frequency,
        );

        let merged = merge(&approved, &aggregated);
        debug!(
            approved = approved.len(),
            aggregated = aggregated.len(),
            terms = merged.term_count(),
            "Merged lexicon rebuilt"
        );
        Ok(merged)
    }
}
