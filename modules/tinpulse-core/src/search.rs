//! Ranked ticker search over article titles.
//!
//! A ticker expands to its Vietnamese alias set (or a sector keyword set),
//! then an in-memory BM25 index over the titles in the requested range
//! ranks the matches. Multi-word aliases found verbatim in a title earn a
//! phrase bonus on top of the token score.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;
use tinpulse_common::{Article, Result};
use tinpulse_store::Store;

const BM25_K1: f64 = 1.2;
const BM25_B: f64 = 0.75;
/// Added to the BM25 score once per multi-word alias matched as a verbatim
/// substring of the title.
const PHRASE_BONUS: f64 = 1.0;

/// Ticker and sector-theme alias table, HSX/HNX/UPCOM listings. First entry
/// is the company name headlines actually use.
static TICKER_ALIASES: &[(&str, &[&str])] = &[
    // Real estate and construction
    ("VIC", &["Vingroup", "VIC", "tập đoàn Vin", "dòng tiền VIN", "nhóm VIN"]),
    ("VHM", &["Vinhomes", "VHM", "Vingroup", "bất động sản Vin"]),
    ("VRE", &["Vincom Retail", "VRE", "Vincom"]),
    ("NVL", &["Novaland", "Nova Land", "NVL", "bất động sản Nova"]),
    ("PDR", &["Phát Đạt", "PDR"]),
    ("KDH", &["Khang Điền", "KDH"]),
    ("DXG", &["Đất Xanh", "DXG", "Datxanh"]),
    ("KBC", &["Kinh Bắc", "KBC"]),
    ("NLG", &["Nam Long", "NLG"]),
    ("HBC", &["Xây dựng Hoà Bình", "HBC"]),
    ("CTD", &["Coteccons", "CTD", "Cotec"]),
    ("DIG", &["DIC Corp", "DIG"]),
    ("BCM", &["Bình Dương", "BCM", "Becamex"]),
    ("CEO", &["CEO Group", "CEO", "C.E.O"]),
    ("ITA", &["Tân Tạo", "ITA"]),
    // Banking
    ("VCB", &["Vietcombank", "VCB", "Ngân hàng Ngoại thương"]),
    ("BID", &["BIDV", "BID", "Ngân hàng Đầu tư Phát triển"]),
    ("CTG", &["VietinBank", "CTG", "Ngân hàng Công thương"]),
    ("TCB", &["Techcombank", "TCB"]),
    ("MBB", &["MB Bank", "MBB", "Ngân hàng Quân đội"]),
    ("VPB", &["VPBank", "VPB"]),
    ("ACB", &["ACB", "Ngân hàng Á Châu"]),
    ("STB", &["Sacombank", "STB"]),
    ("HDB", &["HDBank", "HDB"]),
    ("LPB", &["LienVietPostBank", "LPB", "Ngân hàng Bưu Điện Liên Việt"]),
    ("TPB", &["TPBank", "TPB"]),
    ("MSB", &["Maritime Bank", "MSB", "Hàng hải"]),
    ("VIB", &["VIB", "Ngân hàng Quốc Tế"]),
    ("EIB", &["Eximbank", "EIB", "Ngân hàng Xuất nhập khẩu"]),
    ("SHB", &["SHB", "Ngân hàng Sài Gòn Hà Nội"]),
    ("SSB", &["SeABank", "SSB"]),
    // Oil, gas and energy
    ("PLX", &["Petrolimex", "PLX", "xăng dầu Petrolimex"]),
    ("GAS", &["PV Gas", "GAS", "PetroVietnam Gas", "khí đốt"]),
    ("PVD", &["PV Drilling", "PVD", "khoan dầu khí"]),
    ("BSR", &["Bình Sơn", "BSR", "lọc dầu Bình Sơn"]),
    ("PVS", &["PetroVietnam Services", "PVS", "dịch vụ dầu khí"]),
    ("PVT", &["PVTrans", "PVT", "vận tải dầu khí"]),
    ("POW", &["PetroVietnam Power", "POW", "điện lực dầu khí"]),
    // Steel and materials
    ("HPG", &["Hòa Phát", "Hoa Phat", "HPG", "thép Hòa Phát"]),
    ("HSG", &["Hoa Sen", "HSG", "tôn thép Hoa Sen"]),
    ("NKG", &["Nam Kim", "NKG", "thép Nam Kim"]),
    ("POM", &["Thép Pomina", "POM"]),
    ("TVN", &["Thép Việt Nam", "TVN", "VNSTEEL"]),
    // Aviation and transport
    ("HVN", &["Vietnam Airlines", "HVN", "hàng không quốc gia"]),
    ("VJC", &["Vietjet", "VJC", "Vietjet Air", "hàng không Vietjet"]),
    ("ACV", &["Cảng hàng không", "ACV", "Airports Corporation"]),
    ("GMD", &["Gemadept", "GMD", "cảng biển Gemadept"]),
    ("HAH", &["Hải An", "HAH", "vận tải Hải An"]),
    ("VCG", &["Vinaconex", "VCG"]),
    // Technology and telecom
    ("FPT", &["FPT", "tập đoàn FPT", "công nghệ FPT"]),
    ("VGI", &["Viettel Global", "VGI"]),
    ("CMG", &["CMC", "CMG", "tập đoàn CMC"]),
    // Consumer, retail and FMCG
    ("MWG", &["Mobile World", "Thế Giới Di Động", "MWG", "TGDĐ"]),
    ("FRT", &["FPT Retail", "FRT", "Long Châu"]),
    ("MSN", &["Masan", "MSN", "tập đoàn Masan"]),
    ("VNM", &["Vinamilk", "VNM", "sữa Vinamilk"]),
    ("SAB", &["Sabeco", "SAB", "bia Sài Gòn", "Sabecco"]),
    ("KDC", &["Kinh Đô", "KDC", "Kido"]),
    ("VHC", &["Vĩnh Hoàn", "VHC", "cá tra Vĩnh Hoàn"]),
    ("HAG", &["HAGL", "HAG", "Hoàng Anh Gia Lai"]),
    ("DBC", &["Dabaco", "DBC", "chăn nuôi Dabaco"]),
    ("SBT", &["TTC Sugar", "SBT", "đường TTC"]),
    // Securities and finance
    ("SSI", &["SSI", "chứng khoán SSI"]),
    ("VCI", &["Viet Capital Securities", "VCI", "chứng khoán Bản Việt"]),
    ("HCM", &["HSC", "chứng khoán HCM"]),
    ("VND", &["VNDIRECT", "VND", "chứng khoán VNDirect"]),
    ("MBS", &["MB Securities", "MBS", "chứng khoán MB"]),
    ("VIX", &["VIX Securities", "VIX", "chứng khoán VIX"]),
    ("SHS", &["Sài Gòn Hà Nội Securities", "SHS"]),
    ("VDS", &["Rồng Việt Securities", "VDS"]),
    // Utilities and power
    ("REE", &["REE", "cơ điện lạnh REE"]),
    ("GEX", &["Gelex", "GEX", "tập đoàn Gelex"]),
    ("NT2", &["Nhiệt điện Phú Mỹ", "NT2"]),
    ("PPC", &["Nhiệt điện Phả Lại", "PPC"]),
    ("GEG", &["Điện Gia Lai", "GEG"]),
    // Pharma and insurance
    ("DHG", &["Dược Hậu Giang", "DHG"]),
    ("IMP", &["Imexpharm", "IMP"]),
    ("TRA", &["Traphaco", "TRA"]),
    ("BVH", &["Bảo Việt", "BVH", "Tập đoàn Bảo Việt"]),
    ("BMI", &["Bảo Minh", "BMI"]),
    // Textiles and rubber
    ("TCM", &["Dệt may Thành Công", "TCM"]),
    ("TNG", &["Đầu tư Thương mại TNG", "TNG"]),
    ("VGT", &["Vinatex", "VGT", "Dệt may Việt Nam"]),
    ("GVR", &["Tập đoàn Cao su Việt Nam", "GVR"]),
    ("PHR", &["Cao su Phước Hòa", "PHR"]),
    // Fertiliser and chemicals
    ("DCM", &["Phân bón Cà Mau", "DCM", "đạm Cà Mau"]),
    ("DPM", &["Đạm Phú Mỹ", "DPM", "PetroVietnam Fertilizer"]),
    ("CSV", &["Hóa chất Việt Nam", "CSV"]),
    // Logistics
    ("TMS", &["Transimex", "TMS", "kho vận Hàng hải"]),
    ("VTP", &["Viettel Post", "VTP"]),
    // Sector theme keywords
    ("BATDONGSAN", &["bất động sản", "nhà đất", "dự án", "chung cư", "đất nền", "thị trường nhà đất"]),
    ("CHUNGKHOAN", &["chứng khoán", "cổ phiếu", "VN-Index", "thị trường chứng khoán", "HNX-Index"]),
    ("NGANHANG", &["ngân hàng", "tín dụng", "lãi suất", "cho vay", "NHNN", "Ngân hàng Nhà nước"]),
    ("XANGDAU", &["xăng dầu", "dầu khí", "năng lượng", "dầu mỏ"]),
    ("THEP", &["thép", "sắt thép", "thị trường thép"]),
    ("NONGSAN", &["nông nghiệp", "nông sản", "lúa gạo", "thuỷ sản", "chăn nuôi"]),
    ("DETMAY", &["dệt may", "may mặc", "xuất khẩu dệt may"]),
    ("CONGNGHE", &["công nghệ", "phần mềm", "số hóa", "AI", "chuyển đổi số"]),
    ("HANGKHONG", &["hàng không", "hàng không giá rẻ", "sân bay"]),
    ("DUOC", &["dược phẩm", "y tế", "bệnh viện", "thuốc"]),
    ("DIEN", &["điện", "năng lượng tái tạo", "điện mặt trời", "điện gió", "thủy điện"]),
    ("BAOHIEM", &["bảo hiểm", "tái bảo hiểm"]),
    ("XAYDUNG", &["xây dựng", "vật liệu xây dựng", "xi măng"]),
];

/// English and Vietnamese sector names resolving to sector keys above.
static SECTOR_MAP: &[(&str, &str)] = &[
    ("realestate", "BATDONGSAN"),
    ("banking", "NGANHANG"),
    ("securities", "CHUNGKHOAN"),
    ("oilandgas", "XANGDAU"),
    ("steel", "THEP"),
    ("agriculture", "NONGSAN"),
    ("textile", "DETMAY"),
    ("technology", "CONGNGHE"),
    ("aviation", "HANGKHONG"),
    ("pharma", "DUOC"),
    ("power", "DIEN"),
    ("insurance", "BAOHIEM"),
    ("construction", "XAYDUNG"),
    ("bất động sản", "BATDONGSAN"),
    ("ngân hàng", "NGANHANG"),
    ("chứng khoán", "CHUNGKHOAN"),
    ("xăng dầu", "XANGDAU"),
    ("thép", "THEP"),
    ("nông sản", "NONGSAN"),
    ("dệt may", "DETMAY"),
    ("công nghệ", "CONGNGHE"),
    ("hàng không", "HANGKHONG"),
    ("dược phẩm", "DUOC"),
    ("điện", "DIEN"),
    ("bảo hiểm", "BAOHIEM"),
    ("xây dựng", "XAYDUNG"),
];

fn alias_table() -> &'static HashMap<&'static str, &'static [&'static str]> {
    static MAP: OnceLock<HashMap<&'static str, &'static [&'static str]>> = OnceLock::new();
    MAP.get_or_init(|| TICKER_ALIASES.iter().copied().collect())
}

fn sector_table() -> &'static HashMap<&'static str, &'static str> {
    static MAP: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    MAP.get_or_init(|| SECTOR_MAP.iter().copied().collect())
}

/// Search aliases for a ticker or sector name. Exchange suffixes (`.VN`,
/// `.HNX`) are stripped; an unknown ticker resolves to itself.
pub fn get_aliases(ticker: &str) -> Vec<String> {
    let clean = ticker
        .split('.')
        .next()
        .unwrap_or(ticker)
        .trim()
        .to_uppercase();

    let key = sector_table()
        .get(clean.to_lowercase().as_str())
        .or_else(|| sector_table().get(ticker.trim().to_lowercase().as_str()))
        .copied()
        .unwrap_or(clean.as_str());

    match alias_table().get(key) {
        Some(aliases) => aliases.iter().map(|a| a.to_string()).collect(),
        None => vec![clean],
    }
}

/// A ranked search result. Relevance is the BM25 score scaled to an
/// integer, higher is better.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub article: Article,
    pub relevance: i64,
}

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\w+").expect("word regex"))
}

fn tokens(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    token_re()
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Rank `articles` against comma-separated `tickers`. Pure; the caller
/// decides the candidate set (usually a date range from the store).
pub fn rank(articles: &[Article], tickers: &str) -> Vec<SearchHit> {
    let aliases: Vec<String> = tickers
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .flat_map(|t| get_aliases(t))
        .collect();
    if aliases.is_empty() || articles.is_empty() {
        return Vec::new();
    }

    let query_terms: HashSet<String> = aliases.iter().flat_map(|a| tokens(a)).collect();
    let phrases: Vec<String> = aliases
        .iter()
        .filter(|a| a.contains(' '))
        .map(|a| a.to_lowercase())
        .collect();

    let docs: Vec<Vec<String>> = articles.iter().map(|a| tokens(&a.title)).collect();
    let doc_count = docs.len() as f64;
    let avg_len = docs.iter().map(|d| d.len()).sum::<usize>() as f64 / doc_count;

    // Document frequency per query term.
    let mut df: HashMap<&str, f64> = HashMap::new();
    for doc in &docs {
        let unique: HashSet<&str> = doc.iter().map(String::as_str).collect();
        for term in &query_terms {
            if unique.contains(term.as_str()) {
                *df.entry(term.as_str()).or_default() += 1.0;
            }
        }
    }

    let mut hits = Vec::new();
    for (article, doc) in articles.iter().zip(&docs) {
        let doc_len = doc.len() as f64;
        let mut tf: HashMap<&str, f64> = HashMap::new();
        for token in doc {
            if query_terms.contains(token) {
                *tf.entry(token.as_str()).or_default() += 1.0;
            }
        }

        let mut score = 0.0;
        for (term, freq) in &tf {
            let n = df.get(term).copied().unwrap_or(0.0);
            let idf = ((doc_count - n + 0.5) / (n + 0.5) + 1.0).ln();
            let norm = freq * (BM25_K1 + 1.0)
                / (freq + BM25_K1 * (1.0 - BM25_B + BM25_B * doc_len / avg_len.max(1.0)));
            score += idf * norm;
        }

        let title_lower = article.title.to_lowercase();
        for phrase in &phrases {
            if title_lower.contains(phrase.as_str()) {
                score += PHRASE_BONUS;
            }
        }

        let relevance = (score * 100.0).round() as i64;
        if relevance > 0 {
            hits.push(SearchHit {
                article: article.clone(),
                relevance,
            });
        }
    }

    hits.sort_by(|a, b| {
        b.relevance.cmp(&a.relevance).then_with(|| {
            let ta = a.article.published_at.unwrap_or(a.article.crawled_at);
            let tb = b.article.published_at.unwrap_or(b.article.crawled_at);
            tb.cmp(&ta)
        })
    });
    hits
}

/// Fetch articles in a time range and rank them for the given tickers.
pub async fn search_articles(
    store: &Store,
    tickers: &str,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<SearchHit>> {
    let articles = store.articles_in_range(from, to, None, limit).await?;
    Ok(rank(&articles, tickers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use uuid::Uuid;

    fn article(title: &str, age_hours: i64) -> Article {
        let crawled_at = Utc::now() - Duration::hours(age_hours);
        Article {
            id: Uuid::new_v4(),
            source: "cafef".to_string(),
            title: title.to_string(),
            url: format!("https://example.vn/{}", Uuid::new_v4()),
            published_at: Some(crawled_at),
            crawl_date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            crawled_at,
        }
    }

    #[test]
    fn ticker_expands_to_company_aliases() {
        let aliases = get_aliases("VIC");
        assert_eq!(aliases[0], "Vingroup");
        assert!(aliases.contains(&"tập đoàn Vin".to_string()));
    }

    #[test]
    fn exchange_suffix_is_stripped() {
        assert_eq!(get_aliases("hpg.VN")[0], "Hòa Phát");
    }

    #[test]
    fn sector_names_resolve_in_both_languages() {
        let english = get_aliases("banking");
        let vietnamese = get_aliases("ngân hàng");
        assert_eq!(english, vietnamese);
        assert!(english.contains(&"lãi suất".to_string()));
    }

    #[test]
    fn unknown_ticker_falls_back_to_itself() {
        assert_eq!(get_aliases("zzz9.HNX"), vec!["ZZZ9".to_string()]);
    }

    #[test]
    fn matching_titles_rank_above_unrelated_ones() {
        let articles = vec![
            article("Vingroup khởi công dự án mới tại Hà Nội", 1),
            article("Giá cà phê hôm nay biến động nhẹ", 2),
            article("Cổ phiếu VIC tăng trần, Vingroup dẫn dắt thị trường", 3),
        ];
        let hits = rank(&articles, "VIC");
        assert_eq!(hits.len(), 2);
        assert!(hits[0].relevance >= hits[1].relevance);
        assert!(hits.iter().all(|h| h.article.title.contains("Vingroup")
            || h.article.title.contains("VIC")));
    }

    #[test]
    fn phrase_match_outranks_scattered_tokens() {
        let articles = vec![
            article("Nhóm bất động sản Nova hồi phục", 1),
            article("Nova công bố kế hoạch bất thường về sản lượng", 1),
        ];
        let hits = rank(&articles, "NVL");
        assert_eq!(hits[0].article.title, "Nhóm bất động sản Nova hồi phục");
    }

    #[test]
    fn recency_breaks_relevance_ties() {
        let articles = vec![
            article("Techcombank báo lãi quý 1", 10),
            article("Techcombank báo lãi quý 2", 1),
        ];
        let hits = rank(&articles, "TCB");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].article.title, "Techcombank báo lãi quý 2");
    }

    #[test]
    fn no_matches_is_an_empty_vec() {
        let articles = vec![article("Giá vàng trong nước đi ngang", 1)];
        assert!(rank(&articles, "VNM").is_empty());
        assert!(rank(&articles, "").is_empty());
        assert!(rank(&[], "VNM").is_empty());
    }

    #[test]
    fn multiple_tickers_union_their_aliases() {
        let articles = vec![
            article("Hòa Phát tăng sản lượng thép", 1),
            article("Vinamilk mở rộng thị trường sữa", 2),
        ];
        let hits = rank(&articles, "HPG, VNM");
        assert_eq!(hits.len(), 2);
    }
}
