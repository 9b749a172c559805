use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::review::RawReview;

macro_rules! selector {
    ($name:ident, $css:literal) => {
        static $name: LazyLock<Selector> = LazyLock::new(|| Selector::parse($css).unwrap());
    };
}

selector!(SEL_REVIEW, "div.jftiEf.fontBodyMedium");
selector!(SEL_CAPTION, "span.wiI7pd");
selector!(SEL_RATING, "span.kvMYJc");
selector!(SEL_RELATIVE_DATE, "span.rsqaWe");
selector!(SEL_AUTHOR_STATS, "div.RfnDt");
selector!(SEL_AUTHOR_URL, "button.WEBjve");

static REVIEW_COUNT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d[\d,.]*)\s+reviews?").unwrap());

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_owned()
}

fn filter_string(s: &str) -> String {
    s.replace(['\r', '\n', '\t'], " ")
}

/// Extracts one review block. Returns `None` only when the block has no id.
pub fn parse_review(block: ElementRef<'_>) -> Option<RawReview> {
    let el = block.value();
    let id = el.attr("data-review-id")?.into();

    let author = el.attr("aria-label").map(ToOwned::to_owned);
    let caption = block
        .select(&SEL_CAPTION)
        .next()
        .map(|e| filter_string(&text_of(e)));
    let rating = block
        .select(&SEL_RATING)
        .next()
        .and_then(|e| e.value().attr("aria-label"))
        .and_then(|label| label.split(' ').next()?.replace(',', ".").parse().ok());
    let relative_date = block.select(&SEL_RELATIVE_DATE).next().map(text_of);
    let author_reviews = block
        .select(&SEL_AUTHOR_STATS)
        .next()
        .and_then(|e| {
            let stats = text_of(e);
            let count = REVIEW_COUNT.captures(&stats)?.get(1)?.as_str().replace([',', '.'], "");
            count.parse().ok()
        })
        .unwrap_or(0);
    let author_url = block
        .select(&SEL_AUTHOR_URL)
        .next()
        .and_then(|e| e.value().attr("data-href"))
        .map(ToOwned::to_owned);

    Some(RawReview {
        id,
        author,
        rating,
        relative_date,
        author_reviews,
        author_url,
        caption,
    })
}

/// Parses the review blocks of `html` in page order, skipping the first
/// `offset` identifiable ones. Blocks without an id are never counted.
pub fn parse_reviews(html: &str, offset: usize) -> Vec<RawReview> {
    let document = Html::parse_document(html);
    document
        .select(&SEL_REVIEW)
        .enumerate()
        .filter_map(|(idx, block)| {
            let review = parse_review(block);
            if review.is_none() {
                tracing::warn!(target: "scrape", "review block #{idx} has no id, skipped");
            }
            review
        })
        .skip(offset)
        .collect()
}
