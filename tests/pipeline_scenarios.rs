// tests/pipeline_scenarios.rs
use chrono::{DateTime, Duration, TimeZone, Utc};
use newsletter_curator::categorize::Category;
use newsletter_curator::dedupe::dedupe;
use newsletter_curator::normalize::{fingerprint_of, normalize};
use newsletter_curator::select::sort_ranked;
use newsletter_curator::{DigestConfig, Pipeline, RawItem, SourceBatch, SourceType};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap()
}

fn cfg(categories: Vec<Category>) -> DigestConfig {
    DigestConfig {
        categories,
        ..DigestConfig::default()
    }
}

fn blog(title: &str, url: &str) -> RawItem {
    RawItem::new("lab", SourceType::Blog, title, url).published(now() - Duration::hours(1))
}

#[test]
fn scenario_a_tracking_params_dedupe_to_one() {
    let a = normalize(&blog("Release notes", "https://lab.example/post?utm_source=x"), now()).unwrap();
    let b = normalize(
        &blog("Release notes", "https://lab.example/post?utm_campaign=y&fbclid=z"),
        now(),
    )
    .unwrap();
    let out = dedupe(vec![a, b]);
    assert_eq!(out.items.len(), 1);
    assert_eq!(out.collapsed, 1);
}

#[test]
fn scenario_b_priority_decides_category() {
    let p = Pipeline::new(&cfg(vec![
        Category::new("tools", 2, &["assistant"]),
        Category::new("models", 1, &["GPT"]),
    ]))
    .unwrap();
    let batch = SourceBatch::new(
        "lab",
        SourceType::Blog,
        vec![blog("GPT-based assistant", "https://lab.example/a")],
    );
    let out = p.run(&[batch], now(), None);
    assert_eq!(out.section("models").unwrap().items.len(), 1);
    assert!(out.section("tools").unwrap().items.is_empty());
}

#[test]
fn scenario_c_excluded_keyword_beats_category_match() {
    let mut c = cfg(vec![Category::new("models", 1, &["GPT"])]);
    c.filtering.exclude_keywords = vec!["crypto".into()];
    let p = Pipeline::new(&c).unwrap();
    let batch = SourceBatch::new(
        "lab",
        SourceType::Blog,
        vec![blog("GPT for traders", "https://lab.example/a").with_summary("A new crypto angle")],
    );
    let out = p.run(&[batch], now(), None);
    assert!(out.is_empty());
    assert_eq!(out.diagnostics.dropped_excluded_keyword, 1);
}

#[test]
fn scenario_d_under_filled_keeps_survivors() {
    let p = Pipeline::new(&cfg(vec![Category::new("models", 1, &["GPT"]).with_limits(5, 10)])).unwrap();
    let items = (0..3)
        .map(|i| blog(&format!("GPT update {i}"), &format!("https://lab.example/{i}")))
        .collect();
    let out = p.run(&[SourceBatch::new("lab", SourceType::Blog, items)], now(), None);
    let s = out.section("models").unwrap();
    assert!(s.under_filled);
    assert_eq!(s.items.len(), 3);
    assert_eq!(out.diagnostics.under_filled, vec!["models".to_string()]);
}

#[test]
fn scenario_e_exact_tie_prefers_newer() {
    let mut x = normalize(&blog("X", "https://lab.example/x"), now()).unwrap();
    let mut y = normalize(
        &blog("Y", "https://lab.example/y").published(now() - Duration::days(2)),
        now(),
    )
    .unwrap();
    x.score = Some(0.9);
    y.score = Some(0.9);
    let mut v = vec![y, x];
    sort_ranked(&mut v);
    assert_eq!(v[0].title, "X");
}

#[test]
fn recency_boundary_is_inclusive() {
    let p = Pipeline::new(&cfg(vec![Category::new("models", 1, &["GPT"])])).unwrap();
    let cutoff = now() - Duration::days(7);
    let batch = SourceBatch::new(
        "lab",
        SourceType::Blog,
        vec![
            blog("GPT on the edge", "https://lab.example/edge").published(cutoff),
            blog("GPT too late", "https://lab.example/late").published(cutoff - Duration::microseconds(1)),
        ],
    );
    let out = p.run(&[batch], now(), None);
    let s = out.section("models").unwrap();
    assert_eq!(s.items.len(), 1);
    assert_eq!(s.items[0].title, "GPT on the edge");
    assert_eq!(out.diagnostics.dropped_too_old, 1);
}

#[test]
fn fingerprints_are_stable_across_calls() {
    let raw = blog("Same", "HTTPS://Lab.Example/p/?utm_medium=m&b=2&a=1#frag");
    let first = fingerprint_of(&raw).unwrap();
    for _ in 0..10 {
        assert_eq!(fingerprint_of(&raw).unwrap(), first);
    }
    assert_eq!(
        first,
        fingerprint_of(&blog("Other title", "https://lab.example/p?a=1&b=2")).unwrap()
    );
}

#[test]
fn sections_never_exceed_max_items() {
    let p = Pipeline::new(&cfg(vec![
        Category::new("models", 1, &["GPT"]).with_limits(0, 3),
        Category::new("tools", 2, &["assistant"]).with_limits(0, 1),
    ]))
    .unwrap();
    let items: Vec<RawItem> = (0..25)
        .map(|i| {
            let title = if i % 2 == 0 { "GPT news" } else { "assistant news" };
            blog(&format!("{title} {i}"), &format!("https://lab.example/{i}")).with_engagement(i)
        })
        .collect();
    let out = p.run(&[SourceBatch::new("lab", SourceType::Blog, items)], now(), None);
    assert_eq!(out.section("models").unwrap().items.len(), 3);
    assert_eq!(out.section("tools").unwrap().items.len(), 1);

    // Highest engagement first among same-age items.
    let models = &out.section("models").unwrap().items;
    assert_eq!(models[0].engagement, 24);
    assert!(models.windows(2).all(|w| w[0].score >= w[1].score));
}

#[test]
fn trusted_source_skips_engagement_threshold() {
    let mut c = cfg(vec![Category::new("models", 1, &["GPT"])]);
    c.filtering.min_engagement.insert("social".into(), 100);
    c.filtering.trusted_domains = vec!["openai.com".into()];
    let p = Pipeline::new(&c).unwrap();

    let items = vec![
        RawItem::new("HN", SourceType::Social, "GPT from the source", "https://blog.openai.com/x")
            .published(now())
            .with_engagement(3),
        RawItem::new("HN", SourceType::Social, "GPT rumor", "https://rumors.example/x")
            .published(now())
            .with_engagement(3),
    ];
    let out = p.run(&[SourceBatch::new("HN", SourceType::Social, items)], now(), None);
    assert_eq!(out.diagnostics.dropped_low_engagement, 1);
    assert_eq!(out.section("models").unwrap().items[0].title, "GPT from the source");
}
