use criterion::{Criterion, black_box, criterion_group, criterion_main};
use delve_core::brain::TokenCounter;
use delve_core::parse::{parse_index_list, parse_string_list};
use delve_core::research::prompts;
use delve_core::text::{fit_segments, split_into_chunks, split_paragraph};
use delve_core::web::{SearchResult, extract_text_from_html};

fn sample_results(prefix: &str, n: usize) -> Vec<SearchResult> {
    (0..n)
        .map(|i| {
            SearchResult::new(
                format!("{prefix} result {i}"),
                format!("https://{prefix}.example/{i}"),
                format!("A snippet describing {prefix} in some detail, entry number {i}."),
            )
        })
        .collect()
}

fn bench_token_counting(c: &mut Criterion) {
    let counter = TokenCounter::for_model("gpt-4o");
    let paragraph =
        "Oracle and MySQL are relational databases with different licensing. ".repeat(50);

    c.bench_function("token_count_paragraph", |b| {
        b.iter(|| counter.count(black_box(&paragraph)))
    });
}

fn bench_grounding_fit(c: &mut Criterion) {
    let counter = TokenCounter::for_model("gpt-4o");
    let keywords = vec!["oracle".to_string(), "mysql".to_string()];
    let results = vec![sample_results("oracle", 8), sample_results("mysql", 8)];

    c.bench_function("fit_grounding_prompt", |b| {
        b.iter(|| {
            let mut segments = results.clone();
            fit_segments(
                &mut segments,
                |s| prompts::summarize_search_prompt(4, &prompts::grounding_block(&keywords, s)),
                |p| counter.count(p),
                black_box(300),
            )
        })
    });
}

fn bench_chunking(c: &mut Criterion) {
    let counter = TokenCounter::for_model("gpt-4o");
    let page = (0..200)
        .map(|i| format!("Line {i}: MySQL is open source, Oracle is commercial. Both speak SQL."))
        .collect::<Vec<_>>()
        .join("\n");

    c.bench_function("split_into_chunks_page", |b| {
        b.iter(|| split_into_chunks(black_box(&page), &counter, 256))
    });

    let long_line = "Sentence one, clause two. ".repeat(200);
    c.bench_function("split_paragraph_long_line", |b| {
        b.iter(|| split_paragraph(black_box(&long_line), 2))
    });
}

fn bench_parsing(c: &mut Criterion) {
    let keywords = "Here you go:\n```json\n[\"Oracle\", \"MySQL\"]\n```";
    let indices = "[5, 3, 1, 0, 2, 4, 6, 7]";
    let html = "<html><body>".to_string()
        + &"<p>Oracle &amp; MySQL compared.</p><script>x()</script>".repeat(100)
        + "</body></html>";

    c.bench_function("parse_keyword_list", |b| {
        b.iter(|| parse_string_list(black_box(keywords)))
    });
    c.bench_function("parse_index_list", |b| {
        b.iter(|| parse_index_list(black_box(indices)))
    });
    c.bench_function("extract_text_from_html", |b| {
        b.iter(|| extract_text_from_html(black_box(&html)))
    });
}

criterion_group!(
    benches,
    bench_token_counting,
    bench_grounding_fit,
    bench_chunking,
    bench_parsing,
);
criterion_main!(benches);
