use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use svg2vd::xml::parse_xml;
use svg2vd::{convert, convert_to_tree};

fn grid_source(cells: usize) -> String {
    let mut out = String::from(r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 1000 1000">"#);
    out.push('\n');
    for i in 0..cells {
        let x = (i % 40) * 25;
        let y = (i / 40) * 25;
        out.push_str(&format!(
            "  <g transform=\"translate({x} {y}) rotate(15)\"><circle cx=\"10\" cy=\"10\" r=\"8\" fill=\"#{:06x}\" stroke=\"#000\"/></g>\n",
            (i * 7919) % 0xffffff
        ));
    }
    out.push_str("</svg>\n");
    out
}

fn fixture(name: &str) -> &'static str {
    match name {
        "basic" => include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/basic.svg")),
        "shapes" => include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/shapes.svg")),
        "transforms" => include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/transforms.svg"
        )),
        "use" => include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/use.svg")),
        "gradient" => include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/gradient.svg"
        )),
        "clip" => include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/clip.svg")),
        "styles" => include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/styles.svg")),
        _ => panic!("unknown fixture"),
    }
}

const FIXTURES: [&str; 7] = ["basic", "shapes", "transforms", "use", "gradient", "clip", "styles"];

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_xml");
    for name in FIXTURES {
        group.bench_with_input(BenchmarkId::from_parameter(name), fixture(name), |b, data| {
            b.iter(|| {
                let document = parse_xml(black_box(data));
                black_box(document.root());
            });
        });
    }
    group.finish();
}

fn bench_convert(c: &mut Criterion) {
    let mut group = c.benchmark_group("convert");
    for name in FIXTURES {
        group.bench_with_input(BenchmarkId::from_parameter(name), fixture(name), |b, data| {
            b.iter(|| {
                let result = convert(black_box(data), name);
                black_box(result.content.map(|content| content.len()));
            });
        });
    }
    group.finish();
}

fn bench_flatten_grid(c: &mut Criterion) {
    let mut group = c.benchmark_group("flatten_grid");
    for cells in [100usize, 400, 1600] {
        let input = grid_source(cells);
        group.bench_with_input(BenchmarkId::from_parameter(cells), &input, |b, data| {
            b.iter(|| {
                let tree = convert_to_tree(black_box(data)).expect("convert failed");
                black_box(tree.node_count());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_parse, bench_convert, bench_flatten_grid);
criterion_main!(benches);
