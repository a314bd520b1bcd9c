//! Benchmarks pour la lecture des fichiers .g01

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::fmt::Write;

/// Génère un fichier avec une zone 2D de `points` points de calcul et `breaklines` lignes
fn synthetic_model(points: usize, breaklines: usize) -> String {
    let mut out = String::from("Geom Title=Synthetic\nProgram Version=6.30\n");
    out.push_str("Storage Area=Area,0,0\nStorage Area Surface Line= 4\n");
    out.push_str("             0.0             0.0         10000.0             0.0\n");
    out.push_str("         10000.0         10000.0             0.0         10000.0\n");
    out.push_str("Storage Area Is2D=-1\n");

    let _ = writeln!(out, "Storage Area 2D Points= {}", points);
    for i in 0..points {
        let x = (i % 1000) as f64 * 10.0 + 1923543.954545455;
        let y = (i / 1000) as f64 * 10.0 + 521404.931818182;
        let _ = write!(out, "{:>16.8}{:>16.8}", x, y);
        if i % 2 == 1 {
            out.push('\n');
        }
    }
    out.push('\n');

    for b in 0..breaklines {
        let _ = writeln!(out, "BreakLine Name=BL {}\nBreakLine Polyline= 2", b);
        let _ = writeln!(out, "{:>16.1}{:>16.1}{:>16.1}{:>16.1}", b as f64, 0.0, b as f64, 100.0);
    }
    out
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_g01");

    for points in [1_000usize, 100_000] {
        let model = synthetic_model(points, 100);
        group.throughput(Throughput::Bytes(model.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(points), &model, |b, model| {
            b.iter(|| {
                let result = ras_geometry::parse(black_box(model.as_bytes())).unwrap();
                black_box(result)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parse);
criterion_main!(benches);
