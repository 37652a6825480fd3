use criterion::{criterion_group, criterion_main, Criterion};
use ridgeline::{
    extract::Extractor,
    render::{draw_all, render_raster, render_svg, DrawOrder, LineSink},
    HeightField, Settings,
};

/// Rolling synthetic terrain with some sea.
#[allow(clippy::cast_possible_truncation)]
fn synthetic_field(width: usize, height: usize) -> HeightField {
    let heights = (0..height)
        .flat_map(|y| {
            (0..width).map(move |x| {
                let (x, y) = (x as f64, y as f64);
                (900.0 * (x / 70.0).sin() * (y / 90.0).cos() + 300.0 * (x / 13.0).cos()) as f32
            })
        })
        .collect();
    HeightField::from_heights(width, height, heights).unwrap()
}

struct Discard(DrawOrder);

impl LineSink for Discard {
    fn order(&self) -> DrawOrder {
        self.0
    }

    fn draw_segment(&mut self, segment: &ridgeline::extract::SmoothedRange) {
        criterion::black_box(segment);
    }
}

fn ridgelines(c: &mut Criterion) {
    let mut group = c.benchmark_group("Ridge lines");
    let field = synthetic_field(1280, 800);
    let settings = Settings {
        smooth_steps: 3,
        ..Settings::default()
    };

    group.bench_function("extract", |b| {
        b.iter(|| {
            let extractor = Extractor::new(&field, &settings);
            draw_all(&extractor, &mut Discard(DrawOrder::TopDown));
        });
    });

    group.bench_function("svg", |b| b.iter(|| render_svg(&field, &settings, &[])));

    group.sample_size(10);
    group.bench_function("raster", |b| {
        b.iter(|| render_raster(field.clone(), settings.clone()).unwrap());
    });
}

criterion_group!(benches, ridgelines);
criterion_main!(benches);
