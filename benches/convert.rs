use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use film_driver::convert;
use film_driver::framebuffer::ChannelBuffer;
use film_driver::surface::Pass;

/// Deterministic pseudo-random fill so runs are comparable
fn ramp(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| (i.wrapping_mul(2654435761) % 1000) as f32 / 1000.0)
        .collect()
}

fn bench_combined_convert(c: &mut Criterion) {
    let mut group = c.benchmark_group("combined_convert");

    for (width, height) in [(640, 360), (1920, 1080)] {
        let pixels = width * height;
        let rgb = ChannelBuffer::Float32(ramp(pixels * 3));
        let rgba = ChannelBuffer::Float32(ramp(pixels * 4));

        group.bench_with_input(
            BenchmarkId::new("rgb_to_rgba", format!("{}x{}", width, height)),
            &(width, height),
            |b, &(w, h)| {
                let mut pass = Pass::new(w, h, 4);
                b.iter(|| {
                    convert::float3_to_float4(w, h, black_box(&rgb), &mut pass, false).unwrap()
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("rgba_to_rgba", format!("{}x{}", width, height)),
            &(width, height),
            |b, &(w, h)| {
                let mut pass = Pass::new(w, h, 4);
                b.iter(|| {
                    convert::float4_to_float4(w, h, black_box(&rgba), &mut pass, false).unwrap()
                });
            },
        );
    }

    group.finish();
}

fn bench_aov_convert(c: &mut Criterion) {
    let mut group = c.benchmark_group("aov_convert");
    let (width, height) = (1920, 1080);
    let pixels = width * height;

    let depth = ChannelBuffer::Float32(ramp(pixels));
    group.bench_function("depth_copy", |b| {
        let mut pass = Pass::new(width, height, 1);
        b.iter(|| convert::float1_to_float1(width, height, black_box(&depth), &mut pass, false).unwrap());
    });

    group.bench_function("raycount_normalized", |b| {
        let mut pass = Pass::new(width, height, 1);
        b.iter(|| convert::float1_to_float1(width, height, black_box(&depth), &mut pass, true).unwrap());
    });

    let ids = ChannelBuffer::Uint32((0..pixels).map(|i| (i % 4096) as u32).collect());
    group.bench_function("material_id", |b| {
        let mut pass = Pass::new(width, height, 1);
        b.iter(|| convert::uint1_to_float1(width, height, black_box(&ids), &mut pass, false).unwrap());
    });

    let uv = ChannelBuffer::Float32(ramp(pixels * 2));
    group.bench_function("uv_padded", |b| {
        let mut pass = Pass::new(width, height, 3);
        b.iter(|| convert::uv_to_float3(width, height, black_box(&uv), &mut pass, false).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_combined_convert, bench_aov_convert);
criterion_main!(benches);
