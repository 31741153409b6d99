use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hfdl_core::channelizer::Channelizer;
use hfdl_core::config::ChannelizerConfig;
use hfdl_core::dsp::matched_filter::rrc_taps;
use num_complex::Complex32;

fn test_config(pre_decimation: u32) -> ChannelizerConfig {
    ChannelizerConfig {
        input_sample_rate_hz: 192_000,
        pre_decimation,
        transition_bw_hz: 250.0,
        centerfreq_hz: 0,
    }
}

fn benchmark_process(c: &mut Criterion) {
    let cfg = test_config(10);
    let taps = rrc_taps(10, 0.6, 6);
    let mut channelizer = Channelizer::create(&cfg, &taps).unwrap();
    let block = vec![Complex32::new(1.0, 0.0); channelizer.output_block_size()];

    c.bench_function("channelizer_process_default_rate", |b| {
        b.iter(|| channelizer.process(black_box(&block)).unwrap())
    });
}

fn benchmark_create(c: &mut Criterion) {
    let mut group = c.benchmark_group("channelizer_create");

    for &decimation in [4u32, 10, 20].iter() {
        let cfg = test_config(decimation);
        let taps = rrc_taps(10, 0.6, 6);
        group.bench_with_input(
            BenchmarkId::from_parameter(decimation),
            &(cfg, taps),
            |b, (cfg, taps)| b.iter(|| Channelizer::create(black_box(cfg), black_box(taps)).unwrap()),
        );
    }

    group.finish();
}

criterion_group!(benches, benchmark_process, benchmark_create);
criterion_main!(benches);
