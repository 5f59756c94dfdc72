//! 限流器基准测试：热路径是每个请求都要过的 admit 判定

use criterion::{Criterion, criterion_group, criterion_main};
use speed_formatter::ratelimit::RateLimiter;
use std::hint::black_box;
use std::time::Duration;

const WINDOW: Duration = Duration::from_secs(60);

fn bench_single_key_admit(c: &mut Criterion) {
    let limiter = RateLimiter::new();

    c.bench_function("admit_single_hot_key", |b| {
        b.iter(|| black_box(limiter.admit(black_box("api:key:hot"), WINDOW, u32::MAX)));
    });
}

fn bench_many_keys_admit(c: &mut Criterion) {
    let limiter = RateLimiter::new();
    let keys: Vec<String> = (0..10_000).map(|i| format!("public:ip:10.0.{}.{}", i / 256, i % 256)).collect();

    c.bench_function("admit_across_10k_keys", |b| {
        let mut index = 0usize;
        b.iter(|| {
            let key = &keys[index % keys.len()];
            index = index.wrapping_add(1);
            black_box(limiter.admit(black_box(key), WINDOW, 200))
        });
    });
}

fn bench_throttled_path(c: &mut Criterion) {
    let limiter = RateLimiter::new();
    // 先把窗口打满，基准测量拒绝路径
    for _ in 0..10 {
        limiter.admit("exhausted", WINDOW, 10);
    }

    c.bench_function("admit_when_throttled", |b| {
        b.iter(|| black_box(limiter.admit(black_box("exhausted"), WINDOW, 10)));
    });
}

criterion_group!(
    benches,
    bench_single_key_admit,
    bench_many_keys_admit,
    bench_throttled_path
);
criterion_main!(benches);
